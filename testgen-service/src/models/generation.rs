use serde::{Deserialize, Serialize};

/// A file part from the upload form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name declared by the client, before sanitising.
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

/// Raw form input for one generation request.
#[derive(Debug, Clone, Default)]
pub struct CodeInput {
    pub code: Option<String>,
    pub file: Option<UploadedFile>,
}

/// The two-field answer returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapedResponse {
    /// Text before the model's first line break.
    pub num_test_cases: String,
    /// Text after it, or the whole answer when there is no line break.
    pub test_cases: String,
}

impl ShapedResponse {
    /// Split `raw` once at its first `\n` and trim both halves.
    pub fn from_raw(raw: &str) -> Self {
        match raw.split_once('\n') {
            Some((first, rest)) => Self {
                num_test_cases: first.trim().to_string(),
                test_cases: rest.trim().to_string(),
            },
            None => {
                let whole = raw.trim().to_string();
                Self {
                    num_test_cases: whole.clone(),
                    test_cases: whole,
                }
            }
        }
    }
}
