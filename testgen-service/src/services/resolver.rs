//! Input resolution: turns the upload form into the code text to analyze.

use crate::models::{CodeInput, UploadedFile};
use crate::services::storage::Storage;
use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form,
};
use serde::Deserialize;
use service_core::error::AppError;

pub const CODE_FIELD: &str = "code";
pub const FILE_FIELD: &str = "file";

/// Message returned when neither input source is usable.
pub const NO_INPUT_MESSAGE: &str = "No code or file provided";

/// Urlencoded form body. Only `code` can travel this way.
#[derive(Debug, Deserialize)]
struct CodeForm {
    code: Option<String>,
}

/// Accepts multipart and urlencoded forms. Any other body, including an
/// empty one, carries no input and falls through to the no-input error.
#[async_trait]
impl<S> FromRequest<S> for CodeInput
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state).await.map_err(|e| {
                AppError::BadRequest(anyhow::anyhow!("Invalid multipart body: {}", e.body_text()))
            })?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(form) = Form::<CodeForm>::from_request(req, state).await.map_err(|e| {
                AppError::BadRequest(anyhow::anyhow!("Invalid form body: {}", e.body_text()))
            })?;
            Ok(Self {
                code: form.code,
                file: None,
            })
        } else {
            tracing::debug!(content_type = %content_type, "Request carries no form body");
            Ok(Self::default())
        }
    }
}

impl CodeInput {
    /// Drain a multipart form into owned `code` / `file` values.
    ///
    /// Unknown fields are skipped; a repeated field keeps its last value.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut input = CodeInput::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
        })? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some(CODE_FIELD) => {
                    let text = field.text().await.map_err(|e| {
                        AppError::BadRequest(anyhow::anyhow!("Failed to read code field: {}", e))
                    })?;
                    input.code = Some(text);
                }
                Some(FILE_FIELD) => {
                    let file_name = field.file_name().map(|s| s.to_string());
                    let data = field.bytes().await.map_err(|e| {
                        AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e))
                    })?;
                    input.file = Some(UploadedFile {
                        file_name,
                        data: data.to_vec(),
                    });
                }
                other => {
                    tracing::debug!(field = ?other, "Ignoring unknown form field");
                }
            }
        }

        Ok(input)
    }
}

/// Pick the payload: trimmed `code` if non-blank, else the uploaded file's
/// text after it has been written to and read back from `storage`.
pub async fn resolve_payload(input: CodeInput, storage: &dyn Storage) -> Result<String, AppError> {
    if let Some(code) = input.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        tracing::debug!(code_len = code.len(), "Using code field as payload");
        return Ok(code.to_string());
    }

    // A zero-byte part is what browsers send for an untouched file input.
    match input.file {
        Some(file) if !file.data.is_empty() => {
            let UploadedFile { file_name, data } = file;
            let name = file_name.unwrap_or_default();
            let path = storage.store(&name, &data).await?;
            drop(data);

            tracing::info!(file = %path.display(), "Stored uploaded file");

            let bytes = storage.load(&name).await?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Err(AppError::BadRequest(anyhow::anyhow!(NO_INPUT_MESSAGE))),
    }
}
