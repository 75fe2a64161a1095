use async_trait::async_trait;
use service_core::error::AppError;
use std::path::PathBuf;
use tokio::fs;

/// Name used when an upload declares no usable file name.
pub const FALLBACK_FILE_NAME: &str = "unnamed";

/// Where uploaded source files land before being read back as the payload.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `name`, replacing any existing file with that name.
    /// Implementations reduce `name` to a safe base name first.
    async fn store(&self, name: &str, data: &[u8]) -> Result<PathBuf, AppError>;
    async fn load(&self, name: &str) -> Result<Vec<u8>, AppError>;
}

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn store(&self, name: &str, data: &[u8]) -> Result<PathBuf, AppError> {
        let path = self.base_path.join(sanitize_file_name(name));
        fs::write(&path, data).await?;
        Ok(path)
    }

    async fn load(&self, name: &str) -> Result<Vec<u8>, AppError> {
        let path = self.base_path.join(sanitize_file_name(name));
        let data = fs::read(path).await?;
        Ok(data)
    }
}

/// Reduce a client-declared file name to its last path component.
///
/// Both separators are honoured since browsers on Windows may send
/// `C:\fakepath\name.py`.
fn sanitize_file_name(declared: &str) -> String {
    let name = declared
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    match name {
        "" | "." | ".." => FALLBACK_FILE_NAME.to_string(),
        other => other.to_string(),
    }
}
