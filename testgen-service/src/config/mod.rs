use secrecy::{ExposeSecret, Secret};
use service_core::config::{self as core_config, get_env, parse_env};
use service_core::error::AppError;
use std::path::PathBuf;
use std::time::Duration;

/// Default Gemini REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default request body cap (10 MiB).
const DEFAULT_UPLOAD_MAX_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct TestgenConfig {
    pub common: core_config::Config,
    pub upload: UploadConfig,
    pub models: ModelConfig,
    pub google: GoogleConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory uploaded files are written to, keyed by their declared name.
    pub dir: PathBuf,
    /// Request body limit for the generation endpoint.
    pub max_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Model for text generation (e.g., gemini-1.5-flash)
    pub text_model: String,
    pub api_base: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
    pub max_output_tokens: i32,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_key: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Extra attempts after the first one for transient upstream failures.
    pub max_retries: u32,
    /// Per-attempt HTTP timeout.
    pub request_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            request_timeout: Duration::from_secs(120),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl TestgenConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (APP__ prefix)
        let common_config = core_config::Config::load()?;
        let is_prod = core_config::is_production();

        let api_key = get_env("GEMINI_API_KEY", None, is_prod)?;
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GEMINI_API_KEY is set but empty"
            )));
        }

        let defaults = RetryConfig::default();

        Ok(TestgenConfig {
            common: common_config,
            upload: UploadConfig {
                dir: PathBuf::from(get_env("UPLOAD_DIR", Some("uploads"), is_prod)?),
                max_bytes: parse_env(
                    "UPLOAD_MAX_BYTES",
                    Some(&DEFAULT_UPLOAD_MAX_BYTES.to_string()),
                    is_prod,
                )?,
            },
            models: ModelConfig {
                text_model: get_env("GENAI_TEXT_MODEL", Some("gemini-1.5-flash"), is_prod)?,
                api_base: get_env("GENAI_API_BASE", Some(DEFAULT_API_BASE), is_prod)?,
                temperature: parse_env("GENAI_TEMPERATURE", Some("1.0"), is_prod)?,
                top_p: parse_env("GENAI_TOP_P", Some("0.95"), is_prod)?,
                top_k: parse_env("GENAI_TOP_K", Some("64"), is_prod)?,
                max_output_tokens: parse_env("GENAI_MAX_OUTPUT_TOKENS", Some("500"), is_prod)?,
            },
            google: GoogleConfig {
                api_key: Secret::new(api_key),
            },
            retry: RetryConfig {
                max_retries: parse_env("GENAI_MAX_RETRIES", Some("2"), is_prod)?,
                request_timeout: Duration::from_secs(parse_env(
                    "GENAI_REQUEST_TIMEOUT_SECS",
                    Some("120"),
                    is_prod,
                )?),
                ..defaults
            },
        })
    }

    /// Whether a usable credential is present.
    pub fn has_api_key(&self) -> bool {
        !self.google.api_key.expose_secret().trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    /// Serialises tests that mutate the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const MANAGED: &[&str] = &["ENVIRONMENT", "GEMINI_API_KEY", "GENAI_TOP_K", "UPLOAD_MAX_BYTES"];

    /// Run `f` with `vars` set and every other managed key cleared.
    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let saved: Vec<_> = MANAGED.iter().map(|k| (*k, env::var(k).ok())).collect();

        for key in MANAGED {
            env::remove_var(key);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }

        let result = f();

        for (key, value) in saved {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        result
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let result = with_env(&[], TestgenConfig::load);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_blank_api_key_is_config_error() {
        for key in ["", "   "] {
            let result = with_env(&[("GEMINI_API_KEY", key)], TestgenConfig::load);
            assert!(matches!(result, Err(AppError::ConfigError(_))));
        }
    }

    #[test]
    fn test_unparsable_number_is_config_error() {
        let result = with_env(
            &[("GEMINI_API_KEY", "k"), ("GENAI_TOP_K", "sixty-four")],
            TestgenConfig::load,
        );
        let err = result.unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        assert!(err.to_string().contains("GENAI_TOP_K"));
    }

    #[test]
    fn test_defaults_with_key_present() {
        let config = with_env(&[("GEMINI_API_KEY", "k")], TestgenConfig::load).unwrap();

        assert!(config.has_api_key());
        assert_eq!(config.upload.max_bytes, DEFAULT_UPLOAD_MAX_BYTES);
        assert_eq!(config.models.top_k, 64);
        assert_eq!(config.retry.max_retries, 2);
    }

    #[test]
    fn test_production_requires_explicit_settings() {
        let result = with_env(
            &[("ENVIRONMENT", "prod"), ("GEMINI_API_KEY", "k")],
            TestgenConfig::load,
        );
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
