#![allow(dead_code)]

use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use testgen_service::config::{
    GoogleConfig, ModelConfig, RetryConfig, TestgenConfig, UploadConfig,
};
use testgen_service::services::providers::mock::MockTextProvider;
use testgen_service::services::providers::TextProvider;
use testgen_service::services::{GenerationRelay, LocalStorage, Storage};
use testgen_service::startup::{AppState, Application};
use uuid::Uuid;

pub const TEST_MODEL: &str = "gemini-1.5-flash";
pub const TEST_API_KEY: &str = "test-api-key";

/// Config with a random port, a scratch upload dir and millisecond backoff.
pub fn test_config(api_base: &str) -> TestgenConfig {
    TestgenConfig {
        common: CoreConfig { port: 0 },
        upload: UploadConfig {
            dir: PathBuf::from(format!("target/test-uploads-{}", Uuid::new_v4())),
            max_bytes: 1024 * 1024,
        },
        models: ModelConfig {
            text_model: TEST_MODEL.to_string(),
            api_base: api_base.to_string(),
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 500,
        },
        google: GoogleConfig {
            api_key: Secret::new(TEST_API_KEY.to_string()),
        },
        retry: RetryConfig {
            max_retries: 2,
            request_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        },
    }
}

/// State for driving the router directly with `oneshot`.
pub async fn test_state(provider: Arc<dyn TextProvider>) -> AppState {
    let config = test_config("http://unused.invalid");
    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(&config.upload.dir)
            .await
            .expect("Failed to create upload dir"),
    );
    let relay = GenerationRelay::new(provider, &config.models, config.retry.clone());

    AppState {
        config: Arc::new(config),
        storage,
        relay,
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn the application around `provider` on a random port.
    pub async fn spawn(provider: Arc<MockTextProvider>) -> Self {
        let config = test_config("http://unused.invalid");
        let app = Application::build_with_provider(config, provider)
            .await
            .expect("Failed to build test application");
        Self::start(app).await
    }

    /// Spawn the full application, Gemini provider included.
    pub async fn spawn_with_config(config: TestgenConfig) -> Self {
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        Self::start(app).await
    }

    async fn start(app: Application) -> Self {
        let port = app.port();
        let upload_dir = app.state().config.upload.dir.clone();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            upload_dir,
            client,
        }
    }

    pub async fn post_form(&self, form: reqwest::multipart::Form) -> reqwest::Response {
        self.client
            .post(format!("{}/upload-and-generate", self.address))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_dir_all(&self.upload_dir).await;
    }
}
