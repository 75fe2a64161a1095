//! HTTP handlers for the test case generator service.

pub mod generate;
pub mod health;

pub use generate::{upload_and_generate, welcome};
pub use health::{health_check, metrics_endpoint, readiness_check};
