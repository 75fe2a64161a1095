use crate::models::{CodeInput, ShapedResponse};
use crate::services::resolve_payload;
use crate::startup::AppState;
use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use service_core::error::AppError;

pub const WELCOME_MESSAGE: &str = "Welcome to the Test Case Generator API";

pub async fn welcome() -> impl IntoResponse {
    Json(json!({ "message": WELCOME_MESSAGE }))
}

/// Resolve the submitted code and relay it to the model.
pub async fn upload_and_generate(
    State(state): State<AppState>,
    input: CodeInput,
) -> Result<Json<ShapedResponse>, AppError> {
    let payload = resolve_payload(input, state.storage.as_ref()).await.map_err(|e| {
        if !matches!(e, AppError::BadRequest(_)) {
            tracing::error!(error = %e, "Failed to resolve upload");
        }
        e
    })?;

    tracing::info!(payload_len = payload.len(), "Generating test cases");

    let shaped = state.relay.generate(&payload).await?;

    Ok(Json(shaped))
}
