use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::context::ExtractionError;
use crate::latex::ParseError;
use crate::llm_client::LlmError;
use crate::pipeline::PipelineError;
use crate::rewrite::{RewriteError, RewriteErrorKind};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("{0}")]
    Rewrite(#[from] RewriteError),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Upstream fetch failed: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Parse(e) => AppError::Parse(e),
            PipelineError::Rewrite(e) => AppError::Rewrite(e),
            PipelineError::CoverLetter(kind) => AppError::Llm(format!("cover letter: {kind}")),
            PipelineError::LatexGeneration(kind) => {
                AppError::Llm(format!("LaTeX generation: {kind}"))
            }
            PipelineError::GeneratedLatex(e) => {
                AppError::Llm(format!("generated LaTeX does not parse: {e}"))
            }
        }
    }
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        AppError::Llm(e.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::Validation(format!("invalid multipart body: {}", e.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Parse(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "PARSE_ERROR",
                format!("Resume could not be parsed: {e}"),
            ),
            AppError::Extraction(e) => {
                tracing::warn!("Extraction error: {e}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "EXTRACTION_ERROR",
                    extraction_message(e),
                )
            }
            AppError::Rewrite(e) => {
                tracing::error!("Rewrite error: {e}");
                let status = match e.kind {
                    RewriteErrorKind::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (
                    status,
                    "REWRITE_ERROR",
                    format!("Rewriting section '{}' failed", e.section),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// Names the uploaded file without leaking the staging directory path.
fn extraction_message(e: &ExtractionError) -> String {
    let file = e
        .path()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "supporting files".to_string());
    match e {
        ExtractionError::Utf8 { .. } => format!("'{file}' is not valid UTF-8 text"),
        ExtractionError::ReadDir { .. } => "Supporting files could not be read".to_string(),
        _ => format!("Text could not be extracted from '{file}'"),
    }
}
