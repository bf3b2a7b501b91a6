use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version and the active rewrite backend.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "tailor-api",
        "rewrite_backend": state.backend.name(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::rewrite::backend::IdentityRewriter;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_reports_backend() {
        let state = AppState {
            config: Config::from_lookup(|_| None).unwrap(),
            backend: Arc::new(IdentityRewriter),
            http: reqwest::Client::new(),
        };
        let Json(body) = health_handler(State(state)).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["rewrite_backend"], "identity");
    }
}
