use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::rewrite::{Dispatcher, RewriteBackend};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable rewrite backend. LLM when ANTHROPIC_API_KEY is set, identity otherwise.
    pub backend: Arc<dyn RewriteBackend>,
    /// Used to fetch job descriptions given by URL.
    pub http: reqwest::Client,
}

impl AppState {
    /// A pipeline over the shared backend, configured from `config`.
    pub fn pipeline(&self) -> Pipeline {
        let dispatcher = Dispatcher::new(Arc::clone(&self.backend), self.config.dispatch_options());
        Pipeline::new(dispatcher, self.config.failure_policy)
    }
}
