use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::feedback::session::FeedbackSession;
use crate::llm_client::CompletionService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Completion port. Production: `OpenAiClient`.
    pub llm: Arc<dyn CompletionService>,
    /// The single feedback session this process serves. Handlers hold the lock for the
    /// whole action, so actions run one at a time.
    pub session: Arc<Mutex<FeedbackSession>>,
}

impl AppState {
    pub fn new(config: Config, llm: Arc<dyn CompletionService>) -> Self {
        Self {
            config,
            llm,
            session: Arc::new(Mutex::new(FeedbackSession::new())),
        }
    }
}
