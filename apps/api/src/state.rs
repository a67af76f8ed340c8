use std::sync::Arc;

use crate::config::Config;
use crate::evaluation::prompts::PromptSet;
use crate::llm_client::LlmProvider;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Production: `LlmClient`. Tests swap in a scripted provider.
    pub llm: Arc<dyn LlmProvider>,
    pub prompts: Arc<PromptSet>,
    pub config: Config,
}
