pub mod json_repo;
pub mod offline_llm;
pub mod openai_llm;
pub mod prompts;
pub mod request_policy;

pub use json_repo::JsonFileRepository;
pub use offline_llm::OfflineStudyAdapter;
pub use openai_llm::{
    single_attempt_client, CompletionBackend, OpenAiChatBackend, OpenAiStudyAdapter,
};
pub use request_policy::{RateLimiter, RequestPolicy, RetryPolicy};

use crate::config::{Config, Environment};
use async_openai::config::OpenAIConfig;
use std::sync::Arc;
use study_companion_core::ports::StudyAssistantService;
use tracing::{debug, info, warn};

/// Picks the live assistant when an API key is configured, the offline one otherwise.
pub fn build_study_assistant(config: &Config) -> Arc<dyn StudyAssistantService> {
    let Some(api_key) = config.openai_api_key.as_ref() else {
        match config.environment {
            Environment::Production => {
                warn!("OPENAI_API_KEY is not set; questions and grading use offline heuristics.")
            }
            Environment::Development => {
                debug!("OPENAI_API_KEY is not set; using the offline assistant.")
            }
        }
        return Arc::new(OfflineStudyAdapter::new());
    };

    let openai_client = single_attempt_client(OpenAIConfig::new().with_api_key(api_key));
    let backend = Arc::new(OpenAiChatBackend::new(
        openai_client,
        config.llm_model.clone(),
    ));
    let policy = RequestPolicy::new(
        config.llm_min_interval,
        RetryPolicy {
            max_retries: config.llm_max_retries,
            attempt_timeout: config.llm_timeout,
            ..RetryPolicy::default()
        },
    );

    info!("Using language model '{}'.", config.llm_model);
    Arc::new(OpenAiStudyAdapter::new(
        backend,
        policy,
        config.llm_fallback_on_error,
    ))
}
