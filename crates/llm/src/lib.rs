use std::sync::Arc;

mod fake;
mod model;
mod provider;
mod rig_adapter;

pub use fake::FakeProvider;
pub use model::{DEFAULT_GROQ_MODEL, ModelCatalog, ModelDescriptor, default_groq_models};
pub use provider::{
    LlmProvider, ProviderConfig, ProviderError, ProviderEventStream, ProviderMessage,
    ProviderResult, ProviderStreamHandle, ProviderWorker, Role, StreamEventMapped,
    StreamEventPayload, StreamRequest, StreamTarget, make_event_stream,
};
pub use rig_adapter::{
    GROQ_ENDPOINT, GROQ_PROVIDER_ID, OPENAI_ENDPOINT, OPENAI_PROVIDER_ID, RigProviderAdapter,
};

pub fn create_provider(mut config: ProviderConfig) -> ProviderResult<Arc<dyn LlmProvider>> {
    if config.provider_id.is_empty() {
        config.provider_id = GROQ_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        GROQ_PROVIDER_ID | OPENAI_PROVIDER_ID => {
            if config.endpoint.is_empty() {
                config.endpoint = if config.provider_id == OPENAI_PROVIDER_ID {
                    OPENAI_ENDPOINT
                } else {
                    GROQ_ENDPOINT
                }
                .to_string();
            }
            Ok(Arc::new(RigProviderAdapter::new(config)?))
        }
        _ => Err(ProviderError::UnsupportedProvider {
            stage: "create-provider",
            provider_id: config.provider_id,
        }),
    }
}
