/// Transcript storage and the assistant persona.
pub mod conversation;
/// Events surfaced to the presentation layer during a turn.
pub mod events;
/// Message entities and the stream lifecycle state machine.
pub mod message;
pub mod orchestrator;

pub use conversation::{COOKING_ASSISTANT_PERSONA, ConversationStore};
pub use events::TurnEvent;
pub use message::{
    Message, Role, StreamState, StreamTarget, StreamTransition, StreamTransitionRejection,
    StreamTransitionResult,
};
pub use orchestrator::{
    ChatError, ChatOptions, ChatOrchestrator, ChatResult, ModelSelection, clamp_max_tokens,
};
