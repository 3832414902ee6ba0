pub use mise_llm::{Role, StreamTarget};
use mise_llm::ProviderMessage;

/// One transcript entry. Order in the transcript is conversation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Role and content only, as replayed to the completion endpoint.
    pub fn to_provider_message(&self) -> ProviderMessage {
        ProviderMessage::new(self.role, self.content.clone())
    }
}

/// Stream lifecycle of one session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming(StreamTarget),
    Done(StreamTarget),
    Error {
        target: StreamTarget,
        message: String,
    },
    Cancelled(StreamTarget),
}

/// State transition input for stream lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransition {
    Start(StreamTarget),
    Complete(StreamTarget),
    Fail {
        target: StreamTarget,
        message: String,
    },
    Cancel(StreamTarget),
    ResetToIdle,
}

/// Rejection reason for illegal stream transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransitionRejection {
    AlreadyStreaming {
        active: StreamTarget,
        attempted: StreamTarget,
    },
    NoActiveStream,
    SessionMismatch {
        active: StreamTarget,
        attempted: StreamTarget,
    },
}

pub type StreamTransitionResult = Result<StreamState, StreamTransitionRejection>;

impl StreamState {
    /// Returns active streaming target if and only if state is `Streaming`.
    pub fn active_target(&self) -> Option<StreamTarget> {
        match self {
            Self::Streaming(target) => Some(*target),
            Self::Idle | Self::Done(_) | Self::Error { .. } | Self::Cancelled(_) => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.active_target().is_some()
    }

    /// Returns true when incoming stream data matches the active turn.
    pub fn accepts_stream_event(&self, target: StreamTarget) -> bool {
        matches!(self, Self::Streaming(active) if *active == target)
    }

    /// Applies one transition deterministically.
    ///
    /// Non-streaming states may start a new turn directly. Any terminal transition
    /// (`Complete`/`Fail`/`Cancel`) must match the currently active turn exactly.
    pub fn apply(&self, transition: StreamTransition) -> StreamTransitionResult {
        match transition {
            StreamTransition::Start(target) => self.apply_start(target),
            StreamTransition::Complete(target) => self.apply_terminal(target, Self::Done(target)),
            StreamTransition::Fail { target, message } => {
                self.apply_terminal(target, Self::Error { target, message })
            }
            StreamTransition::Cancel(target) => {
                self.apply_terminal(target, Self::Cancelled(target))
            }
            StreamTransition::ResetToIdle => Ok(Self::Idle),
        }
    }

    fn apply_start(&self, target: StreamTarget) -> StreamTransitionResult {
        match self {
            Self::Streaming(active) => Err(StreamTransitionRejection::AlreadyStreaming {
                active: *active,
                attempted: target,
            }),
            Self::Idle | Self::Done(_) | Self::Error { .. } | Self::Cancelled(_) => {
                Ok(Self::Streaming(target))
            }
        }
    }

    fn apply_terminal(&self, target: StreamTarget, next: StreamState) -> StreamTransitionResult {
        match self {
            Self::Streaming(active) if *active == target => Ok(next),
            Self::Streaming(active) => Err(StreamTransitionRejection::SessionMismatch {
                active: *active,
                attempted: target,
            }),
            Self::Idle | Self::Done(_) | Self::Error { .. } | Self::Cancelled(_) => {
                Err(StreamTransitionRejection::NoActiveStream)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST: StreamTarget = StreamTarget::new(1);
    const SECOND: StreamTarget = StreamTarget::new(2);

    #[test]
    fn second_start_is_rejected_while_streaming() {
        let streaming = StreamState::Idle
            .apply(StreamTransition::Start(FIRST))
            .expect("start");

        assert_eq!(
            streaming.apply(StreamTransition::Start(SECOND)),
            Err(StreamTransitionRejection::AlreadyStreaming {
                active: FIRST,
                attempted: SECOND,
            })
        );
        assert_eq!(
            streaming.apply(StreamTransition::Start(FIRST)),
            Err(StreamTransitionRejection::AlreadyStreaming {
                active: FIRST,
                attempted: FIRST,
            })
        );
    }

    #[test]
    fn terminal_transitions_require_matching_turn() {
        let streaming = StreamState::Streaming(FIRST);

        assert_eq!(
            streaming.apply(StreamTransition::Complete(SECOND)),
            Err(StreamTransitionRejection::SessionMismatch {
                active: FIRST,
                attempted: SECOND,
            })
        );
        assert_eq!(
            streaming.apply(StreamTransition::Fail {
                target: FIRST,
                message: "boom".to_string(),
            }),
            Ok(StreamState::Error {
                target: FIRST,
                message: "boom".to_string(),
            })
        );
        assert_eq!(
            StreamState::Idle.apply(StreamTransition::Cancel(FIRST)),
            Err(StreamTransitionRejection::NoActiveStream)
        );
    }

    #[test]
    fn finished_turn_allows_next_start() {
        let done = StreamState::Streaming(FIRST)
            .apply(StreamTransition::Complete(FIRST))
            .expect("complete");
        assert!(!done.is_streaming());
        assert!(!done.accepts_stream_event(FIRST));

        let next = done.apply(StreamTransition::Start(SECOND)).expect("restart");
        assert!(next.accepts_stream_event(SECOND));
    }
}
