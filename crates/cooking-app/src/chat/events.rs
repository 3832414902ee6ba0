/// What the presentation layer sees while one chat turn runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// A piece of assistant text, in arrival order.
    Fragment(String),
    /// The reply finished and was appended to the transcript.
    Completed,
    /// The reply failed; only the user message remains in the transcript.
    Failed(String),
}

impl TurnEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}
