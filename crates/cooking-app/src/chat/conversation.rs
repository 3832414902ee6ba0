use super::message::{Message, Role};

/// Persona sent as the first message of every transcript.
pub const COOKING_ASSISTANT_PERSONA: &str = "You are a knowledgeable and friendly cooking assistant. \
Your tasks include providing detailed and easy-to-follow recipes, offering cooking tips and techniques, suggesting ingredient substitutions, \
helping with meal planning, and answering any culinary-related questions. \
Ensure that your responses are clear, concise, and tailored to the user's skill level and dietary preferences. \
Encourage creativity in the kitchen and promote healthy cooking practices when appropriate.";

/// In-memory transcript of one session.
///
/// Index 0 is the system prompt once initialized; it only disappears together with
/// the whole transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    /// Creates an initialized transcript holding only `system_prompt`.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let mut store = Self::default();
        store.initialize(system_prompt);
        store
    }

    /// Seeds the system prompt when the transcript is empty; no-op otherwise.
    pub fn initialize(&mut self, system_prompt: impl Into<String>) {
        if self.messages.is_empty() {
            self.messages.push(Message::system(system_prompt));
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.messages
    }

    /// Messages shown to the user, oldest first, without the system prompt.
    pub fn visible(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|message| message.role != Role::System)
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Keeps only the first message (the system prompt).
    pub fn reset_to_system_prompt(&mut self) {
        self.messages.truncate(1);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_is_idempotent() {
        let mut store = ConversationStore::new(COOKING_ASSISTANT_PERSONA);
        store.append(Message::user("hello"));
        store.initialize("another persona");

        assert_eq!(store.len(), 2);
        assert_eq!(store.transcript()[0], Message::system(COOKING_ASSISTANT_PERSONA));
    }

    #[test]
    fn reset_keeps_only_system_prompt() {
        let mut store = ConversationStore::new("persona");
        store.append(Message::user("a"));
        store.append(Message::assistant("b"));
        store.append(Message::user("c"));

        store.reset_to_system_prompt();

        assert_eq!(store.transcript(), &[Message::system("persona")]);
        store.reset_to_system_prompt();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn visible_skips_system_prompt_in_order() {
        let mut store = ConversationStore::new("persona");
        store.append(Message::user("first"));
        store.append(Message::assistant("second"));

        let visible = store
            .visible()
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>();
        assert_eq!(visible, vec!["first", "second"]);
    }
}
