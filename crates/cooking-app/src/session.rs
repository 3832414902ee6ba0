use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mise_recipes::{Recipe, RecipeQuery};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::chat::{ConversationStore, StreamState, StreamTarget};

/// Identifier carried in the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Success => "notice-success",
            Self::Warning => "notice-warning",
            Self::Error => "notice-error",
        }
    }
}

/// User-visible message shown once on the next render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Last search criteria and what came back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPanel {
    pub criteria: RecipeQuery,
    pub results: Vec<Recipe>,
    pub searched: bool,
}

/// Everything one browser session owns.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub conversation: ConversationStore,
    pub selected_model: Option<String>,
    pub max_tokens: Option<u64>,
    pub selected_recipe: Option<Recipe>,
    pub search: SearchPanel,
    pub stream_state: StreamState,
    notices: Vec<Notice>,
    next_turn: u64,
}

impl SessionState {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            conversation: ConversationStore::new(system_prompt),
            selected_model: None,
            max_tokens: None,
            selected_recipe: None,
            search: SearchPanel::default(),
            stream_state: StreamState::Idle,
            notices: Vec::new(),
            next_turn: 1,
        }
    }

    /// Allocates the routing key for the next chat turn.
    pub fn next_stream_target(&mut self) -> StreamTarget {
        let target = StreamTarget::new(self.next_turn);
        self.next_turn = self.next_turn.saturating_add(1);
        target
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn clear_notices(&mut self) {
        self.notices.clear();
    }

    /// Stores a copy of the result with `recipe_id` as the selected recipe.
    pub fn select_recipe(&mut self, recipe_id: u64) -> Option<&Recipe> {
        let recipe = self
            .search
            .results
            .iter()
            .find(|recipe| recipe.id == recipe_id)?
            .clone();
        self.selected_recipe = Some(recipe);
        self.selected_recipe.as_ref()
    }
}

pub type SharedSession = Arc<Mutex<SessionState>>;

pub struct ResolvedSession {
    pub id: SessionId,
    pub state: SharedSession,
    pub created: bool,
}

struct SessionEntry {
    state: SharedSession,
    last_seen: Instant,
}

/// Process-local map of live sessions with idle expiry.
pub struct SessionRegistry {
    entries: RwLock<HashMap<SessionId, SessionEntry>>,
    ttl: Duration,
    system_prompt: String,
}

impl SessionRegistry {
    pub fn new(system_prompt: impl Into<String>, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            system_prompt: system_prompt.into(),
        }
    }

    /// Returns the live session for `requested`, or creates a fresh one.
    pub async fn resolve(&self, requested: Option<SessionId>) -> ResolvedSession {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, entry| now.duration_since(entry.last_seen) < ttl);
        let expired = before - entries.len();
        if expired > 0 {
            tracing::debug!(expired, live = entries.len(), "pruned idle sessions");
        }

        if let Some(id) = requested
            && let Some(entry) = entries.get_mut(&id)
        {
            entry.last_seen = now;
            return ResolvedSession {
                id,
                state: entry.state.clone(),
                created: false,
            };
        }

        let id = SessionId::new();
        let state = Arc::new(Mutex::new(SessionState::new(self.system_prompt.clone())));
        entries.insert(
            id,
            SessionEntry {
                state: state.clone(),
                last_seen: now,
            },
        );
        tracing::info!(session_id = %id, "created session");

        ResolvedSession {
            id,
            state,
            created: true,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
