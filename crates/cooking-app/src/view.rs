//! Pure state-to-page rendering.
//!
//! Handlers mutate [`SessionState`] and then render the whole page from it; nothing
//! here touches the network or mutates state.

use askama::Template;
use mise_llm::ModelCatalog;
use mise_recipes::{CUISINE_OPTIONS, DIET_OPTIONS, Recipe};

use crate::chat::{ModelSelection, Role};
use crate::session::SessionState;

pub const PAGE_TITLE: &str = "Groq Cooking Assistant";

/// Canned prompt sent when the user asks about the selected recipe.
pub fn recipe_prompt(recipe: &Recipe) -> String {
    format!(
        "I've selected the recipe '{}'. Can you help me with the next steps?",
        recipe.title
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeView {
    pub class: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOption {
    pub id: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSlider {
    pub value: u64,
    pub min: u64,
    pub max: u64,
    pub step: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOption {
    pub value: &'static str,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeCard {
    pub id: u64,
    pub title: String,
    pub image: Option<String>,
    pub cuisines: String,
    pub diets: String,
    pub ready_in: String,
    pub source_url: Option<String>,
}

impl From<&Recipe> for RecipeCard {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title.clone(),
            image: recipe.image.clone(),
            cuisines: recipe.cuisines.join(", "),
            diets: recipe.diets.join(", "),
            ready_in: recipe
                .ready_in_minutes
                .map(|minutes| format!("{minutes} minutes"))
                .unwrap_or_else(|| "unknown".to_string()),
            source_url: recipe.source_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatBubble {
    pub class: &'static str,
    pub avatar: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Template)]
#[template(path = "page.html")]
pub struct PageView {
    pub title: &'static str,
    pub notices: Vec<NoticeView>,
    pub models: Vec<ModelOption>,
    pub tokens: TokenSlider,
    pub ingredients: String,
    pub cuisines: Vec<FilterOption>,
    pub diets: Vec<FilterOption>,
    pub searched: bool,
    pub results: Vec<RecipeCard>,
    pub selected_recipe: Option<RecipeCard>,
    pub transcript: Vec<ChatBubble>,
    pub streaming: bool,
}

impl PageView {
    pub fn build(
        session: &SessionState,
        catalog: &ModelCatalog,
        selection: &ModelSelection,
        token_step: u64,
    ) -> Self {
        let models = catalog
            .models()
            .iter()
            .map(|model| ModelOption {
                id: model.id.clone(),
                label: model.label(),
                selected: model.id == selection.model_id,
            })
            .collect();

        let criteria = &session.search.criteria;
        let filter = |options: &[&'static str], chosen: &[String]| {
            options
                .iter()
                .map(|&value| FilterOption {
                    value,
                    selected: chosen.iter().any(|picked| picked == value),
                })
                .collect::<Vec<_>>()
        };

        let transcript = session
            .conversation
            .visible()
            .map(|message| {
                let (class, avatar) = match message.role {
                    Role::Assistant => ("bubble-assistant", "🤖"),
                    Role::User | Role::System => ("bubble-user", "👨‍🍳"),
                };
                ChatBubble {
                    class,
                    avatar,
                    content: message.content.clone(),
                }
            })
            .collect();

        Self {
            title: PAGE_TITLE,
            notices: session
                .notices()
                .iter()
                .map(|notice| NoticeView {
                    class: notice.level.css_class(),
                    text: notice.text.clone(),
                })
                .collect(),
            models,
            tokens: TokenSlider {
                value: selection.max_tokens,
                min: selection.floor.min(selection.ceiling),
                max: selection.ceiling.max(selection.floor),
                step: token_step,
            },
            ingredients: criteria.ingredients.clone(),
            cuisines: filter(&CUISINE_OPTIONS, &criteria.cuisines),
            diets: filter(&DIET_OPTIONS, &criteria.diets),
            searched: session.search.searched,
            results: session.search.results.iter().map(RecipeCard::from).collect(),
            selected_recipe: session.selected_recipe.as_ref().map(RecipeCard::from),
            transcript,
            streaming: session.stream_state.is_streaming(),
        }
    }

    pub fn render_html(&self) -> askama::Result<String> {
        self.render()
    }
}
