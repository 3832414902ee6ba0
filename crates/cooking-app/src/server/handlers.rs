use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::Form;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use mise_recipes::RecipeQuery;
use serde::Deserialize;
use snafu::{OptionExt, ResultExt, ensure};
use tokio::sync::{OwnedMutexGuard, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::AppState;
use super::error::{
    AppResult, ChatSnafu, EmptyPromptSnafu, NoRecipeSelectedSnafu, RenderSnafu, SessionBusySnafu,
    UnknownRecipeSnafu,
};
use crate::chat::TurnEvent;
use crate::session::{Notice, ResolvedSession, SessionId, SessionState};
use crate::view::{PageView, recipe_prompt};

pub const SESSION_COOKIE: &str = "mise_session";

const EMPTY_CRITERIA_NOTICE: &str = "Please enter at least one search criterion.";
const NO_RESULTS_NOTICE: &str = "No recipes found matching your criteria.";

#[derive(Debug, Deserialize)]
pub struct ModelForm {
    pub model_id: String,
    #[serde(default)]
    pub max_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub cuisines: Vec<String>,
    #[serde(default)]
    pub diets: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectRecipeForm {
    pub recipe_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub prompt: String,
}

async fn resolve_session(state: &AppState, jar: CookieJar) -> (CookieJar, ResolvedSession) {
    let requested = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| cookie.value().parse::<SessionId>().ok());
    let session = state.sessions.resolve(requested).await;
    if !session.created {
        return (jar, session);
    }

    let cookie = Cookie::build((SESSION_COOKIE, session.id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), session)
}

fn render_page(state: &AppState, session: &mut SessionState) -> AppResult<Html<String>> {
    let selection = state.chat.current_selection(session).context(ChatSnafu {
        stage: "page-selection",
    })?;
    let view = PageView::build(session, state.chat.catalog(), &selection, state.token_step);
    let html = view.render_html().context(RenderSnafu {
        stage: "render-page",
    })?;
    session.clear_notices();
    Ok(Html(html))
}

pub async fn index(State(state): State<AppState>, jar: CookieJar) -> AppResult<impl IntoResponse> {
    let (jar, session) = resolve_session(&state, jar).await;
    let mut guard = session.state.lock().await;
    let page = render_page(&state, &mut guard)?;
    Ok((jar, page))
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn select_model(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ModelForm>,
) -> AppResult<impl IntoResponse> {
    let (jar, session) = resolve_session(&state, jar).await;
    let mut guard = session.state.lock().await;
    let selection = state
        .chat
        .select_model(&mut guard, Some(&form.model_id), form.max_tokens)
        .context(ChatSnafu {
            stage: "select-model",
        })?;
    tracing::info!(
        session_id = %session.id,
        model_id = %selection.model_id,
        max_tokens = selection.max_tokens,
        "model selected"
    );
    Ok((jar, Redirect::to("/")))
}

pub async fn search(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SearchForm>,
) -> AppResult<impl IntoResponse> {
    let (jar, session) = resolve_session(&state, jar).await;
    let query = RecipeQuery::new(form.ingredients, form.cuisines, form.diets);

    if query.is_empty() {
        let mut guard = session.state.lock().await;
        guard.search.criteria = query;
        guard.push_notice(Notice::warning(EMPTY_CRITERIA_NOTICE));
        return Ok((jar, Redirect::to("/")));
    }

    let outcome = state.recipes.fetch_recipes(&query, state.result_count).await;

    let mut guard = session.state.lock().await;
    let notice = match &outcome.error {
        Some(error) => Notice::error(error.to_string()),
        None if outcome.recipes.is_empty() => Notice::warning(NO_RESULTS_NOTICE),
        None => Notice::success(format!("Found {} recipes!", outcome.recipes.len())),
    };
    guard.push_notice(notice);
    guard.search.criteria = query;
    guard.search.results = outcome.recipes;
    guard.search.searched = true;

    Ok((jar, Redirect::to("/")))
}

pub async fn select_recipe(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SelectRecipeForm>,
) -> AppResult<impl IntoResponse> {
    let (jar, session) = resolve_session(&state, jar).await;
    let mut guard = session.state.lock().await;
    let title = guard
        .select_recipe(form.recipe_id)
        .map(|recipe| recipe.title.clone())
        .context(UnknownRecipeSnafu {
            stage: "select-recipe",
            recipe_id: form.recipe_id,
        })?;
    guard.push_notice(Notice::success(format!(
        "Selected '{title}' for further details."
    )));
    Ok((jar, Redirect::to("/")))
}

pub async fn chat(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ChatForm>,
) -> AppResult<impl IntoResponse> {
    ensure!(
        !form.prompt.trim().is_empty(),
        EmptyPromptSnafu { stage: "chat-form" }
    );
    let (jar, session) = resolve_session(&state, jar).await;
    let guard = lock_for_turn(&session)?;
    let stream = start_turn(&state, guard, form.prompt)?;
    Ok((jar, stream))
}

pub async fn ask_about_recipe(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let (jar, session) = resolve_session(&state, jar).await;
    let guard = lock_for_turn(&session)?;
    let prompt = guard
        .selected_recipe
        .as_ref()
        .map(recipe_prompt)
        .context(NoRecipeSelectedSnafu {
            stage: "ask-about-recipe",
        })?;
    let stream = start_turn(&state, guard, prompt)?;
    Ok((jar, stream))
}

fn lock_for_turn(session: &ResolvedSession) -> AppResult<OwnedMutexGuard<SessionState>> {
    Arc::clone(&session.state)
        .try_lock_owned()
        .ok()
        .context(SessionBusySnafu {
            stage: "lock-session",
        })
}

/// Runs the turn on a background task that owns the session lock and forwards its
/// events as SSE frames. The stream ends once the turn has finished.
fn start_turn(
    state: &AppState,
    mut session: OwnedMutexGuard<SessionState>,
    prompt: String,
) -> AppResult<Response> {
    let selection = state
        .chat
        .current_selection(&mut session)
        .context(ChatSnafu {
            stage: "turn-selection",
        })?;
    let (sink, events) = mpsc::unbounded_channel();
    let chat = Arc::clone(&state.chat);

    tokio::spawn(async move {
        if let Err(error) = chat
            .handle_user_input(&mut session, &prompt, &selection, &sink)
            .await
        {
            session.push_notice(Notice::error(format!("Error: {error}")));
        }
    });

    let stream = UnboundedReceiverStream::new(events)
        .map(|event| Ok::<Event, Infallible>(turn_event_to_sse(event)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()).into_response())
}

fn turn_event_to_sse(event: TurnEvent) -> Event {
    match event {
        TurnEvent::Fragment(text) => Event::default()
            .event("delta")
            .data(serde_json::to_string(&text).unwrap_or_default()),
        TurnEvent::Completed => Event::default().event("done").data("[DONE]"),
        TurnEvent::Failed(message) => Event::default()
            .event("error")
            .data(serde_json::to_string(&message).unwrap_or_default()),
    }
}
