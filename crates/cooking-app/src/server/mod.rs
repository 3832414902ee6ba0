//! HTTP surface: one server-rendered page plus form posts and SSE chat turns.

mod error;
mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use mise_recipes::RecipeClient;
use tower_http::trace::TraceLayer;

use crate::chat::ChatOrchestrator;
use crate::session::SessionRegistry;

pub use error::{AppError, AppResult};
pub use handlers::SESSION_COOKIE;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub chat: Arc<ChatOrchestrator>,
    pub recipes: Arc<RecipeClient>,
    pub result_count: u32,
    pub token_step: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/healthz", get(handlers::healthz))
        .route("/model", post(handlers::select_model))
        .route("/search", post(handlers::search))
        .route("/recipes/select", post(handlers::select_recipe))
        .route("/recipes/ask", post(handlers::ask_about_recipe))
        .route("/chat", post(handlers::chat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode, header};
    use http_body_util::BodyExt;
    use mise_llm::{FakeProvider, LlmProvider, ModelCatalog, ModelDescriptor};
    use mise_recipes::RecipeClientConfig;
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::chat::{COOKING_ASSISTANT_PERSONA, ChatOptions};
    use crate::session::SessionId;

    const SEARCH_PATH: &str = "/recipes/complexSearch";

    struct Harness {
        app: Router,
        sessions: Arc<SessionRegistry>,
        recipes_server: MockServer,
    }

    async fn harness(provider: Arc<dyn LlmProvider>) -> Harness {
        let recipes_server = MockServer::start().await;
        let recipes = RecipeClient::new(
            RecipeClientConfig::new("test-key")
                .with_endpoint(format!("{}{SEARCH_PATH}", recipes_server.uri())),
        )
        .expect("recipe client");
        let catalog = ModelCatalog::new(vec![
            ModelDescriptor::new("model-a", "Model A", 8192, "Lab A"),
            ModelDescriptor::new("model-b", "Model B", 4096, "Lab B"),
        ]);
        let chat = ChatOrchestrator::new(
            provider,
            catalog,
            ChatOptions {
                default_model: "model-a".to_string(),
                default_max_tokens: 32768,
                min_max_tokens: 512,
                stream_idle_timeout: Duration::from_secs(5),
            },
        );
        let sessions = Arc::new(SessionRegistry::new(
            COOKING_ASSISTANT_PERSONA,
            Duration::from_secs(600),
        ));
        let app = router(AppState {
            sessions: sessions.clone(),
            chat: Arc::new(chat),
            recipes: Arc::new(recipes),
            result_count: 10,
            token_step: 512,
        });

        Harness {
            app,
            sessions,
            recipes_server,
        }
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).expect("request")
    }

    fn post_form(uri: &str, cookie: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    /// Opens a session and returns its `name=value` cookie pair.
    async fn open_session(app: &Router) -> String {
        let response = app.clone().oneshot(get("/", None)).await.expect("index");
        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .expect("session cookie")
            .to_string()
    }

    async fn page(app: &Router, cookie: &str) -> String {
        let response = app
            .clone()
            .oneshot(get("/", Some(cookie)))
            .await
            .expect("index");
        assert_eq!(response.status(), StatusCode::OK);
        body_text(response).await
    }

    #[tokio::test]
    async fn healthz_answers_ok() {
        let harness = harness(Arc::new(FakeProvider::default())).await;
        let response = harness
            .app
            .oneshot(get("/healthz", None))
            .await
            .expect("healthz");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn first_visit_sets_cookie_and_renders_default_model() {
        let harness = harness(Arc::new(FakeProvider::default())).await;
        let cookie = open_session(&harness.app).await;
        assert!(cookie.starts_with(&format!("{SESSION_COOKIE}=")));

        let html = page(&harness.app, &cookie).await;
        assert!(html.contains(r#"<option value="model-a" selected>"#));
        assert!(html.contains(r#"max="8192""#));
        assert_eq!(harness.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn empty_search_warns_without_calling_the_api() {
        let harness = harness(Arc::new(FakeProvider::default())).await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&harness.recipes_server)
            .await;
        let cookie = open_session(&harness.app).await;

        let response = harness
            .app
            .clone()
            .oneshot(post_form("/search", &cookie, "ingredients=+"))
            .await
            .expect("search");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let html = page(&harness.app, &cookie).await;
        assert!(html.contains("Please enter at least one search criterion."));

        let html = page(&harness.app, &cookie).await;
        assert!(
            !html.contains("Please enter at least one search criterion."),
            "notices show once"
        );
    }

    #[tokio::test]
    async fn search_then_select_recipe() {
        let harness = harness(Arc::new(FakeProvider::default())).await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("includeIngredients", "chicken, garlic"))
            .and(query_param("cuisine", "Italian"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "id": 42,
                    "title": "Garlic Chicken",
                    "cuisines": ["Italian"],
                    "diets": [],
                    "readyInMinutes": 30,
                    "sourceUrl": "https://example.com/42"
                }]
            })))
            .expect(1)
            .mount(&harness.recipes_server)
            .await;
        let cookie = open_session(&harness.app).await;

        let response = harness
            .app
            .clone()
            .oneshot(post_form(
                "/search",
                &cookie,
                "ingredients=chicken%2C+garlic&cuisines=Italian",
            ))
            .await
            .expect("search");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let html = page(&harness.app, &cookie).await;
        assert!(html.contains("Found 1 recipes!"));
        assert!(html.contains("Garlic Chicken"));
        assert!(html.contains(r#"<option value="Italian" selected>"#));

        let response = harness
            .app
            .clone()
            .oneshot(post_form("/recipes/select", &cookie, "recipe_id=42"))
            .await
            .expect("select");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let html = page(&harness.app, &cookie).await;
        assert!(html.contains("for further details."));
        assert!(html.contains("Selected Recipe Details"));

        let response = harness
            .app
            .clone()
            .oneshot(post_form("/recipes/select", &cookie, "recipe_id=7"))
            .await
            .expect("select unknown");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn failed_search_surfaces_status() {
        let harness = harness(Arc::new(FakeProvider::default())).await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(402))
            .mount(&harness.recipes_server)
            .await;
        let cookie = open_session(&harness.app).await;

        harness
            .app
            .clone()
            .oneshot(post_form("/search", &cookie, "diets=Vegan"))
            .await
            .expect("search");

        let html = page(&harness.app, &cookie).await;
        assert!(html.contains("Error fetching recipes: 402"));
        assert!(html.contains("notice-error"));
    }

    #[tokio::test]
    async fn chat_streams_fragments_and_records_reply() {
        let harness = harness(Arc::new(FakeProvider::with_fragments([
            "You can ",
            "use olive oil.",
        ])))
        .await;
        let cookie = open_session(&harness.app).await;

        let response = harness
            .app
            .clone()
            .oneshot(post_form(
                "/chat",
                &cookie,
                "prompt=What%27s+a+good+substitute+for+butter%3F",
            ))
            .await
            .expect("chat");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("text/event-stream")
        );

        let events = body_text(response).await;
        assert!(events.contains("event: delta\ndata: \"You can \""));
        assert!(events.contains("event: delta\ndata: \"use olive oil.\""));
        assert!(events.contains("event: done"));

        let html = page(&harness.app, &cookie).await;
        assert!(html.contains("You can use olive oil."));
        assert!(html.contains("substitute for butter?"));
    }

    #[tokio::test]
    async fn failed_turn_reports_error_event_and_notice() {
        let harness = harness(Arc::new(FakeProvider::failing())).await;
        let cookie = open_session(&harness.app).await;

        let response = harness
            .app
            .clone()
            .oneshot(post_form("/chat", &cookie, "prompt=hello"))
            .await
            .expect("chat");
        let events = body_text(response).await;
        assert!(events.contains("event: error"));

        let html = page(&harness.app, &cookie).await;
        assert!(html.contains("notice-error"));
        assert!(html.contains("hello"));
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let harness = harness(Arc::new(FakeProvider::default())).await;
        let cookie = open_session(&harness.app).await;

        let response = harness
            .app
            .oneshot(post_form("/chat", &cookie, "prompt=+++"))
            .await
            .expect("chat");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn concurrent_turn_on_same_session_conflicts() {
        let harness = harness(Arc::new(FakeProvider::with_fragments(["x"]))).await;
        let cookie = open_session(&harness.app).await;
        let id: SessionId = cookie
            .split_once('=')
            .map(|(_, value)| value)
            .expect("cookie value")
            .parse()
            .expect("session id");
        let session = harness.sessions.resolve(Some(id)).await;
        let _busy = session.state.lock().await;

        let response = harness
            .app
            .clone()
            .oneshot(post_form("/chat", &cookie, "prompt=hello"))
            .await
            .expect("chat");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn ask_without_selected_recipe_is_rejected() {
        let harness = harness(Arc::new(FakeProvider::default())).await;
        let cookie = open_session(&harness.app).await;

        let response = harness
            .app
            .oneshot(post_form("/recipes/ask", &cookie, ""))
            .await
            .expect("ask");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn switching_model_clears_transcript() {
        let harness = harness(Arc::new(FakeProvider::with_fragments(["Sure."]))).await;
        let cookie = open_session(&harness.app).await;
        let response = harness
            .app
            .clone()
            .oneshot(post_form("/chat", &cookie, "prompt=hello"))
            .await
            .expect("chat");
        body_text(response).await;
        assert!(page(&harness.app, &cookie).await.contains("Sure."));

        let response = harness
            .app
            .clone()
            .oneshot(post_form("/model", &cookie, "model_id=model-b"))
            .await
            .expect("model");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let html = page(&harness.app, &cookie).await;
        assert!(!html.contains("Sure."));
        assert!(html.contains(r#"<option value="model-b" selected>"#));
        assert!(html.contains(r#"max="4096""#));

        let response = harness
            .app
            .clone()
            .oneshot(post_form("/model", &cookie, "model_id=ghost"))
            .await
            .expect("unknown model");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn switching_model_resets_slider_to_new_ceiling() {
        let harness = harness(Arc::new(FakeProvider::with_fragments(["Sure."]))).await;
        let cookie = open_session(&harness.app).await;

        for form in ["model_id=model-b&max_tokens=8192", "model_id=model-a&max_tokens=4096"] {
            let response = harness
                .app
                .clone()
                .oneshot(post_form("/model", &cookie, form))
                .await
                .expect("model");
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
        }

        let html = page(&harness.app, &cookie).await;
        assert!(html.contains(r#"<option value="model-a" selected>"#));
        assert!(html.contains(r#"max="8192""#));
        assert!(html.contains(r#"value="8192""#));
        assert!(!html.contains(r#"value="4096""#));
    }
}
