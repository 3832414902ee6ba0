use std::net::SocketAddr;
use std::sync::Arc;

use mise::chat::{COOKING_ASSISTANT_PERSONA, ChatOrchestrator};
use mise::server::{AppState, router};
use mise::session::SessionRegistry;
use mise::settings::{Credentials, Settings, SettingsError};
use mise_llm::{ProviderError, create_provider};
use mise_recipes::{RecipeClient, RecipeError};
use snafu::{ResultExt, Snafu};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Snafu)]
enum StartupError {
    #[snafu(display("startup failed on `{stage}`"))]
    Settings {
        stage: &'static str,
        source: SettingsError,
    },
    #[snafu(display("startup failed on `{stage}`"))]
    Provider {
        stage: &'static str,
        source: ProviderError,
    },
    #[snafu(display("startup failed on `{stage}`"))]
    Recipes {
        stage: &'static str,
        source: RecipeError,
    },
    #[snafu(display("failed to bind {address}"))]
    Bind {
        stage: &'static str,
        address: SocketAddr,
        source: std::io::Error,
    },
    #[snafu(display("server stopped unexpectedly"))]
    Serve {
        stage: &'static str,
        source: std::io::Error,
    },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config_path = Settings::default_config_path();
    let settings = Settings::load(&config_path).context(SettingsSnafu {
        stage: "load-settings",
    })?;
    let credentials = Credentials::from_env().context(SettingsSnafu {
        stage: "read-credentials",
    })?;
    let address = settings.socket_addr().context(SettingsSnafu {
        stage: "bind-address",
    })?;

    let provider = create_provider(settings.provider_config(&credentials)).context(
        ProviderSnafu {
            stage: "create-provider",
        },
    )?;
    let recipes = RecipeClient::new(settings.recipe_client_config(&credentials)).context(
        RecipesSnafu {
            stage: "create-recipe-client",
        },
    )?;
    let chat = ChatOrchestrator::new(provider, settings.catalog(), settings.chat_options());

    let state = AppState {
        sessions: Arc::new(SessionRegistry::new(
            COOKING_ASSISTANT_PERSONA,
            settings.session_ttl(),
        )),
        chat: Arc::new(chat),
        recipes: Arc::new(recipes),
        result_count: settings.recipes.result_count,
        token_step: settings.llm.max_tokens_step,
    };

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .context(BindSnafu {
            stage: "bind-listener",
            address,
        })?;
    tracing::info!(
        %address,
        config = %config_path.display(),
        provider_id = %settings.llm.provider_id,
        default_model = %settings.llm.default_model,
        "cooking assistant listening"
    );

    axum::serve(listener, router(state))
        .await
        .context(ServeSnafu { stage: "serve" })
}
