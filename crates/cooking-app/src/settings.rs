use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use mise_llm::{
    DEFAULT_GROQ_MODEL, GROQ_ENDPOINT, GROQ_PROVIDER_ID, ModelCatalog, ModelDescriptor,
    ProviderConfig, default_groq_models,
};
use mise_recipes::{
    DEFAULT_RESULT_COUNT, RecipeClientConfig, SPOONACULAR_SEARCH_ENDPOINT,
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu, ensure};

use crate::chat::ChatOptions;

pub const SETTINGS_DIRECTORY_NAME: &str = "mise";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const CONFIG_PATH_ENV: &str = "MISE_CONFIG";
pub const ENV_PREFIX: &str = "MISE_";
pub const LLM_API_KEY_ENV: &str = "GROQ_API_KEY";
pub const RECIPE_API_KEY_ENV: &str = "SPOONACULAR_API_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u64,
    #[serde(default = "default_min_max_tokens")]
    pub min_max_tokens: u64,
    #[serde(default = "default_max_tokens_step")]
    pub max_tokens_step: u64,
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,
    #[serde(default = "default_groq_models")]
    pub models: Vec<ModelDescriptor>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider_id: default_provider_id(),
            endpoint: default_llm_endpoint(),
            default_model: default_model(),
            default_max_tokens: default_max_tokens(),
            min_max_tokens: default_min_max_tokens(),
            max_tokens_step: default_max_tokens_step(),
            stream_idle_timeout_secs: default_stream_idle_timeout_secs(),
            models: default_groq_models(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeSettings {
    #[serde(default = "default_recipe_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_result_count")]
    pub result_count: u32,
    #[serde(default = "default_recipe_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RecipeSettings {
    fn default() -> Self {
        Self {
            endpoint: default_recipe_endpoint(),
            result_count: default_result_count(),
            request_timeout_secs: default_recipe_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub recipes: RecipeSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            session_ttl_secs: default_session_ttl_secs(),
            llm: LlmSettings::default(),
            recipes: RecipeSettings::default(),
        }
    }
}

/// API keys supplied through the environment at process start.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub llm_api_key: String,
    pub recipe_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("llm_api_key", &"<redacted>")
            .field("recipe_api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let read = |name: &'static str| -> Result<String, SettingsError> {
            let value = lookup(name).unwrap_or_default().trim().to_string();
            ensure!(
                !value.is_empty(),
                MissingCredentialSnafu {
                    stage: "read-credentials",
                    variable: name,
                }
            );
            Ok(value)
        };

        Ok(Self {
            llm_api_key: read(LLM_API_KEY_ENV)?,
            recipe_api_key: read(RECIPE_API_KEY_ENV)?,
        })
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("environment variable {variable} must be set"))]
    MissingCredential {
        stage: &'static str,
        variable: &'static str,
    },
    #[snafu(display("failed to load settings on `{stage}`: {source}"))]
    Extract {
        stage: &'static str,
        #[snafu(source(from(figment::Error, Box::new)))]
        source: Box<figment::Error>,
    },
    #[snafu(display("default model '{model_id}' is not in the model catalog"))]
    UnknownDefaultModel {
        stage: &'static str,
        model_id: String,
    },
    #[snafu(display("the model catalog is empty"))]
    EmptyCatalog { stage: &'static str },
    #[snafu(display(
        "minimum token budget {floor} exceeds the {ceiling}-token limit of model '{model_id}'"
    ))]
    FloorAboveCeiling {
        stage: &'static str,
        model_id: String,
        floor: u64,
        ceiling: u64,
    },
    #[snafu(display("invalid bind address '{address}': {source}"))]
    BindAddress {
        stage: &'static str,
        address: String,
        source: std::net::AddrParseError,
    },
}

impl Settings {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".mise"))
    }

    /// `$MISE_CONFIG` when set, otherwise the per-user config directory.
    pub fn default_config_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::default_config_dir().join(SETTINGS_FILE_NAME))
    }

    /// Defaults, then the JSON file at `path` (if present), then `MISE_*` variables.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        let settings = Self::figment(path)
            .extract::<Settings>()
            .context(ExtractSnafu {
                stage: "extract-settings",
            })?
            .normalized();
        settings.validate()?;
        Ok(settings)
    }

    pub fn normalized(mut self) -> Self {
        self.bind_address = self.bind_address.trim().to_string();
        if self.bind_address.is_empty() {
            self.bind_address = default_bind_address();
        }
        self.llm.provider_id = self.llm.provider_id.trim().to_string();
        if self.llm.provider_id.is_empty() {
            self.llm.provider_id = default_provider_id();
        }
        self.llm.endpoint = self.llm.endpoint.trim().to_string();
        self.llm.default_model = self.llm.default_model.trim().to_string();
        self.llm.min_max_tokens = self.llm.min_max_tokens.max(1);
        self.llm.max_tokens_step = self.llm.max_tokens_step.max(1);
        self.llm.stream_idle_timeout_secs = self.llm.stream_idle_timeout_secs.max(1);
        self.recipes.endpoint = self.recipes.endpoint.trim().to_string();
        if self.recipes.endpoint.is_empty() {
            self.recipes.endpoint = default_recipe_endpoint();
        }
        self.recipes.result_count = self.recipes.result_count.max(1);
        self.recipes.request_timeout_secs = self.recipes.request_timeout_secs.max(1);
        self
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let catalog = self.catalog();
        ensure!(
            !catalog.is_empty(),
            EmptyCatalogSnafu {
                stage: "validate-catalog",
            }
        );
        ensure!(
            catalog.contains(&self.llm.default_model),
            UnknownDefaultModelSnafu {
                stage: "validate-default-model",
                model_id: self.llm.default_model.clone(),
            }
        );
        if let Some(model) = catalog
            .models()
            .iter()
            .find(|model| model.max_tokens < self.llm.min_max_tokens)
        {
            return FloorAboveCeilingSnafu {
                stage: "validate-token-floor",
                model_id: model.id.clone(),
                floor: self.llm.min_max_tokens,
                ceiling: model.max_tokens,
            }
            .fail();
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, SettingsError> {
        self.bind_address.parse().context(BindAddressSnafu {
            stage: "parse-bind-address",
            address: self.bind_address.clone(),
        })
    }

    pub fn catalog(&self) -> ModelCatalog {
        ModelCatalog::new(self.llm.models.clone())
    }

    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            default_model: self.llm.default_model.clone(),
            default_max_tokens: self.llm.default_max_tokens,
            min_max_tokens: self.llm.min_max_tokens,
            stream_idle_timeout: Duration::from_secs(self.llm.stream_idle_timeout_secs),
        }
    }

    pub fn provider_config(&self, credentials: &Credentials) -> ProviderConfig {
        ProviderConfig::new(
            &self.llm.provider_id,
            &credentials.llm_api_key,
            &self.llm.endpoint,
        )
    }

    pub fn recipe_client_config(&self, credentials: &Credentials) -> RecipeClientConfig {
        RecipeClientConfig::new(&credentials.recipe_api_key)
            .with_endpoint(&self.recipes.endpoint)
            .with_timeout(Duration::from_secs(self.recipes.request_timeout_secs))
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:8501".to_string()
}

fn default_session_ttl_secs() -> u64 {
    12 * 60 * 60
}

fn default_provider_id() -> String {
    GROQ_PROVIDER_ID.to_string()
}

fn default_llm_endpoint() -> String {
    GROQ_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_GROQ_MODEL.to_string()
}

fn default_max_tokens() -> u64 {
    32768
}

fn default_min_max_tokens() -> u64 {
    512
}

fn default_max_tokens_step() -> u64 {
    512
}

fn default_stream_idle_timeout_secs() -> u64 {
    60
}

fn default_recipe_endpoint() -> String {
    SPOONACULAR_SEARCH_ENDPOINT.to_string()
}

fn default_result_count() -> u32 {
    DEFAULT_RESULT_COUNT
}

fn default_recipe_timeout_secs() -> u64 {
    20
}
