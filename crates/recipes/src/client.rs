use std::time::Duration;

use snafu::{ResultExt, Snafu, ensure};

use crate::types::{Recipe, RecipeQuery, SearchResponse};

pub const SPOONACULAR_SEARCH_ENDPOINT: &str = "https://api.spoonacular.com/recipes/complexSearch";
pub const DEFAULT_RESULT_COUNT: u32 = 10;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeClientConfig {
    pub api_key: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl RecipeClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
            endpoint: SPOONACULAR_SEARCH_ENDPOINT.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        if !endpoint.trim().is_empty() {
            self.endpoint = endpoint.trim().to_string();
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RecipeError {
    #[snafu(display("please enter at least one search criterion"))]
    EmptyCriteria { stage: &'static str },
    #[snafu(display("missing recipe API key"))]
    MissingApiKey { stage: &'static str },
    #[snafu(display("failed to build recipe HTTP client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("recipe request failed on `{stage}`: {source}"))]
    Send {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("Error fetching recipes: {status}"))]
    Status { stage: &'static str, status: u16 },
    #[snafu(display("failed to decode recipe response on `{stage}`: {source}"))]
    Decode {
        stage: &'static str,
        source: reqwest::Error,
    },
}

pub type RecipeResult<T> = Result<T, RecipeError>;

/// Result of a search that never fails outright: errors travel alongside an empty list.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub recipes: Vec<Recipe>,
    pub error: Option<RecipeError>,
}

impl SearchOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Translates filters into the query-string pairs of a `complexSearch` request.
pub fn build_query(query: &RecipeQuery, count: u32, api_key: &str) -> Vec<(&'static str, String)> {
    let mut params = vec![("includeIngredients", query.ingredients.clone())];

    if !query.cuisines.is_empty() {
        params.push(("cuisine", query.cuisines.join(",")));
    }

    if !query.diets.is_empty() {
        let diets = query
            .diets
            .iter()
            .map(|diet| diet.to_lowercase())
            .collect::<Vec<_>>();
        params.push(("diet", diets.join(",")));
    }

    params.push(("number", count.to_string()));
    params.push(("addRecipeInformation", "true".to_string()));
    params.push(("fillIngredients", "true".to_string()));
    params.push(("apiKey", api_key.to_string()));
    params
}

#[derive(Debug, Clone)]
pub struct RecipeClient {
    http: reqwest::Client,
    config: RecipeClientConfig,
}

impl RecipeClient {
    pub fn new(config: RecipeClientConfig) -> RecipeResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "recipe-client-new",
            }
        );

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context(BuildClientSnafu {
                stage: "build-http-client",
            })?;

        Ok(Self { http, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Searches recipes, reporting failures through the outcome instead of raising them.
    pub async fn fetch_recipes(&self, query: &RecipeQuery, count: u32) -> SearchOutcome {
        match self.try_fetch_recipes(query, count).await {
            Ok(recipes) => {
                tracing::info!(
                    recipe_count = recipes.len(),
                    cuisine_count = query.cuisines.len(),
                    diet_count = query.diets.len(),
                    "recipe search completed"
                );
                SearchOutcome {
                    recipes,
                    error: None,
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "recipe search failed");
                SearchOutcome {
                    recipes: Vec::new(),
                    error: Some(error),
                }
            }
        }
    }

    async fn try_fetch_recipes(&self, query: &RecipeQuery, count: u32) -> RecipeResult<Vec<Recipe>> {
        ensure!(
            !query.is_empty(),
            EmptyCriteriaSnafu {
                stage: "validate-criteria",
            }
        );

        let params = build_query(query, count, &self.config.api_key);
        let response = self
            .http
            .get(&self.config.endpoint)
            .query(&params)
            .send()
            .await
            .context(SendSnafu {
                stage: "send-search-request",
            })?;

        let status = response.status();
        if !status.is_success() {
            return StatusSnafu {
                stage: "search-http-status",
                status: status.as_u16(),
            }
            .fail();
        }

        let body = response
            .json::<SearchResponse>()
            .await
            .context(DecodeSnafu {
                stage: "decode-search-response",
            })?;

        Ok(body.results)
    }
}
