//! Recipe search over the Spoonacular `complexSearch` endpoint.
mod client;
mod types;

pub use client::{
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_RESULT_COUNT, RecipeClient, RecipeClientConfig, RecipeError,
    RecipeResult, SPOONACULAR_SEARCH_ENDPOINT, SearchOutcome, build_query,
};
pub use types::{CUISINE_OPTIONS, DIET_OPTIONS, Recipe, RecipeQuery};
