use serde::{Deserialize, Serialize};

/// Cuisines offered in the search form.
pub const CUISINE_OPTIONS: [&str; 10] = [
    "Italian",
    "Chinese",
    "Mexican",
    "Indian",
    "French",
    "Japanese",
    "Mediterranean",
    "Thai",
    "American",
    "Spanish",
];

/// Dietary restrictions offered in the search form.
pub const DIET_OPTIONS: [&str; 9] = [
    "Vegetarian",
    "Vegan",
    "Gluten Free",
    "Keto",
    "Paleo",
    "Dairy Free",
    "Pescatarian",
    "Halal",
    "Kosher",
];

/// One search result, immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub cuisines: Vec<String>,
    #[serde(default)]
    pub diets: Vec<String>,
    #[serde(default)]
    pub ready_in_minutes: Option<u32>,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Filters entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecipeQuery {
    pub ingredients: String,
    pub cuisines: Vec<String>,
    pub diets: Vec<String>,
}

impl RecipeQuery {
    pub fn new(
        ingredients: impl Into<String>,
        cuisines: Vec<String>,
        diets: Vec<String>,
    ) -> Self {
        Self {
            ingredients: ingredients.into(),
            cuisines: non_blank(cuisines),
            diets: non_blank(diets),
        }
    }

    /// True when no criterion was given at all.
    pub fn is_empty(&self) -> bool {
        self.ingredients.trim().is_empty() && self.cuisines.is_empty() && self.diets.is_empty()
    }
}

fn non_blank(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: Vec<Recipe>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_tolerates_missing_optional_fields() {
        let recipe: Recipe =
            serde_json::from_str(r#"{"id": 42, "title": "Toast"}"#).expect("minimal recipe");
        assert_eq!(recipe.id, 42);
        assert!(recipe.cuisines.is_empty());
        assert!(recipe.image.is_none());
        assert!(recipe.ready_in_minutes.is_none());
    }

    #[test]
    fn recipe_reads_camel_case_fields() {
        let recipe: Recipe = serde_json::from_str(
            r#"{
                "id": 7,
                "title": "Garlic Chicken",
                "image": "https://img.example/7.jpg",
                "cuisines": ["Italian"],
                "diets": ["gluten free"],
                "readyInMinutes": 35,
                "sourceUrl": "https://example.com/garlic-chicken",
                "extendedIngredients": []
            }"#,
        )
        .expect("full recipe");
        assert_eq!(recipe.ready_in_minutes, Some(35));
        assert_eq!(
            recipe.source_url.as_deref(),
            Some("https://example.com/garlic-chicken")
        );
    }

    #[test]
    fn query_ignores_blank_selections() {
        let query = RecipeQuery::new("  ", vec![" ".to_string()], Vec::new());
        assert!(query.is_empty());
        assert!(!RecipeQuery::new("", Vec::new(), vec!["Vegan".to_string()]).is_empty());
    }

    #[test]
    fn missing_results_field_is_empty_list() {
        let response: SearchResponse =
            serde_json::from_str(r#"{"offset": 0, "totalResults": 0}"#).expect("response");
        assert!(response.results.is_empty());
    }
}
