use serde::{Deserialize, Serialize};

/// One selectable completion backend and its token ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub max_tokens: u64,
    pub developer: String,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        max_tokens: u64,
        developer: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            max_tokens,
            developer: developer.into(),
        }
    }

    /// Label shown in the model picker.
    pub fn label(&self) -> String {
        if self.developer.trim().is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.developer)
        }
    }
}

/// Static, read-only list of models offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    /// Builds a catalog, dropping blank ids and keeping the first entry for duplicated ids.
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        let mut unique: Vec<ModelDescriptor> = Vec::with_capacity(models.len());
        for mut model in models {
            model.id = model.id.trim().to_string();
            if model.id.is_empty() || unique.iter().any(|known| known.id == model.id) {
                continue;
            }
            if model.name.trim().is_empty() {
                model.name = model.id.clone();
            }
            unique.push(model);
        }

        Self { models: unique }
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|model| model.id == model_id)
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.get(model_id).is_some()
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

pub const DEFAULT_GROQ_MODEL: &str = "mixtral-8x7b-32768";

pub fn default_groq_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::new("gemma-7b-it", "Gemma-7b-it", 8192, "Google"),
        ModelDescriptor::new("llama2-70b-4096", "LLaMA2-70b-chat", 4096, "Meta"),
        ModelDescriptor::new("llama3-70b-8192", "LLaMA3-70b-8192", 8192, "Meta"),
        ModelDescriptor::new("llama3-8b-8192", "LLaMA3-8b-8192", 8192, "Meta"),
        ModelDescriptor::new(
            "mixtral-8x7b-32768",
            "Mixtral-8x7b-Instruct-v0.1",
            32768,
            "Mistral",
        ),
    ]
}
