use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use snafu::Snafu;

use crate::chat::ChatError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("{source}"))]
    Chat {
        stage: &'static str,
        source: ChatError,
    },
    #[snafu(display("please enter a message"))]
    EmptyPrompt { stage: &'static str },
    #[snafu(display("a reply is already being generated for this session"))]
    SessionBusy { stage: &'static str },
    #[snafu(display("recipe {recipe_id} is not among the current search results"))]
    UnknownRecipe { stage: &'static str, recipe_id: u64 },
    #[snafu(display("select a recipe first"))]
    NoRecipeSelected { stage: &'static str },
    #[snafu(display("failed to render the page: {source}"))]
    Render {
        stage: &'static str,
        source: askama::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Chat { source, .. } => match source {
                ChatError::UnknownModel { .. }
                | ChatError::ModelNotSelected { .. }
                | ChatError::EmptyPrompt { .. } => StatusCode::BAD_REQUEST,
                ChatError::TurnRejected { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::EmptyPrompt { .. }
            | Self::UnknownRecipe { .. }
            | Self::NoRecipeSelected { .. } => StatusCode::BAD_REQUEST,
            Self::SessionBusy { .. } => StatusCode::CONFLICT,
            Self::Render { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}
