//! Cooking assistant web app: recipe search plus a streaming chat with a hosted model.

pub mod chat;
pub mod server;
pub mod session;
pub mod settings;
pub mod view;
