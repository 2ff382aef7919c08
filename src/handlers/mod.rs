//! HTTP surface: request handlers and the auth middleware.

pub mod auth;
pub mod file_handlers;
pub mod health_handlers;
pub mod user_handlers;
