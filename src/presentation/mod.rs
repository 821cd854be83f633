// Presentation layer - Read-only HTTP API
pub mod app_state;
pub mod handlers;
