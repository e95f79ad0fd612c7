pub mod admin;
pub mod auth;
pub mod courses;
pub mod middleware;
pub mod pages;
pub mod progress;
pub mod rest;
pub mod state;

// Re-export the router builder to make it easily accessible
// to the binary that serves it.
pub use rest::{router, ApiDoc};
pub use state::AppState;
