pub mod accounting;
pub mod app;
pub mod auth;
pub mod billing;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod loader;
pub mod middleware;
pub mod modules;
pub mod session;
pub mod subscription;
pub mod types;

pub use app::{router, AppState};
