//! JSON API over the session registry

pub mod routes;
pub mod server;

pub use server::{create_app, AppState};
