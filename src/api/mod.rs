// HTTP API for the listing-sync service. Consumed by the main web app,
// which triggers syncs and polls listing status over these endpoints.

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use server::ApiServer;
