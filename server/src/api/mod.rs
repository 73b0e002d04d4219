//! HTTP API

pub mod middleware;
pub mod routes;
pub mod server;
pub mod types;

pub use server::ApiServer;
