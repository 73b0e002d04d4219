//! API route handlers

pub mod diagnostics;
pub mod events;
pub mod graph;
pub mod health;
pub mod sse;
pub mod transcript;
