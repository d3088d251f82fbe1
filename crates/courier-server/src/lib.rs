//! HTTP long-poll transport: one POST route carrying JSON envelope batches.

pub mod handlers;
pub mod server;

pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
