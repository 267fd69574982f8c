//! HTTP surface: viewer page, health, snapshot query and SSE push channel

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
