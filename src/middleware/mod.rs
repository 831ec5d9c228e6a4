//! # Middleware Module
//!
//! Pluggable hooks around request dispatch. Middleware runs in insertion
//! order: `before` ahead of the handler (and may short-circuit it), `after`
//! once the response exists.

mod core;
mod tracing;

pub use core::Middleware;
pub use tracing::TracingMiddleware;
