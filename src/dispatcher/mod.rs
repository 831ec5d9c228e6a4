//! # Dispatcher Module
//!
//! Coroutine-based request handler dispatch.
//!
//! ## Overview
//!
//! The dispatcher owns one coroutine per compiled route. It:
//! - spawns handler coroutines from a frozen [`RouteTable`](crate::routes::RouteTable)
//! - routes matched requests to them via MPSC channels
//! - translates handler output into exactly one response per request
//! - recovers from handler panics with a 500 instead of a dead server
//!
//! ## Handler contract
//!
//! A handler receives the (possibly coerced) request and returns a
//! [`HandlerOutput`]:
//!
//! - [`HandlerOutput::Value`] - a value the server layer serializes
//! - [`HandlerOutput::Completed`] - the handler already replied through the
//!   request's output sink ([`HandlerRequest::reply_tx`]); nothing further is
//!   written
//! - [`HandlerOutput::Stream`] - a single-pass chunk sequence, drained in
//!   production order into the response body
//!
//! ## Request flow
//!
//! 1. Router matches the incoming request to a route
//! 2. Dispatcher looks up the handler's channel by name
//! 3. The request is sent to the handler coroutine
//! 4. The handler's output is translated and sent back on the reply channel
//! 5. Middleware `after` hooks run, then the response goes to the client
//!
//! Stack size for handler coroutines comes from
//! [`RuntimeConfig`](crate::runtime_config::RuntimeConfig) (the
//! `HAWKER_STACK_SIZE` environment variable).

mod core;

pub use core::{
    ChunkStream, Dispatcher, Handler, HandlerOutput, HandlerRequest, HandlerResponse,
    HandlerSender, HeaderVec, MAX_INLINE_HEADERS,
};
