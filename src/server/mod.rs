//! # Server Module
//!
//! HTTP transport adapter and the per-request pipeline.
//!
//! ## Overview
//!
//! - [`request`] - raw request parsing (headers, cookies, query, JSON body)
//! - [`response`] - the two-branch serialization policy and wire writing
//! - [`service`] - [`AppService`], the pipeline ordering authentication,
//!   route resolution, rotation, body coercion and dispatch
//! - [`http_server`] - wrapper around `may_minihttp` with a ready/stop/join
//!   handle
//!
//! The pipeline core is transport-free: [`AppService::handle`] consumes a
//! [`ParsedRequest`] and returns a
//! [`HandlerResponse`](crate::dispatcher::HandlerResponse), so integration
//! tests drive it without sockets. Transport concerns (TLS, ports, timeouts)
//! belong to the layer outside this crate.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_cookies, parse_query_params, parse_request, ParsedRequest};
pub use response::{render_body, write_handler_response};
pub use service::AppService;
