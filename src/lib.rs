//! # Hawker
//!
//! **Hawker** is a convention-driven, coroutine-powered request dispatcher
//! with self-healing key/secret credentials, built on the `may` runtime and
//! `may_minihttp`.
//!
//! ## Overview
//!
//! Hawker maps a route-definition source - a directory tree or an in-memory
//! nested tree - onto HTTP routes, coerces request bodies against per-route
//! parameter schemas, and authenticates every request with a credential
//! scheme that detects compromise attempts and silently rotates the
//! affected pair.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`routes`]** - route compilation from directory or object trees into
//!   a frozen route table
//! - **[`router`]** - exact `(method, path)` matching with named-parameter
//!   extraction
//! - **[`dispatcher`]** - coroutine-based handler dispatch with panic
//!   recovery and chunked output support
//! - **[`coerce`]** - allow-list body coercion against declared parameter
//!   schemas
//! - **[`credentials`]** - pair generation, basic-auth verification, rusty
//!   detection and the rotation flow
//! - **[`server`]** - the per-request pipeline and the `may_minihttp`
//!   transport adapter
//! - **[`middleware`]** - pluggable before/after hooks (tracing)
//!
//! ## Request flow
//!
//! 1. The route compiler runs once at startup: handler definitions become a
//!    frozen [`routes::RouteTable`], consumed by the [`router::Router`].
//! 2. Per request, the [`server::AppService`] pipeline runs: Basic-Auth
//!    verification (with rusty detection on secret mismatch), route
//!    resolution, credential rotation when triggered, body coercion when
//!    the path declares a schema, then dispatch to the handler coroutine.
//! 3. The handler's return value is serialized by an explicit two-branch
//!    policy: plain strings pass through verbatim, structured data (and
//!    `[`-leading strings) go out as JSON. Streaming handlers produce
//!    chunks drained in production order.
//!
//! ## Credential self-healing
//!
//! Lookups go by key only. A wrong secret against a known key marks that
//! credential `rusty`; the next valid authentication on it triggers
//! rotation, and the fresh `key:secret` pair reaches the client in the
//! `x-rusty` response header. See the [`credentials`] module docs.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hawker::dispatcher::{Dispatcher, HandlerOutput};
//! use hawker::router::Router;
//! use hawker::routes::{compile_tree, RouteNode};
//! use hawker::runtime_config::RuntimeConfig;
//! use hawker::server::{AppService, HttpServer};
//!
//! let root = RouteNode::tree(vec![(
//!     "health",
//!     RouteNode::tree(vec![(
//!         "get",
//!         RouteNode::handler(|_req| {
//!             HandlerOutput::Value(serde_json::json!({ "status": "ok" }))
//!         }),
//!     )]),
//! )]);
//!
//! let (errors, _error_rx) = may::sync::mpsc::channel();
//! let table = compile_tree(&root, &errors);
//! let router = Arc::new(Router::new(&table));
//!
//! let config = RuntimeConfig::from_env();
//! let mut dispatcher = Dispatcher::new();
//! unsafe { dispatcher.register_table(&table, &config) };
//!
//! let service = AppService::new(router, Arc::new(dispatcher), None);
//! let handle = HttpServer(service).start("127.0.0.1:8080").unwrap();
//! handle.join().unwrap();
//! ```
//!
//! ## Runtime considerations
//!
//! Hawker uses the `may` coroutine runtime, not tokio or async-std:
//!
//! - every handler runs in a coroutine spawned at registration time
//! - stack size is configurable via the `HAWKER_STACK_SIZE` environment
//!   variable (see [`runtime_config`])
//! - store implementations may block; under `may` that stalls only the
//!   calling coroutine

pub mod coerce;
pub mod credentials;
pub mod dispatcher;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod runtime_config;
pub mod server;

pub use credentials::{AuthGuard, AuthOutcome, Credential, CredentialStore, UserRecord};
pub use routes::{compile_dir, compile_tree, HandlerRegistry, RouteNode, RouteTable};
