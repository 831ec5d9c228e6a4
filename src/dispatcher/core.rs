//! Dispatcher core - hot path for request dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Method;
use may::coroutine;
use may::sync::mpsc;
use serde_json::Value;
use smallvec::SmallVec;
use tracing::{debug, error, info, warn};

use crate::middleware::Middleware;
use crate::router::{ParamVec, RouteMatch};
use crate::routes::{RouteMeta, RouteTable};
use crate::runtime_config::RuntimeConfig;

/// Maximum inline headers/cookies before heap allocation.
/// Most requests carry well under 16 of either.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header/cookie storage for the hot path.
///
/// Header names use `Arc<str>` because they repeat across requests
/// (content-type, authorization, ...) and `Arc::clone` is an O(1) atomic
/// increment; values are per-request data and stay `String`.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Lazy sequence of output chunks produced by a streaming handler.
///
/// Single-pass and non-restartable: the dispatcher drains it exactly once,
/// writing chunks in production order.
pub type ChunkStream = Box<dyn Iterator<Item = String> + Send>;

/// What a handler returns after being invoked with a request.
pub enum HandlerOutput {
    /// The handler already replied through the request's output sink;
    /// the dispatcher writes nothing further.
    Completed,
    /// A value to serialize into the response body.
    Value(Value),
    /// A lazy chunk sequence, drained in production order.
    Stream(ChunkStream),
}

impl std::fmt::Debug for HandlerOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerOutput::Completed => f.write_str("Completed"),
            HandlerOutput::Value(v) => f.debug_tuple("Value").field(v).finish(),
            HandlerOutput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A route handler: receives the (possibly coerced) request and returns its
/// output. The request carries the reply channel as the output sink for
/// handlers that end the response themselves.
pub type Handler = Arc<dyn Fn(&HandlerRequest) -> HandlerOutput + Send + Sync>;

/// Request data passed to a handler coroutine.
///
/// Uses `SmallVec` storage for params, headers and cookies so the common
/// case stays off the heap.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// HTTP method (GET, POST, ...)
    pub method: Method,
    /// Matched path pattern (e.g. `/users/:id`)
    pub path: String,
    /// Resolved source path of the handler (e.g. `users/_id/get`)
    pub handler_name: String,
    /// Path parameters extracted from the URL
    pub path_params: ParamVec,
    /// Query string parameters
    pub query_params: ParamVec,
    /// HTTP headers (lowercase names)
    pub headers: HeaderVec,
    /// Cookies parsed from the Cookie header
    pub cookies: HeaderVec,
    /// Request body, coerced when the route declares a schema
    pub body: Option<Value>,
    /// Output sink: handlers that end the response themselves send exactly
    /// one [`HandlerResponse`] here and return [`HandlerOutput::Completed`]
    pub reply_tx: mpsc::Sender<HandlerResponse>,
}

impl HandlerRequest {
    /// Get a path parameter by name.
    ///
    /// Last write wins when duplicate names appear at different path depths.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name (last write wins).
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a cookie by name.
    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Body field accessor for handlers working with coerced bodies.
    #[inline]
    #[must_use]
    pub fn get_body_field(&self, name: &str) -> Option<&Value> {
        self.body.as_ref().and_then(|b| b.get(name))
    }
}

/// Response data sent back from a handler coroutine.
#[derive(Debug, Clone)]
pub struct HandlerResponse {
    /// HTTP status code (200, 404, 500, ...)
    pub status: u16,
    /// HTTP response headers
    pub headers: HeaderVec,
    /// Response body; the serialization policy in the server layer decides
    /// its wire form
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A 200 response around a handler's returned value.
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::new(200, HeaderVec::new(), body)
    }

    /// An error response with a JSON `{ "error": ... }` body.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::new(
            status,
            HeaderVec::new(),
            serde_json::json!({ "error": message }),
        )
    }

    /// Get a header by name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header.
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// Channel sender that feeds a handler coroutine.
pub type HandlerSender = mpsc::Sender<HandlerRequest>;

/// Routes requests to registered handler coroutines.
///
/// One coroutine is spawned per route at registration time; requests travel
/// to it over an MPSC channel and the response comes back on a per-request
/// reply channel. Middleware runs around the channel round-trip.
#[derive(Clone, Default)]
pub struct Dispatcher {
    /// Handler names to their channel senders
    pub handlers: HashMap<String, HandlerSender>,
    /// Ordered middleware applied to every dispatched request
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl Dispatcher {
    /// Create an empty dispatcher; register routes before serving.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add middleware to the processing pipeline. Executed in insertion
    /// order, before and after each dispatch.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    /// Spawn a handler coroutine for every entry of a compiled route table.
    ///
    /// # Safety
    ///
    /// Calls [`Dispatcher::register_route`] for each entry; the same safety
    /// requirements apply.
    pub unsafe fn register_table(&mut self, table: &RouteTable, config: &RuntimeConfig) {
        for route in table.iter() {
            self.register_route(route, config);
        }
    }

    /// Spawn the handler coroutine for one route and register its sender.
    ///
    /// The handler is wrapped with panic recovery: a panicking handler
    /// produces a 500 response instead of killing the server. Registering a
    /// name twice replaces the old sender, which closes the old coroutine's
    /// channel and lets it exit.
    ///
    /// # Safety
    ///
    /// Marked unsafe because `may::coroutine::Builder::spawn` is unsafe in
    /// the `may` runtime. The caller must ensure the runtime is initialized
    /// and call this during startup, before serving begins.
    pub unsafe fn register_route(&mut self, route: &Arc<RouteMeta>, config: &RuntimeConfig) {
        let (tx, rx) = mpsc::channel::<HandlerRequest>();
        let name = route.handler_name.clone();
        let handler_fn = route.handler.clone();
        let stack_size = config.stack_size;

        if let Some(old_sender) = self.handlers.remove(&name) {
            drop(old_sender);
            warn!(
                handler_name = %name,
                "Replaced existing handler - old coroutine will exit"
            );
        }

        let coroutine_name = name.clone();
        // SAFETY: spawn is unsafe per the may runtime's requirements, not
        // this function's logic. The closure is Send + 'static (it owns Arc
        // clones of the handler), registration happens at startup, and every
        // failure path replies through the channel rather than unwinding out.
        let spawn_result = unsafe {
            coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || {
                    debug!(
                        handler_name = %coroutine_name,
                        stack_size = stack_size,
                        "Handler coroutine start"
                    );

                    for req in rx.iter() {
                        let reply_tx = req.reply_tx.clone();
                        let handler_name = req.handler_name.clone();
                        let start = Instant::now();

                        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(
                            || handler_fn(&req),
                        ));

                        match outcome {
                            Err(panic) => {
                                let panic_message = format!("{panic:?}");
                                error!(
                                    handler_name = %handler_name,
                                    panic_message = %panic_message,
                                    "Handler panicked"
                                );
                                let _ = reply_tx
                                    .send(HandlerResponse::error(500, "Handler panicked"));
                            }
                            Ok(output) => {
                                reply_with_output(&reply_tx, &handler_name, output);
                                debug!(
                                    handler_name = %handler_name,
                                    execution_time_ms = start.elapsed().as_millis() as u64,
                                    "Handler execution complete"
                                );
                            }
                        }
                    }
                })
        };

        if let Err(e) = spawn_result {
            error!(
                handler_name = %name,
                error = %e,
                stack_size = stack_size,
                "Failed to spawn handler coroutine"
            );
            return;
        }

        info!(
            handler_name = %name,
            total_handlers = self.handlers.len() + 1,
            "Handler registered"
        );
        self.handlers.insert(name, tx);
    }

    /// Dispatch a request to the matched route's handler.
    ///
    /// Sends the request over the handler's channel and blocks the calling
    /// coroutine on the reply. Returns `None` when no handler is registered
    /// for the route; a closed handler channel yields a 503 so the
    /// connection is answered rather than dropped.
    #[must_use]
    pub fn dispatch(
        &self,
        route_match: RouteMatch,
        body: Option<Value>,
        headers: HeaderVec,
        cookies: HeaderVec,
    ) -> Option<HandlerResponse> {
        let (reply_tx, reply_rx) = mpsc::channel();

        let tx = match self.handlers.get(&route_match.handler_name) {
            Some(tx) => tx,
            None => {
                error!(
                    handler_name = %route_match.handler_name,
                    available_handlers = self.handlers.len(),
                    "Handler not registered"
                );
                return None;
            }
        };

        let request = HandlerRequest {
            method: route_match.route.method.clone(),
            path: route_match.route.path_pattern.clone(),
            handler_name: route_match.handler_name,
            path_params: route_match.path_params,
            query_params: route_match.query_params,
            headers,
            cookies,
            body,
            reply_tx,
        };

        let mut early_resp: Option<HandlerResponse> = None;
        for mw in &self.middlewares {
            if early_resp.is_none() {
                early_resp = mw.before(&request);
            } else {
                mw.before(&request);
            }
        }

        let (mut resp, latency) = if let Some(r) = early_resp {
            (r, Duration::from_millis(0))
        } else {
            info!(
                handler_name = %request.handler_name,
                method = %request.method,
                path = %request.path,
                "Request dispatched to handler"
            );
            let start = Instant::now();

            if let Err(e) = tx.send(request.clone()) {
                error!(
                    handler_name = %request.handler_name,
                    error = %e,
                    "Failed to send request to handler"
                );
                return None;
            }

            match reply_rx.recv() {
                Ok(response) => {
                    let elapsed = start.elapsed();
                    info!(
                        handler_name = %request.handler_name,
                        latency_ms = elapsed.as_millis() as u64,
                        status = response.status,
                        "Handler response received"
                    );
                    (response, elapsed)
                }
                Err(e) => {
                    error!(
                        handler_name = %request.handler_name,
                        error = %e,
                        "Handler channel closed - handler may have crashed"
                    );
                    return Some(HandlerResponse::error(503, "Handler is not responding"));
                }
            }
        };

        for mw in &self.middlewares {
            mw.after(&request, &mut resp, latency);
        }

        Some(resp)
    }
}

/// Translate a handler's output into at most one reply on the sink.
fn reply_with_output(
    reply_tx: &mpsc::Sender<HandlerResponse>,
    handler_name: &str,
    output: HandlerOutput,
) {
    match output {
        // The handler already ended the response through the sink.
        HandlerOutput::Completed => {}
        HandlerOutput::Value(value) => {
            let _ = reply_tx.send(HandlerResponse::ok(value));
        }
        HandlerOutput::Stream(chunks) => {
            let mut body = String::new();
            let mut produced = 0usize;
            for chunk in chunks {
                body.push_str(&chunk);
                produced += 1;
            }
            debug!(
                handler_name = %handler_name,
                chunks = produced,
                "Chunk stream drained"
            );
            let _ = reply_tx.send(HandlerResponse::ok(Value::String(body)));
        }
    }
}
