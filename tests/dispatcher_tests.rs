//! Tests for the coroutine dispatcher: output translation, panic recovery,
//! chunk streaming and middleware ordering.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use serde_json::json;

use hawker::dispatcher::{
    Dispatcher, HandlerOutput, HandlerRequest, HandlerResponse, HeaderVec,
};
use hawker::middleware::{Middleware, TracingMiddleware};
use hawker::router::Router;
use hawker::routes::{compile_tree, RouteNode, RouteTable};
use hawker::runtime_config::RuntimeConfig;

mod common;
use common::init_runtime;

fn test_table() -> RouteTable {
    let root = RouteNode::tree(vec![
        (
            "value",
            RouteNode::tree(vec![(
                "get",
                RouteNode::handler(|_req| HandlerOutput::Value(json!({ "ok": true }))),
            )]),
        ),
        (
            "echo-param",
            RouteNode::tree(vec![(
                "_id",
                RouteNode::tree(vec![(
                    "get",
                    RouteNode::handler(|req| {
                        let id = req.get_path_param("id").unwrap_or_default();
                        HandlerOutput::Value(json!({ "id": id }))
                    }),
                )]),
            )]),
        ),
        (
            "boom",
            RouteNode::tree(vec![(
                "get",
                RouteNode::handler(|_req| -> HandlerOutput { panic!("boom") }),
            )]),
        ),
        (
            "stream",
            RouteNode::tree(vec![(
                "get",
                RouteNode::handler(|_req| {
                    HandlerOutput::Stream(Box::new((1..=3).map(|i| format!("chunk-{i};"))))
                }),
            )]),
        ),
        (
            "done",
            RouteNode::tree(vec![(
                "get",
                RouteNode::handler(|req| {
                    let _ = req.reply_tx.send(HandlerResponse::new(
                        201,
                        HeaderVec::new(),
                        json!("ended by handler"),
                    ));
                    HandlerOutput::Completed
                }),
            )]),
        ),
    ]);
    let (errors, _rx) = may::sync::mpsc::channel();
    compile_tree(&root, &errors)
}

fn build() -> (Router, Dispatcher) {
    init_runtime();
    let table = test_table();
    let router = Router::new(&table);
    let mut dispatcher = Dispatcher::new();
    let config = RuntimeConfig::from_env();
    unsafe { dispatcher.register_table(&table, &config) };
    (router, dispatcher)
}

fn dispatch(
    router: &Router,
    dispatcher: &Dispatcher,
    method: Method,
    path: &str,
) -> HandlerResponse {
    let route_match = router.route(method, path).expect("route match");
    dispatcher
        .dispatch(route_match, None, HeaderVec::new(), HeaderVec::new())
        .expect("dispatch")
}

#[test]
fn test_value_output_becomes_200() {
    let (router, dispatcher) = build();
    let resp = dispatch(&router, &dispatcher, Method::GET, "/value");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, json!({ "ok": true }));
}

#[test]
fn test_path_params_reach_the_handler() {
    let (router, dispatcher) = build();
    let resp = dispatch(&router, &dispatcher, Method::GET, "/echo-param/abc");
    assert_eq!(resp.body, json!({ "id": "abc" }));
}

#[test]
fn test_panic_recovers_to_500() {
    let (router, dispatcher) = build();
    let resp = dispatch(&router, &dispatcher, Method::GET, "/boom");
    assert_eq!(resp.status, 500);
    assert!(resp.body.get("error").is_some());

    // The handler coroutine survives the panic and keeps serving.
    let resp = dispatch(&router, &dispatcher, Method::GET, "/boom");
    assert_eq!(resp.status, 500);
}

#[test]
fn test_stream_chunks_drain_in_production_order() {
    let (router, dispatcher) = build();
    let resp = dispatch(&router, &dispatcher, Method::GET, "/stream");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, json!("chunk-1;chunk-2;chunk-3;"));
}

#[test]
fn test_completed_output_keeps_the_handler_response() {
    let (router, dispatcher) = build();
    let resp = dispatch(&router, &dispatcher, Method::GET, "/done");
    assert_eq!(resp.status, 201);
    assert_eq!(resp.body, json!("ended by handler"));
}

#[test]
fn test_unregistered_handler_yields_none() {
    init_runtime();
    let table = test_table();
    let router = Router::new(&table);
    // Nothing registered: dispatch has no channel to send on.
    let dispatcher = Dispatcher::new();
    let route_match = router.route(Method::GET, "/value").expect("route match");
    assert!(dispatcher
        .dispatch(route_match, None, HeaderVec::new(), HeaderVec::new())
        .is_none());
}

struct CountingMiddleware {
    before_calls: Arc<AtomicUsize>,
    after_calls: Arc<AtomicUsize>,
}

impl Middleware for CountingMiddleware {
    fn before(&self, _req: &HandlerRequest) -> Option<HandlerResponse> {
        self.before_calls.fetch_add(1, Ordering::SeqCst);
        None
    }

    fn after(&self, _req: &HandlerRequest, res: &mut HandlerResponse, _latency: Duration) {
        self.after_calls.fetch_add(1, Ordering::SeqCst);
        res.set_header("x-counted", "true".to_string());
    }
}

struct ShortCircuitMiddleware;

impl Middleware for ShortCircuitMiddleware {
    fn before(&self, _req: &HandlerRequest) -> Option<HandlerResponse> {
        Some(HandlerResponse::error(429, "rate limited"))
    }
}

#[test]
fn test_middleware_runs_around_dispatch() {
    init_runtime();
    let table = test_table();
    let router = Router::new(&table);
    let mut dispatcher = Dispatcher::new();
    let config = RuntimeConfig::from_env();
    unsafe { dispatcher.register_table(&table, &config) };

    let before_calls = Arc::new(AtomicUsize::new(0));
    let after_calls = Arc::new(AtomicUsize::new(0));
    dispatcher.add_middleware(Arc::new(TracingMiddleware));
    dispatcher.add_middleware(Arc::new(CountingMiddleware {
        before_calls: before_calls.clone(),
        after_calls: after_calls.clone(),
    }));

    let resp = dispatch(&router, &dispatcher, Method::GET, "/value");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("x-counted"), Some("true"));
    assert_eq!(before_calls.load(Ordering::SeqCst), 1);
    assert_eq!(after_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_middleware_short_circuit_skips_the_handler() {
    init_runtime();
    let table = test_table();
    let router = Router::new(&table);
    let mut dispatcher = Dispatcher::new();
    let config = RuntimeConfig::from_env();
    unsafe { dispatcher.register_table(&table, &config) };
    dispatcher.add_middleware(Arc::new(ShortCircuitMiddleware));

    let resp = dispatch(&router, &dispatcher, Method::GET, "/boom");
    // The short-circuit response comes back; the panicking handler never ran.
    assert_eq!(resp.status, 429);
}
