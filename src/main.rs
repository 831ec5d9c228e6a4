use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use hawker::coerce::{FieldType, ParamSchema};
use hawker::credentials::{generate_pair, AuthGuard, CredentialStore, StoreError, UserRecord};
use hawker::dispatcher::{Dispatcher, HandlerOutput};
use hawker::middleware::TracingMiddleware;
use hawker::router::Router;
use hawker::routes::{compile_tree, RouteNode};
use hawker::runtime_config::RuntimeConfig;
use hawker::server::{AppService, HttpServer};

#[derive(Parser)]
#[command(name = "hawker", about = "Demo service for the hawker dispatch core")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,

    /// Serve without an authentication guard (development only)
    #[arg(long)]
    insecure: bool,
}

/// In-memory credential store backing the demo.
#[derive(Default)]
struct MemoryStore {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryStore {
    fn seeded(username: &str, password: &str) -> Self {
        let store = Self::default();
        let user = UserRecord {
            id: "user-1".to_string(),
            username: username.to_string(),
            password: password.to_string(),
            credential: generate_pair(&format!("{username}:{password}")),
        };
        store
            .users
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(user.id.clone(), user);
        store
    }

    fn guarded(&self) -> std::sync::MutexGuard<'_, HashMap<String, UserRecord>> {
        self.users
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryStore {
    fn find_by_key(&self, key: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .guarded()
            .values()
            .find(|u| u.credential.key == key)
            .cloned())
    }

    fn find_by_identity(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .guarded()
            .values()
            .find(|u| u.username == username && u.password == password)
            .cloned())
    }

    fn save(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.guarded().insert(user.id.clone(), user.clone());
        Ok(())
    }
}

fn demo_routes() -> RouteNode {
    RouteNode::tree(vec![
        (
            "health",
            RouteNode::tree(vec![(
                "get",
                RouteNode::handler(|_req| HandlerOutput::Value(json!({ "status": "ok" }))),
            )]),
        ),
        (
            "users",
            RouteNode::tree(vec![
                (
                    "get",
                    RouteNode::handler(|_req| {
                        HandlerOutput::Value(json!([{ "id": "user-1", "name": "demo" }]))
                    }),
                ),
                (
                    "_id",
                    RouteNode::tree(vec![(
                        "get",
                        RouteNode::handler(|req| {
                            let id = req.get_path_param("id").unwrap_or_default();
                            HandlerOutput::Value(json!({ "id": id }))
                        }),
                    )]),
                ),
            ]),
        ),
        (
            "echo",
            RouteNode::tree(vec![
                (
                    "params",
                    RouteNode::params(
                        ParamSchema::new()
                            .field("message", FieldType::String)
                            .field("count", FieldType::Number),
                    ),
                ),
                (
                    "post",
                    RouteNode::handler(|req| {
                        HandlerOutput::Value(req.body.clone().unwrap_or(json!({})))
                    }),
                ),
            ]),
        ),
        (
            "stream",
            RouteNode::tree(vec![(
                "get",
                RouteNode::handler(|_req| {
                    let chunks = (1..=3).map(|i| format!("chunk {i}\n"));
                    HandlerOutput::Stream(Box::new(chunks))
                }),
            )]),
        ),
    ])
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = RuntimeConfig::from_env();
    may::config().set_stack_size(config.stack_size);

    let store = Arc::new(MemoryStore::seeded("demo", "demo-password"));
    let guard = Arc::new(AuthGuard::new(store));
    let pair = guard
        .issue_pair("demo", "demo-password")?
        .context("seeded user missing")?;
    println!("issued pair for `demo`: {}", pair.wire_pair());

    let (errors, error_rx) = may::sync::mpsc::channel();
    let table = compile_tree(&demo_routes(), &errors);
    drop(errors);
    for err in error_rx.iter() {
        tracing::error!(error = %err, "route compilation issue");
    }

    let router = Arc::new(Router::new(&table));
    let mut dispatcher = Dispatcher::new();
    // SAFETY: registration spawns handler coroutines; the may runtime is
    // configured above and serving has not started yet.
    unsafe { dispatcher.register_table(&table, &config) };
    dispatcher.add_middleware(Arc::new(TracingMiddleware));

    let guard = if args.insecure { None } else { Some(guard) };
    let service = AppService::new(router, Arc::new(dispatcher), guard);

    let handle = HttpServer(service).start(&args.addr)?;
    handle.wait_ready()?;
    println!("hawker listening on {}", args.addr);
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("server exited abnormally"))
}
