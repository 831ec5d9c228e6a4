use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use http::Method;
use may::coroutine;
use may::sync::mpsc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::registry::HandlerRegistry;
use crate::coerce::ParamSchema;
use crate::dispatcher::Handler;
use crate::runtime_config::RuntimeConfig;

/// Reserved schema name: a `params.*` file or `params` key supplies the
/// [`ParamSchema`] for its level instead of binding a route.
pub const PARAMS_NAME: &str = "params";

/// Marker prefix turning a source segment into a named path parameter
/// (`_id` compiles to `:id`).
pub const PARAM_MARKER: char = '_';

/// HTTP method names a leaf may bind, in their lowercase source convention.
const METHOD_NAMES: [&str; 8] = [
    "get", "post", "put", "delete", "patch", "options", "head", "trace",
];

/// Sender half of the compile-time error channel.
///
/// Compilation never raises structural errors synchronously; it reports them
/// here and keeps walking unaffected siblings.
pub type ErrorSink = mpsc::Sender<CompileError>;

/// Structural problem found while compiling a route source.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("cannot read route source entry {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed parameter schema at `{path}`: {reason}")]
    MalformedSchema { path: String, reason: String },
    #[error("`{stem}` at `{path}` is not an HTTP method name")]
    UnknownMethod { path: String, stem: String },
    #[error("no handler registered for `{name}`")]
    MissingHandler { name: String },
    #[error("schema node at `{path}` must use the reserved `params` key")]
    MisplacedParams { path: String },
    #[error("route source root must be a tree of segments")]
    InvalidRoot,
}

/// One compiled route: method + path pattern + handler + optional schema.
///
/// Created once during compilation and immutable afterward. The schema is a
/// property of the *path*, shared by every method bound under it.
#[derive(Clone)]
pub struct RouteMeta {
    pub method: Method,
    /// Pattern with named parameter segments, e.g. `/users/:id`
    pub path_pattern: String,
    /// Resolved source path of the handler, e.g. `users/_id/get`
    pub handler_name: String,
    pub handler: Handler,
    pub schema: Option<Arc<ParamSchema>>,
}

impl std::fmt::Debug for RouteMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMeta")
            .field("method", &self.method)
            .field("path_pattern", &self.path_pattern)
            .field("handler_name", &self.handler_name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// The compiled, frozen route table.
///
/// Entries are stably ordered by (path pattern, method), so recompiling an
/// unchanged source yields an identical table whatever the traversal
/// interleaving was.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<Arc<RouteMeta>>,
}

impl RouteTable {
    fn freeze(mut entries: Vec<RouteMeta>) -> Self {
        entries.sort_by(|a, b| {
            a.path_pattern
                .cmp(&b.path_pattern)
                .then_with(|| a.method.as_str().cmp(b.method.as_str()))
        });
        info!(routes_count = entries.len(), "Route table frozen");
        Self {
            entries: entries.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RouteMeta>> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One node of an in-memory (object-tree) route source.
pub enum RouteNode {
    /// A path segment mapping names to child nodes.
    Tree(BTreeMap<String, RouteNode>),
    /// A method leaf carrying its handler inline.
    Handler(Handler),
    /// A parameter schema; only valid under the reserved `params` key.
    Params(ParamSchema),
}

impl RouteNode {
    /// Build a tree node from `(name, child)` pairs.
    #[must_use]
    pub fn tree<K, I>(children: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, RouteNode)>,
    {
        RouteNode::Tree(children.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Wrap a closure as a handler leaf.
    #[must_use]
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&crate::dispatcher::HandlerRequest) -> crate::dispatcher::HandlerOutput
            + Send
            + Sync
            + 'static,
    {
        RouteNode::Handler(Arc::new(f))
    }

    /// Wrap a schema for the reserved `params` key.
    #[must_use]
    pub fn params(schema: ParamSchema) -> Self {
        RouteNode::Params(schema)
    }
}

impl std::fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteNode::Tree(t) => f.debug_map().entries(t.iter()).finish(),
            RouteNode::Handler(_) => f.write_str("Handler(..)"),
            RouteNode::Params(s) => f.debug_tuple("Params").field(s).finish(),
        }
    }
}

/// Compile a directory-tree route source.
///
/// The root level is walked inline; every top-level subdirectory gets its
/// own traversal coroutine, all feeding one collection channel. The call
/// blocks until every traversal has joined, then freezes and returns the
/// table - serving must not begin before that.
///
/// Handlers are resolved from `registry` by source path; a file is only a
/// routing marker. Structural errors go to `errors` and drop the affected
/// entry or subtree only.
pub fn compile_dir(
    root: &Path,
    registry: &Arc<HandlerRegistry>,
    errors: &ErrorSink,
) -> RouteTable {
    let stack_size = RuntimeConfig::from_env().stack_size;
    let (out, collected) = mpsc::channel::<RouteMeta>();

    let entries = match read_sorted(root) {
        Ok(entries) => entries,
        Err(err) => {
            let _ = errors.send(CompileError::Unreadable {
                path: root.to_path_buf(),
                source: err,
            });
            return RouteTable::freeze(Vec::new());
        }
    };

    let schema = load_dir_schema(root, &entries, errors).map(Arc::new);
    let mut handles = Vec::new();

    for entry in &entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = match entry.file_type() {
            Ok(t) => t.is_dir(),
            Err(err) => {
                let _ = errors.send(CompileError::Unreadable {
                    path: entry.path(),
                    source: err,
                });
                continue;
            }
        };

        if is_dir {
            let path = entry.path();
            let pattern = format!("/{}", pattern_segment(&name));
            let source = name.clone();
            let task_registry = Arc::clone(registry);
            let task_out = out.clone();
            let task_errors = errors.clone();
            // SAFETY: spawn is unsafe per the may runtime's requirements.
            // The closure owns its captures, compilation runs at startup,
            // and every handle is joined before the table freezes.
            let spawned = unsafe {
                coroutine::Builder::new().stack_size(stack_size).spawn(move || {
                    walk_dir(
                        &path,
                        &pattern,
                        &source,
                        &task_registry,
                        &task_out,
                        &task_errors,
                    );
                })
            };
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    warn!(
                        subtree = %name,
                        error = %err,
                        "Failed to spawn traversal coroutine, walking inline"
                    );
                    walk_dir(
                        &entry.path(),
                        &format!("/{}", pattern_segment(&name)),
                        &name,
                        registry,
                        &out,
                        errors,
                    );
                }
            }
        } else {
            compile_file(&name, "/", "", registry, schema.as_ref(), &out, errors);
        }
    }

    drop(out);
    for handle in handles {
        let _ = handle.join();
    }
    RouteTable::freeze(collected.iter().collect())
}

/// Compile an in-memory (object-tree) route source.
///
/// The root must be a [`RouteNode::Tree`]; anything else reports
/// [`CompileError::InvalidRoot`] and yields an empty table.
pub fn compile_tree(root: &RouteNode, errors: &ErrorSink) -> RouteTable {
    let mut entries = Vec::new();
    match root {
        RouteNode::Tree(_) => walk_node(root, "", "", &mut entries, errors),
        _ => {
            let _ = errors.send(CompileError::InvalidRoot);
        }
    }
    RouteTable::freeze(entries)
}

/// Recursive directory walk; one invocation fully compiles one subtree.
fn walk_dir(
    dir: &Path,
    pattern: &str,
    source: &str,
    registry: &Arc<HandlerRegistry>,
    out: &mpsc::Sender<RouteMeta>,
    errors: &ErrorSink,
) {
    let entries = match read_sorted(dir) {
        Ok(entries) => entries,
        Err(err) => {
            let _ = errors.send(CompileError::Unreadable {
                path: dir.to_path_buf(),
                source: err,
            });
            return;
        }
    };

    let schema = load_dir_schema(dir, &entries, errors).map(Arc::new);

    for entry in &entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = match entry.file_type() {
            Ok(t) => t.is_dir(),
            Err(err) => {
                let _ = errors.send(CompileError::Unreadable {
                    path: entry.path(),
                    source: err,
                });
                continue;
            }
        };

        if is_dir {
            walk_dir(
                &entry.path(),
                &format!("{pattern}/{}", pattern_segment(&name)),
                &join_source(source, &name),
                registry,
                out,
                errors,
            );
        } else {
            compile_file(&name, pattern, source, registry, schema.as_ref(), out, errors);
        }
    }
}

/// Turn one method file into a route entry, resolving its handler from the
/// registry by source path.
fn compile_file(
    file_name: &str,
    pattern: &str,
    source: &str,
    registry: &Arc<HandlerRegistry>,
    schema: Option<&Arc<ParamSchema>>,
    out: &mpsc::Sender<RouteMeta>,
    errors: &ErrorSink,
) {
    let stem = file_stem(file_name);
    if stem == PARAMS_NAME {
        return;
    }
    let method = match parse_method(stem) {
        Some(method) => method,
        None => {
            let _ = errors.send(CompileError::UnknownMethod {
                path: join_source(source, file_name),
                stem: stem.to_string(),
            });
            return;
        }
    };
    let handler_name = join_source(source, stem);
    let handler = match registry.get(&handler_name) {
        Some(handler) => handler,
        None => {
            let _ = errors.send(CompileError::MissingHandler { name: handler_name });
            return;
        }
    };
    debug!(
        method = %method,
        path_pattern = %normalize_pattern(pattern),
        handler_name = %handler_name,
        "Route compiled"
    );
    let _ = out.send(RouteMeta {
        method,
        path_pattern: normalize_pattern(pattern),
        handler_name,
        handler,
        schema: schema.map(Arc::clone),
    });
}

/// Recursive object-tree walk, mirroring [`walk_dir`] semantics.
fn walk_node(
    node: &RouteNode,
    pattern: &str,
    source: &str,
    out: &mut Vec<RouteMeta>,
    errors: &ErrorSink,
) {
    let tree = match node {
        RouteNode::Tree(tree) => tree,
        // Callers only recurse into trees.
        _ => return,
    };

    let schema = match tree.get(PARAMS_NAME) {
        Some(RouteNode::Params(schema)) => Some(Arc::new(schema.clone())),
        Some(_) => {
            let _ = errors.send(CompileError::MalformedSchema {
                path: join_source(source, PARAMS_NAME),
                reason: "reserved `params` key must hold a schema".to_string(),
            });
            None
        }
        None => None,
    };

    for (key, child) in tree {
        if key == PARAMS_NAME {
            continue;
        }
        match child {
            RouteNode::Tree(_) => {
                walk_node(
                    child,
                    &format!("{pattern}/{}", pattern_segment(key)),
                    &join_source(source, key),
                    out,
                    errors,
                );
            }
            RouteNode::Handler(handler) => match parse_method(key) {
                Some(method) => {
                    let handler_name = join_source(source, key);
                    debug!(
                        method = %method,
                        path_pattern = %normalize_pattern(pattern),
                        handler_name = %handler_name,
                        "Route compiled"
                    );
                    out.push(RouteMeta {
                        method,
                        path_pattern: normalize_pattern(pattern),
                        handler_name,
                        handler: handler.clone(),
                        schema: schema.clone(),
                    });
                }
                None => {
                    let _ = errors.send(CompileError::UnknownMethod {
                        path: join_source(source, key),
                        stem: key.clone(),
                    });
                }
            },
            RouteNode::Params(_) => {
                let _ = errors.send(CompileError::MisplacedParams {
                    path: join_source(source, key),
                });
            }
        }
    }
}

/// Locate and parse the directory's `params.*` file, if any.
fn load_dir_schema(
    dir: &Path,
    entries: &[fs::DirEntry],
    errors: &ErrorSink,
) -> Option<ParamSchema> {
    let entry = entries.iter().find(|e| {
        let name = e.file_name();
        let name = name.to_string_lossy();
        !name.starts_with('.')
            && file_stem(&name) == PARAMS_NAME
            && e.file_type().map(|t| t.is_file()).unwrap_or(false)
    })?;

    let path = entry.path();
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            let _ = errors.send(CompileError::Unreadable { path, source: err });
            return None;
        }
    };

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let value: serde_json::Value = if is_yaml {
        match serde_yaml::from_str(&content) {
            Ok(value) => value,
            Err(err) => {
                let _ = errors.send(CompileError::MalformedSchema {
                    path: path.display().to_string(),
                    reason: err.to_string(),
                });
                return None;
            }
        }
    } else {
        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(err) => {
                let _ = errors.send(CompileError::MalformedSchema {
                    path: path.display().to_string(),
                    reason: err.to_string(),
                });
                return None;
            }
        }
    };

    match ParamSchema::from_value(&value) {
        Ok(schema) => Some(schema),
        Err(err) => {
            let _ = errors.send(CompileError::MalformedSchema {
                path: path.display().to_string(),
                reason: err.to_string(),
            });
            None
        }
    }
}

/// Directory entries sorted by name, so traversal order is reproducible.
fn read_sorted(dir: &Path) -> std::io::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(fs::DirEntry::file_name);
    Ok(entries)
}

fn parse_method(stem: &str) -> Option<Method> {
    let lower = stem.to_ascii_lowercase();
    if !METHOD_NAMES.contains(&lower.as_str()) {
        return None;
    }
    match Method::from_bytes(lower.to_ascii_uppercase().as_bytes()) {
        Ok(method) => Some(method),
        Err(err) => {
            error!(stem = %stem, error = %err, "Method name failed to parse");
            None
        }
    }
}

pub(super) fn pattern_segment(name: &str) -> String {
    match name.strip_prefix(PARAM_MARKER) {
        Some(rest) if !rest.is_empty() => format!(":{rest}"),
        _ => name.to_string(),
    }
}

fn normalize_pattern(pattern: &str) -> String {
    if pattern.is_empty() || pattern == "/" {
        "/".to_string()
    } else {
        pattern.to_string()
    }
}

fn join_source(source: &str, name: &str) -> String {
    if source.is_empty() {
        name.to_string()
    } else {
        format!("{source}/{name}")
    }
}

fn file_stem(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}
