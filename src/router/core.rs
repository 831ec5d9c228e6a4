//! Router core - hot path for request routing.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use tracing::{debug, error, info, warn};

use crate::routes::{RouteMeta, RouteTable};

/// Maximum number of path/query parameters before heap allocation.
/// Most routes carry well under 8 (e.g. `/users/:id/posts/:post_id`).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` because they come from the static route table
/// (known at startup) and `Arc::clone` is an O(1) atomic increment; values
/// are per-request data from the URL and stay `String`.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of matching a request to a compiled route.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route entry (Arc to avoid expensive clones)
    pub route: Arc<RouteMeta>,
    /// Path parameters extracted from the URL (`:id` captures)
    pub path_params: ParamVec,
    /// Resolved source path of the handler that should run
    pub handler_name: String,
    /// Query string parameters (populated by the server layer)
    pub query_params: ParamVec,
}

impl RouteMatch {
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

    /// Convert path_params to a HashMap. Allocates; prefer
    /// [`RouteMatch::get_path_param`] in hot paths.
    #[must_use]
    pub fn path_params_map(&self) -> HashMap<String, String> {
        self.path_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// Matches `(method, path)` pairs against the compiled route table.
///
/// Each table entry compiles to a regex at construction; matching is exact,
/// with no prefix or fallback semantics - a miss is a miss, delegated to the
/// server layer's not-found handling.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<(Method, Regex, Arc<RouteMeta>, Vec<Arc<str>>)>,
}

impl Router {
    /// Build a router over a frozen route table.
    ///
    /// Entries keep the table's deterministic order, so matching behavior is
    /// reproducible across recompilations of the same source.
    #[must_use]
    pub fn new(table: &RouteTable) -> Self {
        let mut routes = Vec::with_capacity(table.len());
        for route in table.iter() {
            let (regex, param_names) = match Self::path_to_regex(&route.path_pattern) {
                Ok(compiled) => compiled,
                Err(err) => {
                    error!(
                        path_pattern = %route.path_pattern,
                        error = %err,
                        "Route pattern failed to compile, entry skipped"
                    );
                    continue;
                }
            };
            routes.push((route.method.clone(), regex, Arc::clone(route), param_names));
        }

        info!(
            routes_count = routes.len(),
            "Routing table loaded"
        );

        Self { routes }
    }

    /// Match an HTTP request to a route.
    ///
    /// # Returns
    ///
    /// * `Some(RouteMatch)` - a route matched; path parameters are extracted
    /// * `None` - no exact `(method, path)` match (results in 404)
    #[must_use]
    pub fn route(&self, method: Method, path: &str) -> Option<RouteMatch> {
        debug!(method = %method, path = %path, "Route match attempt");

        for (route_method, regex, meta, param_names) in &self.routes {
            if *route_method != method {
                continue;
            }
            let captures = match regex.captures(path) {
                Some(captures) => captures,
                None => continue,
            };

            let mut path_params = ParamVec::new();
            for (idx, name) in param_names.iter().enumerate() {
                if let Some(value) = captures.get(idx + 1) {
                    path_params.push((Arc::clone(name), value.as_str().to_string()));
                }
            }

            info!(
                method = %method,
                path = %path,
                handler_name = %meta.handler_name,
                route_pattern = %meta.path_pattern,
                "Route matched"
            );

            return Some(RouteMatch {
                route: Arc::clone(meta),
                path_params,
                handler_name: meta.handler_name.clone(),
                query_params: ParamVec::new(),
            });
        }

        warn!(method = %method, path = %path, "No route matched");
        None
    }

    /// Convert a compiled path pattern to a regex and its parameter names.
    ///
    /// `/users/:id` becomes `^/users/([^/]+)$` with parameter names
    /// `["id"]`. Literal segments are escaped, so patterns never gain
    /// accidental regex semantics.
    pub(crate) fn path_to_regex(path: &str) -> Result<(Regex, Vec<Arc<str>>), regex::Error> {
        if path == "/" {
            return Ok((Regex::new(r"^/$")?, Vec::new()));
        }

        let mut pattern = String::with_capacity(path.len() + 8);
        pattern.push('^');
        let mut param_names: Vec<Arc<str>> = Vec::with_capacity(path.matches(':').count());

        for segment in path.split('/') {
            if let Some(name) = segment.strip_prefix(':') {
                pattern.push_str("/([^/]+)");
                param_names.push(Arc::from(name));
            } else if !segment.is_empty() {
                pattern.push('/');
                pattern.push_str(&regex::escape(segment));
            }
        }

        pattern.push('$');
        Ok((Regex::new(&pattern)?, param_names))
    }
}
