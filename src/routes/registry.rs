use std::collections::HashMap;

use crate::dispatcher::{Handler, HandlerOutput, HandlerRequest};

/// Handlers keyed by resolved source path.
///
/// Directory-tree compilation treats files as routing markers only; the code
/// behind `users/_id/get.js` is registered here under `users/_id/get` before
/// compilation runs. Built once at startup, read-only afterward.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its source path, replacing any previous
    /// registration for the same path.
    pub fn register<F>(&mut self, source_path: &str, handler: F)
    where
        F: Fn(&HandlerRequest) -> HandlerOutput + Send + Sync + 'static,
    {
        self.handlers
            .insert(source_path.to_string(), std::sync::Arc::new(handler));
    }

    #[must_use]
    pub fn get(&self, source_path: &str) -> Option<Handler> {
        self.handlers.get(source_path).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .finish()
    }
}
