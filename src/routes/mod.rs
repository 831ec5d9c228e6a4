//! # Routes Module
//!
//! Convention-driven route compilation.
//!
//! ## Overview
//!
//! The compiler walks a route-definition source and produces a frozen
//! [`RouteTable`] of `(method, path pattern, handler, optional schema)`
//! entries. Two source shapes compile to equivalent semantics:
//!
//! - **Directory tree** ([`compile_dir`]): a subdirectory contributes a path
//!   segment; a name with the leading `_` marker becomes a named parameter
//!   (`users/_id` compiles to `/users/:id`). A file is a method leaf - its
//!   stem is the HTTP method name, and the handler is resolved from a
//!   [`HandlerRegistry`] keyed by the file's source path (`users/_id/get`).
//!   A `params.*` file is never a method leaf: it declares the directory's
//!   [`ParamSchema`](crate::coerce::ParamSchema).
//! - **Object tree** ([`compile_tree`]): nested [`RouteNode`] values follow
//!   the same rules, with handlers carried inline and the reserved `params`
//!   key supplying the level's schema.
//!
//! ## Compilation semantics
//!
//! Compilation is a one-time startup pass. Top-level sibling subtrees of a
//! directory source are traversed by concurrent coroutines feeding a
//! collection channel; the table freezes only after every traversal joins.
//! Sibling order never affects the result: entries are stably sorted, so an
//! unchanged source always recompiles to an identical table.
//!
//! Structural errors ([`CompileError`]) are reported on an error channel
//! instead of raised: a malformed schema or unreadable entry drops only the
//! affected entry or subtree, never its siblings.

mod core;
mod registry;

pub use core::{
    compile_dir, compile_tree, CompileError, ErrorSink, RouteMeta, RouteNode, RouteTable,
    PARAMS_NAME, PARAM_MARKER,
};
pub use registry::HandlerRegistry;
