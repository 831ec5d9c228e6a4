//! # Router Module
//!
//! Path matching and route resolution over the compiled route table.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - compiling each [`RouteTable`](crate::routes::RouteTable) entry's path
//!   pattern into a matcher at startup
//! - matching incoming `(method, path)` pairs exactly - no partial or
//!   fallback matching
//! - extracting named path parameters (`/users/:id` against `/users/123`
//!   yields `id = "123"`)
//!
//! ## Architecture
//!
//! Two phases:
//!
//! 1. **Compilation**: patterns like `/users/:id` become anchored regexes
//!    with one capture group per named parameter.
//! 2. **Matching**: each request is tested against the entries in table
//!    order until one matches; a miss returns `None` and the server layer
//!    answers 404.

mod core;

pub use core::{ParamVec, RouteMatch, Router, MAX_INLINE_PARAMS};
