//! # Body Coercion Module
//!
//! Per-route request-body coercion against a declared parameter schema.
//!
//! ## Overview
//!
//! A [`ParamSchema`] maps field names to [`FieldType`] tags. It is bound to a
//! route *path* (not a method) at compile time and applied to any request
//! body arriving at that path. Coercion is an intersection:
//!
//! - only fields present in **both** the schema and the raw body survive,
//! - every surviving field is converted per its declared tag,
//! - the reserved rotation-trigger field is always dropped, whatever the
//!   schema says,
//! - routes with no bound schema pass the body through untouched.
//!
//! ## Type tags
//!
//! `string` and `number` never fail: unparseable numeric input coerces to
//! `null` rather than aborting the request. `object` and `array` run a
//! structured parse of textual input; a parse failure is a
//! [`CoercionError`] that surfaces as a request-level bad-input outcome
//! before the handler is invoked. `boolean` uses a built-in truth parse, and
//! `custom` runs a caller-supplied function.

mod core;
#[cfg(test)]
mod tests;

pub use core::{coerce_body, CoerceFn, CoercionError, FieldType, ParamSchema, SchemaError};
