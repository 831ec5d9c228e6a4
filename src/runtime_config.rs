//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for coroutine runtime behavior.
//!
//! ## `HAWKER_STACK_SIZE`
//!
//! Sets the stack size for handler and traversal coroutines. Accepts
//! decimal (`65536`) or hexadecimal (`0x10000`) values; default `0x10000`
//! (64 KB), enough headroom for handlers that log and serialize.
//!
//! Total memory is `stack_size x concurrent_coroutines`: too small causes
//! stack-overflow panics in deep handlers, too large wastes memory across
//! many concurrent requests. Tune to handler complexity.
//!
//! ```bash
//! export HAWKER_STACK_SIZE=0x8000
//! ```

use std::env;

/// Runtime configuration loaded from environment variables.
///
/// Load once at startup via [`RuntimeConfig::from_env()`] and pass to
/// dispatcher registration.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes (default: 64 KB / 0x10000)
    pub stack_size: usize,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = match env::var("HAWKER_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(0x10000)
                } else {
                    val.parse().unwrap_or(0x10000)
                }
            }
            Err(_) => 0x10000,
        };
        RuntimeConfig { stack_size }
    }
}
