//! Default values for [crate::config::Config].

/// Maximum number of frames (root included) on one call stack.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Largest accepted `max_call_depth`. Every dynamic call nests several native
/// stack frames, so deeper chains would overflow the thread stack.
pub const MAX_CALL_DEPTH_LIMIT: usize = 128;

/// Compute budget granted to each top-level invocation.
pub const DEFAULT_COMPUTE_BUDGET: u64 = 10_000_000;

pub const DEFAULT_GAS_CALL: u64 = 1_000;
pub const DEFAULT_GAS_READ: u64 = 100;
pub const DEFAULT_GAS_WRITE: u64 = 200;
pub const DEFAULT_GAS_WRITE_BYTE: u64 = 1;
pub const DEFAULT_GAS_EMIT: u64 = 50;

pub const DEFAULT_LOG_LEVEL: &str = "info";
