//! Dynlink execution host.
//!
//! This crate executes deployed modules and lets one module synchronously call
//! entry points of another within the same invocation (a "dynamic link").
//!
//! The primary entrypoint is [`Layer`]: [`Layer::execute`] runs a transaction with
//! a mutable root frame and [`Layer::query`] runs a read-only one. Every nested call
//! goes through the [`invoker`], which:
//! - refuses to re-enter a module already on the call stack,
//! - validates the callee's exported entry points before binding,
//! - propagates read-only mode downward (it is never lifted below a read-only frame),
//! - wraps aborts raised inside a callee as `Error in dynamic link: ...`.
//!
//! ## Determinism requirements
//! - Do not use wall-clock time or randomness inside execution.
//! - Avoid iteration order of hash-based collections influencing outputs.
//!
//! ## Atomicity
//! Any error reaching the root frame discards every write made during the
//! invocation. A callee trap, a depth overflow or budget exhaustion does the same
//! even if the calling module ignores it. Other failed nested calls (interface,
//! reentrancy, read-only) that the caller handles only discard the writes and log
//! entries made beneath them.
//!
//! ## Minimal example
//! ```rust,ignore
//! use dynlink_execution::mocks::{contracts::Number, create_account, Harness};
//! use dynlink_types::{Message, Value};
//!
//! let mut harness = Harness::default();
//! let number = harness.deploy(
//!     Box::new(Number),
//!     "number",
//!     Some(Message::new("instantiate", vec![Value::Int(21)])),
//! )?;
//! harness.execute(&create_account(1), &number, &Message::new("mul", vec![Value::Int(2)]), 0)?;
//! assert_eq!(harness.query(&number, &Message::new("value", vec![]))?, vec![Value::Int(42)]);
//! ```

pub mod config;
pub mod context;
pub mod defaults;
pub mod invoker;
pub mod marshal;
pub mod registry;
pub mod runtime;
pub mod stack;
pub mod validator;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

#[cfg(test)]
mod dynamic_link_tests;

mod error;
mod layer;
mod state;

pub use config::{Config, ConfigError, GasSchedule, ValidatedConfig};
pub use error::Error;
pub use invoker::{Invocation, Outcome};
pub use layer::{Layer, Receipt};
pub use registry::{Module, ModuleHandle, ModuleRegistry, Resolver};
pub use runtime::{Contract, Env, Fault, Host, NativeRuntime, Runtime};
pub use state::{Checkpoint, Journal, State, Status};

#[cfg(any(test, feature = "mocks"))]
pub use state::Memory;
