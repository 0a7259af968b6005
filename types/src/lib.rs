//! Wire-level data model shared by the dynlink host crates.
//!
//! Everything that crosses a module boundary, or is written to state, implements
//! the `commonware_codec` traits so that encoding is canonical and deterministic.

pub mod codec;
pub mod execution;
pub mod interface;
pub mod value;

pub use execution::{Address, Key, LogEntry, Message, Transaction, MAX_ARGS, NAMESPACE};
pub use interface::{EntryPoint, Interface, Mutability};
pub use value::{Value, ValueType};
