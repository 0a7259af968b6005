//! Boundary between the host and sandboxed module code.
//!
//! Module code sees the host only through [Host]. The [Runtime] executes an entry
//! point of a module and reports either encoded results or a [Fault]. Aborts raised
//! inside module code are turned into [Fault::Trap] at this edge and nowhere else.

use dynlink_types::{Address, EntryPoint, Interface, Value};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    panic::{self, AssertUnwindSafe},
};
use tracing::debug;

use crate::{
    marshal::{decode_values, encode_values},
    registry::ModuleHandle,
    Error,
};

/// Fault text reported when module code aborts.
pub const UNREACHABLE: &str = "RuntimeError: unreachable";

/// What executing module code can observe about its own frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Env {
    pub contract: Address,
    /// `None` for the root frame of a query.
    pub caller: Option<Address>,
    /// Account that submitted the invocation. `None` for queries.
    pub sender: Option<Address>,
    /// Zero everywhere except the root frame.
    pub attached_value: u64,
    pub read_only: bool,
    pub depth: usize,
}

/// Why module execution did not produce results.
#[derive(Debug)]
pub enum Fault {
    /// The sandbox aborted execution.
    Trap(String),
    /// A host error the module propagated instead of handling.
    Host(Error),
}

impl From<Error> for Fault {
    fn from(err: Error) -> Self {
        Self::Host(err)
    }
}

/// Host operations available to executing module code.
///
/// Storage operations are scoped to the active frame's own namespace.
pub trait Host {
    fn env(&self) -> Result<Env, Error>;
    fn read(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;
    fn write(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), Error>;
    fn remove(&mut self, key: &[u8]) -> Result<(), Error>;
    fn emit(&mut self, key: &str, value: &str) -> Result<(), Error>;

    /// Dynamic call of `entry_point` on `callee`, inheriting the caller's mode.
    fn call(
        &mut self,
        callee: &Address,
        entry_point: &EntryPoint,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, Error>;

    /// Dynamic call that runs `callee` read-only.
    fn query(
        &mut self,
        callee: &Address,
        entry_point: &EntryPoint,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, Error>;

    /// Check `callee` against `interface` without calling it.
    fn validate_interface(&mut self, callee: &Address, interface: &Interface)
        -> Result<(), Error>;
}

/// Executes module entry points.
pub trait Runtime {
    fn invoke(
        &self,
        handle: &ModuleHandle,
        entry_point: &str,
        args: &[u8],
        host: &mut dyn Host,
    ) -> Result<Vec<u8>, Fault>;
}

/// Module code compiled into the host process.
pub trait Contract {
    fn exports(&self) -> Vec<EntryPoint>;

    fn call(
        &self,
        host: &mut dyn Host,
        entry_point: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, Fault>;
}

/// [Runtime] over in-process [Contract]s, keyed by code id.
///
/// A contract reports a scripted abort by returning [Fault::Trap]. A panic
/// inside contract code is caught and reported as a trap as well, but it still
/// passes through the process panic hook first, so the default hook prints the
/// panic message to stderr. Embedders that expect panicking contracts should
/// install their own hook with [std::panic::set_hook].
#[derive(Default)]
pub struct NativeRuntime {
    code: BTreeMap<u64, Box<dyn Contract>>,
}

impl NativeRuntime {
    /// Store `contract` and return its code id.
    pub fn store(&mut self, contract: Box<dyn Contract>) -> u64 {
        let code_id = self.code.len() as u64 + 1;
        self.code.insert(code_id, contract);
        code_id
    }

    pub fn exports(&self, code_id: u64) -> Option<Vec<EntryPoint>> {
        self.code.get(&code_id).map(|contract| contract.exports())
    }
}

impl Runtime for NativeRuntime {
    fn invoke(
        &self,
        handle: &ModuleHandle,
        entry_point: &str,
        args: &[u8],
        host: &mut dyn Host,
    ) -> Result<Vec<u8>, Fault> {
        let contract = self
            .code
            .get(&handle.code_id)
            .ok_or_else(|| Error::ModuleNotFound(handle.address.clone()))?;
        let args = decode_values(args)?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            contract.call(host, entry_point, args)
        }));
        match outcome {
            Ok(results) => Ok(encode_values(&results?)),
            Err(_) => {
                debug!(module = %handle.address, entry_point, "module aborted");
                Err(Fault::Trap(UNREACHABLE.to_string()))
            }
        }
    }
}
