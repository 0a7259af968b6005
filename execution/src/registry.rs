//! Module registry: maps addresses to deployed module instances.

use dynlink_types::{Address, EntryPoint};
use std::collections::BTreeMap;
use tracing::debug;

use crate::Error;

/// What the runtime needs to locate a module's code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleHandle {
    pub address: Address,
    pub code_id: u64,
}

/// A deployed module instance and its exported entry points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Module {
    pub handle: ModuleHandle,
    pub label: String,
    pub exports: Vec<EntryPoint>,
}

impl Module {
    pub fn export(&self, name: &str) -> Option<&EntryPoint> {
        self.exports.iter().find(|ep| ep.name == name)
    }
}

/// Resolves addresses to module instances.
pub trait Resolver {
    fn resolve(&self, address: &Address) -> Result<&Module, Error>;
}

/// In-memory [Resolver].
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<Address, Module>,
    sequence: u64,
}

impl ModuleRegistry {
    /// Record a new instance of `code_id` and return its address.
    pub fn instantiate(
        &mut self,
        code_id: u64,
        label: impl Into<String>,
        exports: Vec<EntryPoint>,
    ) -> Address {
        let address = Address::module(code_id, self.sequence);
        self.sequence += 1;
        let label = label.into();
        debug!(%address, code_id, label = %label, "instantiated module");
        self.modules.insert(
            address.clone(),
            Module {
                handle: ModuleHandle {
                    address: address.clone(),
                    code_id,
                },
                label,
                exports,
            },
        );
        address
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Resolver for ModuleRegistry {
    fn resolve(&self, address: &Address) -> Result<&Module, Error> {
        self.modules
            .get(address)
            .ok_or_else(|| Error::ModuleNotFound(address.clone()))
    }
}
