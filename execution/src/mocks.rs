//! In-memory host wiring for tests and the simulator.

use dynlink_types::{Address, Key, LogEntry, Message, Transaction, Value};

use crate::{
    config::ValidatedConfig,
    layer::{Layer, Receipt},
    registry::ModuleRegistry,
    runtime::{Contract, NativeRuntime},
    state::{Memory, State},
    Error,
};

pub mod contracts;

/// Creates an account address for tests.
pub fn create_account(seed: u64) -> Address {
    Address::account(&seed.to_be_bytes())
}

/// Committed state, deployed modules and the runtime executing them.
pub struct Harness {
    pub state: Memory,
    pub registry: ModuleRegistry,
    pub runtime: NativeRuntime,
    pub config: ValidatedConfig,
    deployer: Address,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(ValidatedConfig::default())
    }
}

impl Harness {
    pub fn new(config: ValidatedConfig) -> Self {
        Self {
            state: Memory::default(),
            registry: ModuleRegistry::default(),
            runtime: NativeRuntime::default(),
            config,
            deployer: create_account(0),
        }
    }

    /// Store `contract`, register a new instance of it and run `init` against
    /// that instance, if given.
    pub fn deploy(
        &mut self,
        contract: Box<dyn Contract>,
        label: &str,
        init: Option<Message>,
    ) -> Result<Address, Error> {
        let exports = contract.exports();
        let code_id = self.runtime.store(contract);
        let address = self.registry.instantiate(code_id, label, exports);
        if let Some(message) = init {
            let deployer = self.deployer.clone();
            self.execute(&deployer, &address, &message, 0)?;
        }
        Ok(address)
    }

    /// Execute one transaction and commit its changes.
    pub fn execute(
        &mut self,
        sender: &Address,
        target: &Address,
        message: &Message,
        attached_value: u64,
    ) -> Result<Vec<LogEntry>, Error> {
        let (result, changes) = {
            let mut layer = Layer::new(
                &self.state,
                &self.registry,
                &self.runtime,
                self.config.clone(),
            );
            let result = layer.execute(sender, target, message, attached_value);
            (result, layer.commit())
        };
        self.state.apply(changes).map_err(Error::State)?;
        result
    }

    pub fn execute_all(&mut self, transactions: Vec<Transaction>) -> Result<Vec<Receipt>, Error> {
        let (receipts, changes) = {
            let mut layer = Layer::new(
                &self.state,
                &self.registry,
                &self.runtime,
                self.config.clone(),
            );
            let receipts = layer.execute_all(transactions);
            (receipts, layer.commit())
        };
        self.state.apply(changes).map_err(Error::State)?;
        Ok(receipts)
    }

    pub fn query(&self, target: &Address, message: &Message) -> Result<Vec<Value>, Error> {
        Layer::new(
            &self.state,
            &self.registry,
            &self.runtime,
            self.config.clone(),
        )
        .query(target, message)
    }

    /// Committed value of `key` in `module`'s namespace.
    pub fn stored(&self, module: &Address, key: &[u8]) -> Option<Vec<u8>> {
        self.state.get(&Key::storage(module, key)).ok().flatten()
    }
}
