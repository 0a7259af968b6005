use anyhow::Result;
use dynlink_types::{Address, Key, LogEntry, Message, Transaction, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::{
    config::ValidatedConfig,
    invoker::{Invocation, Outcome},
    registry::Resolver,
    runtime::Runtime,
    state::{Journal, State, Status},
    Error,
};

/// Outcome of one transaction within a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub sender: Address,
    pub target: Address,
    pub entry_point: String,
    pub logs: Vec<LogEntry>,
    /// Rendered error if the transaction was rolled back.
    pub error: Option<String>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Entry point for transaction execution and queries.
///
/// Successful transactions accumulate their changes in a pending overlay on top of
/// `state`; failed ones leave no trace. [Layer::commit] yields the overlay.
pub struct Layer<'a, S: State> {
    state: &'a S,
    pending: BTreeMap<Key, Status>,
    resolver: &'a dyn Resolver,
    runtime: &'a dyn Runtime,
    config: ValidatedConfig,
}

impl<'a, S: State> Layer<'a, S> {
    pub fn new(
        state: &'a S,
        resolver: &'a dyn Resolver,
        runtime: &'a dyn Runtime,
        config: ValidatedConfig,
    ) -> Self {
        Self {
            state,
            pending: BTreeMap::new(),
            resolver,
            runtime,
            config,
        }
    }

    fn invoke(
        &self,
        sender: Option<Address>,
        target: &Address,
        message: &Message,
        attached_value: u64,
        read_only: bool,
    ) -> Result<Outcome, Error> {
        Invocation::new(
            Journal::new(self),
            &self.config,
            self.resolver,
            self.runtime,
            sender,
            attached_value,
        )
        .execute(target, message, read_only)
    }

    /// Execute `message` against `target` on behalf of `sender`.
    ///
    /// Either every write made by every frame is kept, or none is.
    pub fn execute(
        &mut self,
        sender: &Address,
        target: &Address,
        message: &Message,
        attached_value: u64,
    ) -> Result<Vec<LogEntry>, Error> {
        let outcome = self.invoke(Some(sender.clone()), target, message, attached_value, false)?;
        debug!(
            %sender,
            %target,
            entry_point = %message.entry_point,
            gas_used = outcome.gas_used,
            changes = outcome.changes.len(),
            logs = outcome.logs.len(),
            "executed"
        );
        for (key, status) in outcome.changes {
            self.pending.insert(key, status);
        }
        Ok(outcome.logs)
    }

    /// Run `message` against `target` read-only and return its results.
    pub fn query(&self, target: &Address, message: &Message) -> Result<Vec<Value>, Error> {
        let outcome = self.invoke(None, target, message, 0, true)?;
        debug!(
            %target,
            entry_point = %message.entry_point,
            gas_used = outcome.gas_used,
            "queried"
        );
        Ok(outcome.results)
    }

    /// Execute `transactions` in order. Each is atomic on its own.
    pub fn execute_all(&mut self, transactions: Vec<Transaction>) -> Vec<Receipt> {
        let mut receipts = Vec::with_capacity(transactions.len());
        for tx in transactions {
            let outcome = self.execute(&tx.sender, &tx.target, &tx.message, tx.attached_value);
            let (logs, error) = match outcome {
                Ok(logs) => (logs, None),
                Err(err) => {
                    warn!(
                        sender = %tx.sender,
                        target = %tx.target,
                        entry_point = %tx.message.entry_point,
                        %err,
                        "transaction rolled back"
                    );
                    (Vec::new(), Some(err.to_string()))
                }
            };
            receipts.push(Receipt {
                sender: tx.sender,
                target: tx.target,
                entry_point: tx.message.entry_point,
                logs,
                error,
            });
        }
        receipts
    }

    pub fn commit(self) -> Vec<(Key, Status)> {
        self.pending.into_iter().collect()
    }
}

impl<'a, S: State> State for Layer<'a, S> {
    fn get(&self, key: &Key) -> Result<Option<Vec<u8>>> {
        Ok(match self.pending.get(key) {
            Some(Status::Update(value)) => Some(value.clone()),
            Some(Status::Delete) => None,
            None => self.state.get(key)?,
        })
    }

    fn insert(&mut self, key: Key, value: Vec<u8>) -> Result<()> {
        self.pending.insert(key, Status::Update(value));
        Ok(())
    }

    fn delete(&mut self, key: &Key) -> Result<()> {
        self.pending.insert(key.clone(), Status::Delete);
        Ok(())
    }
}
