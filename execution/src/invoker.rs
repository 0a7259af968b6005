//! Dispatcher for one top-level invocation and every dynamic call beneath it.
//!
//! An [Invocation] owns the call stack, the shared budget and the journal for the
//! duration of one invocation. Each attempted call pushes exactly one frame and
//! pops it again on every exit path. A failed nested call reverts the journal to
//! the checkpoint taken before its frame was pushed and drops its logs.
//!
//! Interface, reentrancy and read-only failures are handed back to the calling
//! module, which may branch on them. A callee trap, a depth overflow or budget
//! exhaustion cancels the whole invocation: the error is returned to the caller
//! too, but the invocation fails even if module code ignores it.

use dynlink_types::{Address, EntryPoint, Interface, Key, LogEntry, Message, Value};
use tracing::debug;

use crate::{
    config::{GasSchedule, ValidatedConfig},
    context::{root_read_only, Budget, ExecutionContext},
    marshal::{check_args, check_results, decode_values, encode_values},
    registry::{Module, ModuleHandle, Resolver},
    runtime::{Env, Fault, Host, Runtime},
    stack::{CallStack, Frame},
    state::{Journal, State, Status},
    validator, Error,
};

/// Result of a successful invocation.
#[derive(Debug)]
pub struct Outcome {
    pub results: Vec<Value>,
    /// Entries emitted by every frame that completed, in call order.
    pub logs: Vec<LogEntry>,
    pub changes: Vec<(Key, Status)>,
    pub gas_used: u64,
}

pub struct Invocation<'a, S: State> {
    journal: Journal<'a, S>,
    stack: CallStack,
    budget: Budget,
    gas: GasSchedule,
    resolver: &'a dyn Resolver,
    runtime: &'a dyn Runtime,
    sender: Option<Address>,
    attached_value: u64,
    /// First nested failure that cancels the invocation.
    aborted: Option<Error>,
}

impl<'a, S: State> Invocation<'a, S> {
    pub fn new(
        journal: Journal<'a, S>,
        config: &ValidatedConfig,
        resolver: &'a dyn Resolver,
        runtime: &'a dyn Runtime,
        sender: Option<Address>,
        attached_value: u64,
    ) -> Self {
        Self {
            journal,
            stack: CallStack::new(config.max_call_depth),
            budget: Budget::new(config.compute_budget),
            gas: config.gas,
            resolver,
            runtime,
            sender,
            attached_value,
            aborted: None,
        }
    }

    /// Run `message` against `target` as the root frame.
    ///
    /// Any error discards every write made during the invocation.
    pub fn execute(
        mut self,
        target: &Address,
        message: &Message,
        read_only: bool,
    ) -> Result<Outcome, Error> {
        let resolver = self.resolver;
        let module = resolver.resolve(target)?;
        let entry = module
            .export(&message.entry_point)
            .ok_or_else(|| Error::interface([message.entry_point.as_str()]))?;
        check_args(entry, &message.args)?;
        let read_only = root_read_only(read_only, entry.mutability)?;

        let frame = Frame::new(
            self.sender.clone(),
            target.clone(),
            &entry.name,
            read_only,
            self.budget.remaining(),
        );
        let (results, logs) = self
            .run(&module.handle, entry, &message.args, frame)
            .map_err(|fault| match fault {
                Fault::Trap(message) => Error::Trap { message },
                Fault::Host(err) => err,
            })?;

        // Module code may have swallowed a cancelling failure.
        if let Some(err) = self.aborted.take() {
            return Err(err);
        }
        if self.budget.is_exhausted() {
            return Err(self.budget.exhausted_error(0));
        }
        Ok(Outcome {
            results,
            logs,
            gas_used: self.budget.used(),
            changes: self.journal.commit(),
        })
    }

    fn run(
        &mut self,
        handle: &ModuleHandle,
        entry: &EntryPoint,
        args: &[Value],
        frame: Frame,
    ) -> Result<(Vec<Value>, Vec<LogEntry>), Fault> {
        self.stack.push(frame)?;
        if let Err(err) = self.budget.charge(self.gas.call) {
            self.stack.pop()?;
            return Err(err.into());
        }
        debug!(
            depth = self.stack.depth(),
            callee = %handle.address,
            entry_point = %entry.name,
            "pushed frame"
        );
        let outcome = self.invoke(handle, entry, args);
        let frame = self.stack.pop()?;
        debug!(
            depth = self.stack.depth(),
            callee = %frame.callee,
            ok = outcome.is_ok(),
            "popped frame"
        );
        outcome.map(|results| (results, frame.logs))
    }

    fn invoke(
        &mut self,
        handle: &ModuleHandle,
        entry: &EntryPoint,
        args: &[Value],
    ) -> Result<Vec<Value>, Fault> {
        let runtime = self.runtime;
        let output = runtime.invoke(handle, &entry.name, &encode_values(args), self)?;
        let results = decode_values(&output)?;
        check_results(entry, &results)?;
        Ok(results)
    }

    fn dispatch(
        &mut self,
        callee: &Address,
        entry: &EntryPoint,
        args: Vec<Value>,
        requested_read_only: bool,
    ) -> Result<Vec<Value>, Error> {
        if let Some(err) = self.aborted.as_ref().and_then(Error::aborting) {
            return Err(err);
        }
        let parent = self.stack.top()?;
        let context = ExecutionContext::new(parent, &self.budget);
        let caller = parent.callee.clone();
        debug!(
            %caller,
            %callee,
            entry_point = %entry.name,
            read_only = context.read_only,
            budget = context.budget,
            "dynamic call"
        );

        let resolver = self.resolver;
        let module: &Module = resolver.resolve(callee)?;
        validator::validate(&module.exports, std::slice::from_ref(entry))?;
        check_args(entry, &args)?;
        let read_only = context.child_read_only(requested_read_only, entry.mutability)?;

        let checkpoint = self.journal.checkpoint();
        let frame = Frame::new(
            Some(caller),
            callee.clone(),
            &entry.name,
            read_only,
            self.budget.remaining(),
        );
        match self.run(&module.handle, entry, &args, frame) {
            Ok((results, logs)) => {
                self.stack.top_mut()?.logs.extend(logs);
                Ok(results)
            }
            Err(fault) => {
                self.journal.revert(checkpoint);
                let err = match fault {
                    Fault::Trap(inner) => Error::DynamicLinkTrap { inner },
                    Fault::Host(err) => err,
                };
                debug!(%callee, entry_point = %entry.name, %err, "dynamic call failed");
                if self.aborted.is_none() {
                    self.aborted = err.aborting();
                }
                Err(err)
            }
        }
    }

    fn active(&self) -> Result<(Address, bool), Error> {
        let frame = self.stack.top()?;
        Ok((frame.callee.clone(), frame.read_only))
    }
}

impl<'a, S: State> Host for Invocation<'a, S> {
    fn env(&self) -> Result<Env, Error> {
        let frame = self.stack.top()?;
        Ok(Env {
            contract: frame.callee.clone(),
            caller: frame.caller.clone(),
            sender: self.sender.clone(),
            attached_value: if frame.depth == 0 {
                self.attached_value
            } else {
                0
            },
            read_only: frame.read_only,
            depth: frame.depth,
        })
    }

    fn read(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        self.budget.charge(self.gas.read)?;
        let (namespace, _) = self.active()?;
        self.journal.read(&namespace, key)
    }

    fn write(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), Error> {
        let (namespace, read_only) = self.active()?;
        self.budget.charge(self.gas.write_cost(value.len()))?;
        self.journal.write(&namespace, key, value, read_only)
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), Error> {
        let (namespace, read_only) = self.active()?;
        self.budget.charge(self.gas.write)?;
        self.journal.remove(&namespace, key, read_only)
    }

    fn emit(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.budget.charge(self.gas.emit)?;
        let frame = self.stack.top_mut()?;
        frame
            .logs
            .push(LogEntry::new(frame.callee.clone(), key, value));
        Ok(())
    }

    fn call(
        &mut self,
        callee: &Address,
        entry_point: &EntryPoint,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, Error> {
        self.dispatch(callee, entry_point, args, false)
    }

    fn query(
        &mut self,
        callee: &Address,
        entry_point: &EntryPoint,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, Error> {
        self.dispatch(callee, entry_point, args, true)
    }

    fn validate_interface(
        &mut self,
        callee: &Address,
        interface: &Interface,
    ) -> Result<(), Error> {
        validator::validate_module(self.resolver, callee, interface)
    }
}
