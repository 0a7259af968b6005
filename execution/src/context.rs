//! Read-only mode and compute budget carried down through nested calls.
//!
//! A frame is read-only if its parent is, if the call site asked for a read-only
//! call, or if the callee's entry point is declared read-only. Nothing below a
//! read-only frame can become mutable again.

use dynlink_types::Mutability;
use std::num::NonZeroU64;

use crate::{stack::Frame, Error};

/// Single compute budget shared by every frame of one invocation.
///
/// Strictly decreasing. Once a charge fails the budget stays exhausted, so module
/// code that ignores the failure cannot keep running host operations. The call
/// charge is taken only after a frame is pushed; a call refused for reentrancy
/// or depth costs nothing.
#[derive(Clone, Debug)]
pub struct Budget {
    limit: u64,
    used: u64,
    exhausted: bool,
}

impl Budget {
    pub fn new(limit: NonZeroU64) -> Self {
        Self {
            limit: limit.get(),
            used: 0,
            exhausted: false,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn charge(&mut self, amount: u64) -> Result<(), Error> {
        let next = self.used.saturating_add(amount);
        if self.exhausted || next > self.limit {
            self.exhausted = true;
            self.used = self.limit;
            return Err(self.exhausted_error(amount));
        }
        self.used = next;
        Ok(())
    }

    pub fn exhausted_error(&self, requested: u64) -> Error {
        Error::BudgetExhausted {
            limit: self.limit,
            requested,
        }
    }
}

/// Read-only view of the active frame's mode and remaining budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionContext {
    pub read_only: bool,
    pub budget: u64,
}

impl ExecutionContext {
    pub fn new(frame: &Frame, budget: &Budget) -> Self {
        Self {
            read_only: frame.read_only,
            budget: budget.remaining(),
        }
    }

    /// Mode of a child frame entering an entry point declared `declared`.
    ///
    /// Fails with [Error::ReadOnlyViolation] when a read-write entry point would
    /// run in a read-only context.
    pub fn child_read_only(&self, requested: bool, declared: Mutability) -> Result<bool, Error> {
        root_read_only(self.read_only || requested, declared)
    }
}

/// Mode of a root frame. Queries start read-only.
pub fn root_read_only(read_only: bool, declared: Mutability) -> Result<bool, Error> {
    if read_only && !declared.is_read_only() {
        return Err(Error::ReadOnlyViolation);
    }
    Ok(read_only || declared.is_read_only())
}
