//! Chain of frames executing within one top-level invocation.

use dynlink_types::{Address, LogEntry};
use std::num::NonZeroUsize;

use crate::Error;

/// One in-flight call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// `None` for the root frame of a query.
    pub caller: Option<Address>,
    pub callee: Address,
    pub entry_point: String,
    pub read_only: bool,
    /// Budget remaining when the frame was pushed.
    pub budget: u64,
    pub depth: usize,
    /// Entries emitted by this frame and by the calls it completed successfully.
    pub logs: Vec<LogEntry>,
}

impl Frame {
    pub fn new(
        caller: Option<Address>,
        callee: Address,
        entry_point: impl Into<String>,
        read_only: bool,
        budget: u64,
    ) -> Self {
        Self {
            caller,
            callee,
            entry_point: entry_point.into(),
            read_only,
            budget,
            depth: 0,
            logs: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct CallStack {
    frames: Vec<Frame>,
    max_depth: NonZeroUsize,
}

impl CallStack {
    pub fn new(max_depth: NonZeroUsize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True if `address` is executing anywhere on the stack.
    pub fn contains(&self, address: &Address) -> bool {
        self.frames.iter().any(|frame| frame.callee == *address)
    }

    /// Push `frame`, refusing to re-enter a module already on the stack or to
    /// grow beyond the maximum depth.
    pub fn push(&mut self, mut frame: Frame) -> Result<(), Error> {
        if self.contains(&frame.callee) {
            return Err(Error::Reentrancy {
                callee: frame.callee,
            });
        }
        if self.frames.len() >= self.max_depth.get() {
            return Err(Error::StackDepthExceeded {
                max: self.max_depth.get(),
            });
        }
        frame.depth = self.frames.len();
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Frame, Error> {
        self.frames.pop().ok_or(Error::EmptyCallStack)
    }

    pub fn top(&self) -> Result<&Frame, Error> {
        self.frames.last().ok_or(Error::EmptyCallStack)
    }

    pub fn top_mut(&mut self) -> Result<&mut Frame, Error> {
        self.frames.last_mut().ok_or(Error::EmptyCallStack)
    }
}
