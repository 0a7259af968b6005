use dynlink_types::Address;
use thiserror::Error;

/// Failures surfaced by the host to module code and to the transaction layer.
///
/// The rendered text of `Reentrancy`, `InterfaceValidation`, `ReadOnlyViolation`
/// and `DynamicLinkTrap` is matched by callers and must not change.
#[derive(Debug, Error)]
pub enum Error {
    #[error("module not found: {0}")]
    ModuleNotFound(Address),

    #[error("A contract can only be called once per one call stack.")]
    Reentrancy { callee: Address },

    #[error("call stack depth exceeded (max={max})")]
    StackDepthExceeded { max: usize },

    #[error("The following functions are not implemented: {}", missing.join(", "))]
    InterfaceValidation { missing: Vec<String> },

    #[error("a read-write callable point is called in read-only context")]
    ReadOnlyViolation,

    #[error("Error in dynamic link: {inner}")]
    DynamicLinkTrap { inner: String },

    /// The root frame itself trapped.
    #[error("{message}")]
    Trap { message: String },

    #[error("compute budget exhausted (limit={limit}, requested={requested})")]
    BudgetExhausted { limit: u64, requested: u64 },

    #[error("marshal error: {0}")]
    Marshal(#[from] commonware_codec::Error),

    #[error("state error: {0:#}")]
    State(anyhow::Error),

    #[error("no active frame")]
    EmptyCallStack,
}

impl Error {
    pub fn interface(missing: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::InterfaceValidation {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    /// Copy of `self` if it cancels the whole invocation even when the calling
    /// module handles it. Budget exhaustion is tracked by the budget itself.
    pub fn aborting(&self) -> Option<Self> {
        match self {
            Self::DynamicLinkTrap { inner } => Some(Self::DynamicLinkTrap {
                inner: inner.clone(),
            }),
            Self::StackDepthExceeded { max } => Some(Self::StackDepthExceeded { max: *max }),
            _ => None,
        }
    }
}
