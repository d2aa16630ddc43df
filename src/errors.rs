use std::fmt::Display;
use std::sync::Arc;

/// Error type returned by a wrapped operation or a condition check.
pub type OperationError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone)]
pub enum DebounceError {
    InvalidOperation,
    InvalidDelay,
    BuildErrorNoSignalHub,
    Cancelled,
    Operation(Arc<dyn std::error::Error + Send + Sync + 'static>),
    ResultLost,
}

impl DebounceError {
    /// Wraps an operation or condition failure so the same rejection can be
    /// handed to every waiter of the burst's result cell.
    pub fn operation(err: OperationError) -> Self {
        DebounceError::Operation(Arc::from(err))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, DebounceError::Cancelled)
    }
}

impl Display for DebounceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DebounceError::InvalidOperation => {
                write!(f, "Debouncer : Build error  No operation set !")
            }
            DebounceError::InvalidDelay => {
                write!(f, "Debouncer : Build error  No delay set !")
            }
            DebounceError::BuildErrorNoSignalHub => {
                write!(
                    f,
                    "Debouncer : Build error  cancel_on_signal configured without a signal hub !"
                )
            }
            DebounceError::Cancelled => {
                write!(f, "Pending call cancelled before execution")
            }
            DebounceError::Operation(e) => {
                write!(f, "Operation failure [{}]", e)
            }
            DebounceError::ResultLost => {
                write!(f, "Deferred result channel closed before a value was sent")
            }
        }
    }
}

impl std::error::Error for DebounceError {}
