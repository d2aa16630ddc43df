mod config;
mod debouncer;
mod errors;
mod result_cell;
mod signal_hub;
mod timer_loop;

pub use config::DebounceConfig;
pub use debouncer::{Condition, Debouncer, DebouncerBuilder, FlushOutcome, Operation};
pub use errors::{DebounceError, OperationError};
pub use result_cell::ResultCell;
pub use signal_hub::{SignalHub, SignalSubscription};

pub mod prelude {
    pub use super::{
        DebounceConfig, DebounceError, Debouncer, FlushOutcome, OperationError, ResultCell,
        SignalHub,
    };
}
