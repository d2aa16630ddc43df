pub use flush::FlushOutcome;
pub use main_type::{Debouncer, DebouncerBuilder};
pub use operation::{Condition, Operation};

pub(crate) use burst::{BurstState, lock};

mod main_type {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use crate::{
        config::DebounceConfig,
        errors::{DebounceError, OperationError},
        result_cell::ResultCell,
        signal_hub::SignalHub,
        timer_loop::{TimerLoop, Wake},
    };

    use super::{
        burst::{BurstState, lock},
        flush::FlushOutcome,
        operation::{Condition, Operation},
    };

    pub struct DebouncerBuilder<A, T> {
        operation: Option<Operation<A, T>>,
        condition: Option<Condition>,
        delay: Option<Duration>,
        signal_hub: Option<SignalHub>,
        config: DebounceConfig,
    }
    impl<A: Send + 'static, T: Clone + Send + 'static> DebouncerBuilder<A, T> {
        /// Declares a synchronous operation: its result is available as soon
        /// as the call returns.
        pub fn with_sync_operation(
            &mut self,
            operation: impl Fn(A) -> Result<T, OperationError> + Send + Sync + 'static,
        ) -> &mut Self {
            self.operation = Some(Operation::Sync(Arc::new(operation)));
            self
        }
        /// Declares a deferred operation: the call hands back a receiver and
        /// the final value must be awaited on it.
        pub fn with_deferred_operation(
            &mut self,
            operation: impl Fn(A) -> crossbeam_channel::Receiver<Result<T, OperationError>>
            + Send
            + Sync
            + 'static,
        ) -> &mut Self {
            self.operation = Some(Operation::Deferred(Arc::new(operation)));
            self
        }
        /// Gate consulted immediately before each execution attempt. A false
        /// verdict defers the attempt and retries it; it never cancels.
        pub fn with_sync_condition(
            &mut self,
            condition: impl Fn() -> Result<bool, OperationError> + Send + Sync + 'static,
        ) -> &mut Self {
            self.condition = Some(Condition::Sync(Arc::new(condition)));
            self
        }
        /// Same gate, but the verdict itself must be awaited on a receiver.
        pub fn with_deferred_condition(
            &mut self,
            condition: impl Fn() -> crossbeam_channel::Receiver<Result<bool, OperationError>>
            + Send
            + Sync
            + 'static,
        ) -> &mut Self {
            self.condition = Some(Condition::Deferred(Arc::new(condition)));
            self
        }
        /// Quiet period that must elapse after the last call before the
        /// operation runs.
        pub fn set_delay(&mut self, delay: Duration) -> &mut Self {
            self.delay = Some(delay);
            self
        }
        /// Registry the debouncer subscribes to while a call is pending.
        /// Required when the config names a `cancel_on_signal` signal.
        pub fn with_signal_hub(&mut self, signal_hub: &SignalHub) -> &mut Self {
            self.signal_hub = Some(signal_hub.clone());
            self
        }
        pub fn build(&mut self) -> Result<Debouncer<A, T>, DebounceError> {
            let operation = self
                .operation
                .take()
                .ok_or(DebounceError::InvalidOperation)?;
            let delay = self.delay.take().ok_or(DebounceError::InvalidDelay)?;
            let condition = self.condition.take();
            let config = std::mem::replace(&mut self.config, DebounceConfig::default());

            let signal = match config.get_cancel_on_signal() {
                Some(signal_name) => {
                    let hub = self
                        .signal_hub
                        .take()
                        .ok_or(DebounceError::BuildErrorNoSignalHub)?;
                    Some((hub, signal_name.to_string()))
                }
                None => None,
            };

            let state = Arc::new(Mutex::new(BurstState::idle()));
            let (wake_tx, wake_rx) = crossbeam_channel::unbounded();
            TimerLoop::run(
                &state,
                wake_rx,
                operation.clone(),
                condition.clone(),
                config.get_retry_interval(),
            );
            Ok(Debouncer {
                state,
                wake_tx,
                operation,
                condition,
                delay,
                max_wait: config.get_max_wait(),
                signal,
            })
        }
    }

    /// Wraps one operation so that repeated calls within a quiet period
    /// collapse into at most one actual execution.
    ///
    /// Built through [`DebouncerBuilder`]; each instance owns its burst state
    /// and one background timer thread. Dropping the instance cancels any
    /// pending call and stops the thread.
    pub struct Debouncer<A, T: Clone> {
        state: Arc<Mutex<BurstState<A, T>>>,
        wake_tx: crossbeam_channel::Sender<Wake>,
        operation: Operation<A, T>,
        condition: Option<Condition>,
        delay: Duration,
        max_wait: Option<Duration>,
        signal: Option<(SignalHub, String)>,
    }

    impl<A: Send + 'static, T: Clone + Send + 'static> Debouncer<A, T> {
        /// Creates a new [`DebouncerBuilder<A, T>`] to configure and build a
        /// [`Debouncer<A, T>`].
        ///
        /// The operation and the delay are mandatory; everything else in the
        /// [`DebounceConfig`] is optional.
        ///
        /// ### Example
        /// ```rust
        /// use std::time::Duration;
        /// use quell::{DebounceConfig, Debouncer, OperationError};
        ///
        /// let debouncer = Debouncer::new(DebounceConfig::default())
        ///     .with_sync_operation(|query: String| -> Result<usize, OperationError> {
        ///         Ok(query.len())
        ///     })
        ///     .set_delay(Duration::from_millis(100))
        ///     .build()
        ///     .unwrap();
        /// debouncer.invoke("hello".to_string());
        /// ```
        pub fn new(config: DebounceConfig) -> DebouncerBuilder<A, T> {
            DebouncerBuilder {
                operation: None,
                condition: None,
                delay: None,
                signal_hub: None,
                config,
            }
        }

        /// Records a call. The arguments overwrite whatever the burst was
        /// holding (only the latest call survives) and the delay timer is
        /// re-armed.
        ///
        /// The first call of a burst arms the max-wait deadline and the
        /// external-signal subscription when those are configured.
        ///
        /// For a deferred operation this returns the burst's shared
        /// [`ResultCell`] so the caller can await the eventual result; every
        /// call landing in the same burst receives the same cell. For a sync
        /// operation it returns `None` and the result is observable only via
        /// [`Debouncer::flush`].
        pub fn invoke(&self, args: A) -> Option<ResultCell<T>> {
            let cell;
            {
                let mut state = lock(&self.state);
                let now = Instant::now();
                if !state.is_pending() {
                    state.begin(now, self.max_wait);
                    if let Some((hub, signal_name)) = &self.signal {
                        let shared = self.state.clone();
                        let wake_tx = self.wake_tx.clone();
                        let subscription = hub.subscribe(signal_name.clone(), move || {
                            let cancelled = lock(&shared).cancel();
                            if let Some(cell) = cancelled {
                                cell.settle(Err(DebounceError::Cancelled));
                            }
                            let _ = wake_tx.send(Wake);
                        });
                        state.set_subscription(subscription);
                    }
                    log::debug!("burst opened, delay [{:?}]", self.delay);
                } else {
                    log::trace!("delay timer re-armed");
                }
                state.record_call(args, now + self.delay);
                cell = match &self.operation {
                    Operation::Deferred(_) => Some(state.cell_for_burst()),
                    Operation::Sync(_) => None,
                };
            }
            let _ = self.wake_tx.send(Wake);
            cell
        }

        /// Cancels the pending call, if any.
        ///
        /// All deadlines are cleared, the signal subscription is released and
        /// the burst's result cell (if one was handed out) rejects with
        /// [`DebounceError::Cancelled`]. An operation already handed its
        /// arguments cannot be un-invoked.
        pub fn cancel(&self) {
            let cancelled = {
                let mut state = lock(&self.state);
                if !state.is_pending() {
                    return;
                }
                state.cancel()
            };
            log::debug!("pending call cancelled");
            if let Some(cell) = cancelled {
                cell.settle(Err(DebounceError::Cancelled));
            }
            let _ = self.wake_tx.send(Wake);
        }

        /// Forces the pending call to run without waiting out the delay.
        ///
        /// A sync operation with no condition (or with a sync condition that
        /// currently holds) runs on the caller's thread and its result comes
        /// back as [`FlushOutcome::Completed`]; an operation failure on this
        /// path is returned to the caller directly. Anything else goes
        /// through the timer thread: a deferred operation yields
        /// [`FlushOutcome::Deferred`] with the burst's cell, a gated sync
        /// operation yields [`FlushOutcome::Idle`] while the forced attempt
        /// keeps retrying its condition.
        ///
        /// A deferred condition is never consulted synchronously, even if it
        /// would answer immediately; it always takes the deferred path.
        pub fn flush(&self) -> Result<FlushOutcome<T>, DebounceError> {
            {
                let state = lock(&self.state);
                if !state.is_pending() {
                    return Ok(FlushOutcome::Idle);
                }
            }
            // sync path: condition and operation run outside the state lock,
            // so the burst is re-checked after each.
            if let Operation::Sync(operation) = &self.operation {
                let eligible = match &self.condition {
                    None => true,
                    Some(Condition::Sync(check)) => check().map_err(DebounceError::operation)?,
                    Some(Condition::Deferred(_)) => false,
                };
                if eligible {
                    let args = {
                        let mut state = lock(&self.state);
                        if !state.is_pending() {
                            return Ok(FlushOutcome::Idle);
                        }
                        let (record, _cell) = state.resolve();
                        match record {
                            Some(args) => args,
                            None => return Ok(FlushOutcome::Idle),
                        }
                    };
                    let _ = self.wake_tx.send(Wake);
                    log::debug!("pending call flushed synchronously");
                    return match operation(args) {
                        Ok(value) => Ok(FlushOutcome::Completed(value)),
                        Err(e) => Err(DebounceError::operation(e)),
                    };
                }
            }
            let cell = {
                let mut state = lock(&self.state);
                if !state.is_pending() {
                    return Ok(FlushOutcome::Idle);
                }
                state.force_immediate(Instant::now());
                match &self.operation {
                    Operation::Deferred(_) => Some(state.cell_for_burst()),
                    Operation::Sync(_) => None,
                }
            };
            let _ = self.wake_tx.send(Wake);
            log::debug!("pending call flushed through the timer loop");
            match cell {
                Some(cell) => Ok(FlushOutcome::Deferred(cell)),
                None => Ok(FlushOutcome::Idle),
            }
        }

        /// Returns whether a call is currently pending. No side effects.
        pub fn pending(&self) -> bool {
            lock(&self.state).is_pending()
        }
    }

    impl<A, T: Clone> Drop for Debouncer<A, T> {
        fn drop(&mut self) {
            // reject waiters instead of leaving them hanging; dropping the
            // wake sender afterwards stops the timer thread.
            let cancelled = lock(&self.state).cancel();
            if let Some(cell) = cancelled {
                cell.settle(Err(DebounceError::Cancelled));
            }
        }
    }
}

mod operation {
    use std::sync::Arc;

    use crossbeam_channel::Receiver;

    use crate::errors::OperationError;

    /// The wrapped function, declared sync or deferred at construction.
    ///
    /// The declaration replaces any runtime "must this result be awaited"
    /// detection: a [`Operation::Sync`] call yields its final value directly,
    /// a [`Operation::Deferred`] call yields a receiver the timer thread
    /// blocks on for the eventual value.
    pub enum Operation<A, T> {
        Sync(Arc<dyn Fn(A) -> Result<T, OperationError> + Send + Sync + 'static>),
        Deferred(Arc<dyn Fn(A) -> Receiver<Result<T, OperationError>> + Send + Sync + 'static>),
    }

    impl<A, T> Clone for Operation<A, T> {
        fn clone(&self) -> Self {
            match self {
                Self::Sync(f) => Self::Sync(f.clone()),
                Self::Deferred(f) => Self::Deferred(f.clone()),
            }
        }
    }

    /// Zero-argument predicate consulted before each execution attempt.
    pub enum Condition {
        Sync(Arc<dyn Fn() -> Result<bool, OperationError> + Send + Sync + 'static>),
        Deferred(Arc<dyn Fn() -> Receiver<Result<bool, OperationError>> + Send + Sync + 'static>),
    }

    impl Clone for Condition {
        fn clone(&self) -> Self {
            match self {
                Self::Sync(f) => Self::Sync(f.clone()),
                Self::Deferred(f) => Self::Deferred(f.clone()),
            }
        }
    }
}

mod burst {
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use std::time::{Duration, Instant};

    use crate::{result_cell::ResultCell, signal_hub::SignalSubscription};

    pub(crate) fn lock<A, T>(state: &Mutex<BurstState<A, T>>) -> MutexGuard<'_, BurstState<A, T>> {
        state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// State of the current burst, shared between the caller-facing handle
    /// and the timer thread behind one mutex.
    ///
    /// Invariants: pending is true iff a record exists; at most one of each
    /// deadline is live; the subscription and the cell exist only while
    /// pending.
    pub(crate) struct BurstState<A, T> {
        record: Option<A>,
        pending: bool,
        delay_due: Option<Instant>,
        max_wait_due: Option<Instant>,
        retry_due: Option<Instant>,
        cell: Option<ResultCell<T>>,
        subscription: Option<SignalSubscription>,
    }

    impl<A, T: Clone> BurstState<A, T> {
        pub(crate) fn idle() -> Self {
            Self {
                record: None,
                pending: false,
                delay_due: None,
                max_wait_due: None,
                retry_due: None,
                cell: None,
                subscription: None,
            }
        }

        pub(crate) fn is_pending(&self) -> bool {
            self.pending
        }

        /// Opens a burst: arms the max-wait deadline once, never re-armed by
        /// later calls of the same burst.
        pub(crate) fn begin(&mut self, now: Instant, max_wait: Option<Duration>) {
            self.pending = true;
            self.max_wait_due = max_wait.map(|max_wait| now + max_wait);
        }

        /// Overwrites the invocation record and re-arms the delay timer. A
        /// pending condition retry is superseded by the fresh delay.
        pub(crate) fn record_call(&mut self, args: A, delay_due: Instant) {
            self.record = Some(args);
            self.delay_due = Some(delay_due);
            self.retry_due = None;
        }

        pub(crate) fn set_subscription(&mut self, subscription: SignalSubscription) {
            self.subscription = Some(subscription);
        }

        /// The burst's shared result cell, created on first need.
        pub(crate) fn cell_for_burst(&mut self) -> ResultCell<T> {
            self.cell.get_or_insert_with(ResultCell::new).clone()
        }

        pub(crate) fn schedule_retry(&mut self, retry_due: Instant) {
            self.retry_due = Some(retry_due);
        }

        /// Drops the timers so the next attempt happens immediately through
        /// the normal execution path.
        pub(crate) fn force_immediate(&mut self, now: Instant) {
            self.delay_due = None;
            self.max_wait_due = None;
            self.retry_due = Some(now);
        }

        /// Earliest live deadline, `None` when nothing is scheduled.
        pub(crate) fn next_due(&self) -> Option<Instant> {
            [self.delay_due, self.max_wait_due, self.retry_due]
                .into_iter()
                .flatten()
                .min()
        }

        /// Consumes every deadline that has fired. Returns true when an
        /// execution attempt is due.
        pub(crate) fn consume_fired(&mut self, now: Instant) -> bool {
            let mut fired = false;
            if self.delay_due.is_some_and(|due| due <= now) {
                self.delay_due = None;
                fired = true;
            }
            if self.max_wait_due.is_some_and(|due| due <= now) {
                self.max_wait_due = None;
                fired = true;
            }
            if self.retry_due.is_some_and(|due| due <= now) {
                self.retry_due = None;
                fired = true;
            }
            fired && self.pending
        }

        /// Closes the burst and detaches what the execution needs: the
        /// recorded arguments and the cell to settle. Deadlines, record and
        /// subscription are all cleared.
        pub(crate) fn resolve(&mut self) -> (Option<A>, Option<ResultCell<T>>) {
            self.pending = false;
            self.delay_due = None;
            self.max_wait_due = None;
            self.retry_due = None;
            self.subscription = None;
            (self.record.take(), self.cell.take())
        }

        /// Closes the burst without executing. The caller settles the
        /// returned cell with a cancellation rejection outside the lock.
        pub(crate) fn cancel(&mut self) -> Option<ResultCell<T>> {
            let (_, cell) = self.resolve();
            cell
        }
    }
}

mod flush {
    use crate::result_cell::ResultCell;

    /// What [`flush`](super::Debouncer::flush) produced.
    pub enum FlushOutcome<T> {
        /// Nothing was pending, or the forced attempt is gated and will keep
        /// retrying on the timer thread.
        Idle,
        /// The sync operation ran on the caller's thread; here is its value.
        Completed(T),
        /// The forced attempt runs through the timer thread; await the
        /// burst's shared cell.
        Deferred(ResultCell<T>),
    }

    impl<T> FlushOutcome<T> {
        pub fn is_idle(&self) -> bool {
            matches!(self, FlushOutcome::Idle)
        }
    }
}
