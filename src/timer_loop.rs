use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::{
    debouncer::{BurstState, Condition, Operation, lock},
    errors::DebounceError,
};
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// Wake-up message for the timer thread. Carries nothing: the state behind
/// the shared mutex already reflects whatever changed.
pub(crate) struct Wake;

pub(crate) struct TimerLoop<A, T: Clone> {
    state: Arc<Mutex<BurstState<A, T>>>,
    wake_rx: Receiver<Wake>,
    operation: Operation<A, T>,
    condition: Option<Condition>,
    retry_interval: Duration,
}

impl<A: Send + 'static, T: Clone + Send + 'static> TimerLoop<A, T> {
    /// TimerLoop runs on a separate thread and sleeps until the earliest
    /// live deadline of the burst (delay, max-wait or condition retry),
    /// waking early whenever the debouncer pokes the channel. Each round it
    /// compares Instant::now() with the deadlines and runs one execution
    /// attempt if something fired. The thread exits when the channel
    /// disconnects, which happens when the owning debouncer is dropped.
    pub(crate) fn run(
        state: &Arc<Mutex<BurstState<A, T>>>,
        wake_rx: Receiver<Wake>,
        operation: Operation<A, T>,
        condition: Option<Condition>,
        retry_interval: Duration,
    ) {
        let timer_loop: TimerLoop<A, T> = TimerLoop {
            state: state.clone(),
            wake_rx,
            operation,
            condition,
            retry_interval,
        };

        std::thread::spawn(move || {
            timer_loop.drive();
            log::trace!("timer loop stopped");
        });
    }

    fn drive(&self) {
        loop {
            let next_due = lock(&self.state).next_due();
            let disconnected = match next_due {
                Some(due) => {
                    let now = Instant::now();
                    if due <= now {
                        false
                    } else {
                        match self.wake_rx.recv_timeout(due - now) {
                            Ok(Wake) | Err(RecvTimeoutError::Timeout) => false,
                            Err(RecvTimeoutError::Disconnected) => true,
                        }
                    }
                }
                None => self.wake_rx.recv().is_err(),
            };
            if disconnected {
                break;
            }
            self.attempt();
        }
    }

    /// One execution attempt: consume the fired deadlines, gate on the
    /// condition, then run the operation and settle the burst's cell.
    /// Condition checks and the operation itself run outside the state
    /// lock, so calls, cancels and flushes may interleave with them; the
    /// burst is re-validated after each unlocked section.
    fn attempt(&self) {
        {
            let mut state = lock(&self.state);
            if !state.consume_fired(Instant::now()) {
                return;
            }
        }

        if let Some(condition) = &self.condition {
            let verdict: Result<bool, DebounceError> = match condition {
                Condition::Sync(check) => check().map_err(DebounceError::operation),
                Condition::Deferred(check) => {
                    // suspension point: the burst can be cancelled or
                    // re-armed while the verdict is outstanding.
                    let verdict_rx = check();
                    match verdict_rx.recv() {
                        Ok(verdict) => verdict.map_err(DebounceError::operation),
                        Err(_) => Err(DebounceError::ResultLost),
                    }
                }
            };
            match verdict {
                Ok(true) => {}
                Ok(false) => {
                    let mut state = lock(&self.state);
                    if state.is_pending() {
                        state.schedule_retry(Instant::now() + self.retry_interval);
                        log::trace!("condition not met, retrying in [{:?}]", self.retry_interval);
                    }
                    return;
                }
                Err(err) => {
                    // a failing condition resolves the burst the same way a
                    // failing operation does
                    let cell = {
                        let mut state = lock(&self.state);
                        if !state.is_pending() {
                            return;
                        }
                        let (_, cell) = state.resolve();
                        cell
                    };
                    log::debug!("condition check failed [{err}]");
                    if let Some(cell) = cell {
                        cell.settle(Err(err));
                    }
                    return;
                }
            }
        }

        let (args, cell) = {
            let mut state = lock(&self.state);
            if !state.is_pending() {
                // cancelled while the condition verdict was outstanding
                return;
            }
            let (record, cell) = state.resolve();
            match record {
                Some(args) => (args, cell),
                None => return,
            }
        };
        log::debug!("executing debounced operation");
        match &self.operation {
            Operation::Sync(operation) => {
                let outcome = operation(args).map_err(DebounceError::operation);
                if let Some(cell) = cell {
                    cell.settle(outcome);
                }
            }
            Operation::Deferred(operation) => {
                let result_rx = operation(args);
                let outcome = match result_rx.recv() {
                    Ok(result) => result.map_err(DebounceError::operation),
                    Err(_) => Err(DebounceError::ResultLost),
                };
                if let Some(cell) = cell {
                    cell.settle(outcome);
                }
            }
        }
    }
}
