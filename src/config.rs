use std::time::Duration;

/// Condition polling never runs faster than this, whatever the caller asks.
const RETRY_INTERVAL_FLOOR: Duration = Duration::from_millis(10);

#[derive(Clone)]
pub struct DebounceConfig {
    max_wait: Option<Duration>,
    cancel_on_signal: Option<String>,
    retry_interval: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            max_wait: None,
            cancel_on_signal: None,
            retry_interval: RETRY_INTERVAL_FLOOR,
        }
    }
}
impl DebounceConfig {
    pub fn new() -> Self {
        let config = Self::default();
        config
    }
    /// Upper bound on how long a burst may defer execution before it is
    /// forced. A zero duration disables the bound.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = if max_wait.is_zero() {
            None
        } else {
            Some(max_wait)
        };
        self
    }
    /// Name of the external signal that cancels the pending call when
    /// raised. Requires a signal hub at build time.
    pub fn cancel_on_signal(mut self, signal_name: impl Into<String>) -> Self {
        self.cancel_on_signal = Some(signal_name.into());
        self
    }
    /// Interval between condition re-checks while the condition is false,
    /// clamped to a 10 ms floor.
    pub fn retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval.max(RETRY_INTERVAL_FLOOR);
        self
    }
    pub fn get_max_wait(&self) -> Option<Duration> {
        self.max_wait
    }
    pub fn get_cancel_on_signal(&self) -> Option<&str> {
        self.cancel_on_signal.as_deref()
    }
    pub fn get_retry_interval(&self) -> Duration {
        self.retry_interval
    }
}
