use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;

type SignalCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Registry of named external signals.
///
/// A debouncer built with `cancel_on_signal` subscribes here for the lifetime
/// of each pending burst; raising the matching signal cancels that burst.
/// Signals are edge-triggered: [`SignalHub::raise`] invokes each currently
/// live subscriber exactly once, and nothing is stored for subscribers that
/// arrive later.
///
/// The hub is cheap to clone; all clones share the same subscriber table.
#[derive(Clone)]
pub struct SignalHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    subscribers: DashMap<String, Vec<(u64, SignalCallback)>>,
    next_id: AtomicU64,
}

impl SignalHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Registers `callback` to run each time `signal_name` is raised.
    ///
    /// The subscription lives until the returned guard is dropped.
    pub fn subscribe(
        &self,
        signal_name: impl Into<String>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> SignalSubscription {
        let signal_name = signal_name.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .entry(signal_name.clone())
            .or_default()
            .push((id, Arc::new(callback)));
        log::trace!("subscribed [{id}] to signal [{signal_name}]");
        SignalSubscription {
            hub: self.inner.clone(),
            signal_name,
            id,
        }
    }

    /// Raises `signal_name`, invoking every live subscriber once.
    ///
    /// The subscriber list is snapshotted before any callback runs, so a
    /// callback may drop its own subscription. The snapshot also means a
    /// raise racing a subscriber's teardown can still invoke the stale
    /// callback: for a debouncer, a raise concurrent with burst turnover
    /// may land on the burst that just opened instead of the one that just
    /// resolved.
    pub fn raise(&self, signal_name: &str) {
        let callbacks: Vec<SignalCallback> = match self.inner.subscribers.get(signal_name) {
            Some(entry) => entry.iter().map(|(_, callback)| callback.clone()).collect(),
            None => return,
        };
        log::debug!(
            "signal [{signal_name}] raised, notifying {} subscriber(s)",
            callbacks.len()
        );
        for callback in callbacks {
            (*callback)();
        }
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one live subscription; dropping it unsubscribes.
pub struct SignalSubscription {
    hub: Arc<HubInner>,
    signal_name: String,
    id: u64,
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        if let Some(mut entry) = self.hub.subscribers.get_mut(&self.signal_name) {
            entry.retain(|(id, _)| *id != self.id);
        }
    }
}
