use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Coalesces concurrent identical in-flight calls.
///
/// The first caller for a key becomes the executor and runs the supplier
/// exactly once; every overlapping caller with the same key awaits the shared
/// outcome instead. The outcome, success or error alike, is published to all
/// waiters registered before the slot clears, then the slot is removed so
/// later calls run fresh. Failures are never remembered: there is no
/// negative caching here.
///
/// A waiter that gets cancelled simply stops listening; it never tears down
/// the shared execution the remaining waiters depend on.
pub struct Deduplicator<T> {
    pending: Mutex<HashMap<String, broadcast::Sender<T>>>,
}

enum Claim<T> {
    Executor(broadcast::Sender<T>),
    Waiter(broadcast::Receiver<T>),
}

impl<T: Clone> Default for Deduplicator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Deduplicator<T> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Run `supplier` under single-flight semantics for `key`.
    pub async fn run<F, Fut>(&self, key: &str, supplier: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let claim = {
            let mut pending = self.pending.lock();
            match pending.get(key) {
                Some(sender) => Claim::Waiter(sender.subscribe()),
                None => {
                    let (sender, _) = broadcast::channel(1);
                    pending.insert(key.to_string(), sender.clone());
                    Claim::Executor(sender)
                }
            }
        };

        match claim {
            Claim::Waiter(mut receiver) => {
                debug!(key = key.get(..12).unwrap_or(key), "joining in-flight call");
                match receiver.recv().await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        // The executor vanished without publishing (it was
                        // dropped or panicked). The slot is gone, so the only
                        // correct move is a fresh execution.
                        warn!("in-flight call ended without an outcome; re-running");
                        supplier().await
                    }
                }
            }
            Claim::Executor(sender) => {
                let outcome = supplier().await;
                {
                    let mut pending = self.pending.lock();
                    pending.remove(key);
                }
                // Waiters subscribed while the slot was registered; anyone
                // arriving after the removal above starts a new execution.
                let _ = sender.send(outcome.clone());
                outcome
            }
        }
    }

    /// Number of calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }
}
