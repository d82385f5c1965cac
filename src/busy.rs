use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

/// Counts the requests in flight and exposes whether there is at least one.
///
/// The boolean is always derived from the counter, which never goes below
/// zero: extra calls to [BusyFlag::hide] are ignored. One flag is meant to be
/// created per process and shared with [Arc] between the client and whatever
/// renders the progress indicator.
#[derive(Debug)]
pub struct BusyFlag {
    count: Mutex<usize>,
    active: watch::Sender<bool>,
}

impl Default for BusyFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyFlag {
    pub fn new() -> Self {
        let (active, _) = watch::channel(false);
        BusyFlag {
            count: Mutex::new(0),
            active,
        }
    }

    pub fn show(&self) {
        let mut count = self.lock();
        *count += 1;
        self.publish(*count);
    }

    pub fn hide(&self) {
        let mut count = self.lock();
        *count = count.saturating_sub(1);
        self.publish(*count);
    }

    pub fn reset(&self) {
        let mut count = self.lock();
        *count = 0;
        self.publish(0);
    }

    pub fn is_active(&self) -> bool {
        *self.lock() > 0
    }

    pub fn in_flight(&self) -> usize {
        *self.lock()
    }

    /// Receiver notified each time the flag flips.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    // Called with the counter locked so that watchers see flips in order.
    fn publish(&self, count: usize) {
        let active = count > 0;
        self.active.send_if_modified(|current| {
            let changed = *current != active;
            *current = active;
            changed
        });
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        // the counter stays consistent even if a holder panicked
        self.count.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Marks one request in flight for as long as it is alive.
#[derive(Debug)]
pub struct BusyGuard {
    flag: Arc<BusyFlag>,
}

impl BusyGuard {
    pub fn new(flag: Arc<BusyFlag>) -> Self {
        flag.show();
        BusyGuard { flag }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.hide();
    }
}
