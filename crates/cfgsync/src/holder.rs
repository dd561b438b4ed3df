//! Single-slot mailbox between a source and its subscription.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::ConfigUpdate;
use crate::settings::deadline_after;

/// Thread-safe, single-slot mailbox a [`Source`](crate::Source) posts updates into.
///
/// The holder keeps at most one unconsumed [`ConfigUpdate`]. A newer
/// [`handle`](Self::handle) replaces an unconsumed one: this is a state
/// channel, not an event log, so a slow consumer only ever sees the latest
/// update.
///
/// # Example
///
/// ```rust,ignore
/// let holder = ConfigHolder::new();
/// holder.handle(ConfigUpdate::new(ConfigValue::new("a"), true, 1));
/// holder.handle(ConfigUpdate::new(ConfigValue::new("b"), true, 2));
///
/// assert!(holder.poll());
/// assert_eq!(holder.provide().unwrap().generation(), 2);
/// assert!(!holder.poll());
/// ```
#[derive(Debug, Default)]
pub struct ConfigHolder {
    slot: Mutex<Slot>,
    cond: Condvar,
}

#[derive(Debug, Default)]
struct Slot {
    update: Option<ConfigUpdate>,
    interrupted: bool,
}

impl ConfigHolder {
    /// Creates an empty holder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `update`, replacing any unconsumed one, and wakes waiters.
    pub fn handle(&self, update: ConfigUpdate) {
        let mut slot = self.slot.lock();
        slot.update = Some(update);
        self.cond.notify_all();
    }

    /// Returns `true` if an unconsumed update is present. Never blocks.
    #[must_use]
    pub fn poll(&self) -> bool {
        self.slot.lock().update.is_some()
    }

    /// Takes the unconsumed update, if any.
    pub fn provide(&self) -> Option<ConfigUpdate> {
        self.slot.lock().update.take()
    }

    /// Waits up to `timeout` for an update to be present.
    ///
    /// Returns `false` on timeout; the update is not consumed.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.wait_until(deadline_after(timeout))
    }

    /// Waits until `deadline` for an update to be present.
    ///
    /// Returns immediately once the holder has been interrupted.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut slot = self.slot.lock();

        while slot.update.is_none() && !slot.interrupted {
            if self.cond.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }

        slot.update.is_some()
    }

    /// Wakes every waiter now and makes all later waits return immediately.
    pub fn interrupt(&self) {
        let mut slot = self.slot.lock();
        slot.interrupted = true;
        self.cond.notify_all();
    }

    /// Returns `true` once [`interrupt`](Self::interrupt) has been called.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.slot.lock().interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigValue;
    use std::sync::Arc;
    use std::thread;

    fn update(payload: &str, generation: i64) -> ConfigUpdate {
        ConfigUpdate::new(ConfigValue::new(payload), true, generation)
    }

    #[test]
    fn test_last_write_wins() {
        let holder = ConfigHolder::new();
        holder.handle(update("a", 1));
        holder.handle(update("b", 2));

        assert!(holder.poll());
        let got = holder.provide().unwrap();
        assert_eq!(got.generation(), 2);
        assert_eq!(got.value().payload(), "b");
        assert!(holder.provide().is_none());
    }

    #[test]
    fn test_poll_does_not_consume() {
        let holder = ConfigHolder::new();
        holder.handle(update("a", 1));

        assert!(holder.poll());
        assert!(holder.poll());
        assert!(holder.wait(Duration::ZERO));
        assert!(holder.provide().is_some());
    }

    #[test]
    fn test_wait_times_out_without_update() {
        let holder = ConfigHolder::new();
        let start = Instant::now();

        assert!(!holder.wait(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_wakes_on_handle() {
        let holder = Arc::new(ConfigHolder::new());
        let producer = holder.clone();

        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.handle(update("a", 1));
        });

        assert!(holder.wait(Duration::from_secs(5)));
        t.join().unwrap();
    }

    #[test]
    fn test_interrupt_wakes_waiter() {
        let holder = Arc::new(ConfigHolder::new());
        let closer = holder.clone();

        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            closer.interrupt();
        });

        let start = Instant::now();
        assert!(!holder.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(holder.is_interrupted());
        t.join().unwrap();
    }
}
