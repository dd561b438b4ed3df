//! Per-key subscription state machine.
//!
//! A subscription tracks two updates for its key: the *current* one (last
//! flipped, visible through handles and snapshots) and the *pending* one
//! (accepted from the holder, not yet flipped). The subscriber drives it:
//!
//! ```text
//! Unflipped ──next_update──▶ HasPending ──flip──▶ Flipped
//!                               ▲                   │
//!                               └────next_update────┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::source::Source;
use crate::{ConfigHolder, ConfigKey, ConfigUpdate, ConfigValue, Error};

/// Where a subscription is in its flip cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionPhase {
    /// Nothing has been flipped and nothing is pending.
    Unflipped,

    /// An update has been accepted and awaits a flip.
    HasPending,

    /// The last accepted update has been flipped.
    Flipped,
}

#[derive(Debug, Default)]
struct State {
    current: Option<ConfigValue>,
    generation: i64,
    pending: Option<ConfigUpdate>,
    changed: bool,
    last_generation_changed: i64,
}

/// One subscribed key: its holder, its source and its flip state.
pub struct ConfigSubscription {
    key: ConfigKey,
    holder: Arc<ConfigHolder>,
    source: Mutex<Box<dyn Source>>,
    state: RwLock<State>,
    closed: AtomicBool,
}

impl ConfigSubscription {
    /// Creates a subscription over a holder and the source feeding it.
    pub fn new(key: ConfigKey, holder: Arc<ConfigHolder>, source: Box<dyn Source>) -> Self {
        Self {
            key,
            holder,
            source: Mutex::new(source),
            state: RwLock::new(State::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// The subscribed key.
    #[must_use]
    pub const fn key(&self) -> &ConfigKey {
        &self.key
    }

    /// The holder the source pushes into.
    #[must_use]
    pub const fn holder(&self) -> &Arc<ConfigHolder> {
        &self.holder
    }

    /// Accepts the newest update from the holder, waiting until `deadline`
    /// for one with generation `>= min_generation`.
    ///
    /// Returns `true` once such an update is pending. An older update is still
    /// kept as pending, so [`pending_generation`](Self::pending_generation)
    /// tells how far behind this key is. Returns `false` on deadline or close.
    pub fn next_update(&self, min_generation: i64, deadline: Instant) -> bool {
        loop {
            if self.is_closed() {
                return false;
            }

            let mut state = self.state.write();
            if let Some(update) = self.holder.provide() {
                state.pending = Some(update);
            }

            if let Some(pending) = &state.pending
                && pending.generation() >= min_generation
            {
                return true;
            }
            drop(state);

            if Instant::now() >= deadline || !self.holder.wait_until(deadline) {
                return false;
            }
        }
    }

    /// Promotes the pending update to current.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NothingToFlip`] if no update is pending.
    pub fn flip(&self) -> Result<(), Error> {
        let mut state = self.state.write();

        let Some(pending) = state.pending.take() else {
            return Err(Error::NothingToFlip {
                key: self.key.clone(),
            });
        };

        let generation = pending.generation();
        let value = pending.into_value();
        let changed = state.current.as_ref() != Some(&value);

        state.current = Some(value);
        state.generation = generation;
        state.changed = changed;
        if changed {
            state.last_generation_changed = generation;
        }

        Ok(())
    }

    /// Generation of the pending update, if any.
    #[must_use]
    pub fn pending_generation(&self) -> Option<i64> {
        self.state.read().pending.as_ref().map(ConfigUpdate::generation)
    }

    /// Returns `true` if the pending update's payload differs from current.
    ///
    /// The very first pending update always counts as a change.
    #[must_use]
    pub fn has_pending_change(&self) -> bool {
        let state = self.state.read();
        state
            .pending
            .as_ref()
            .is_some_and(|pending| state.current.as_ref() != Some(pending.value()))
    }

    /// Where the subscription is in its flip cycle.
    #[must_use]
    pub fn phase(&self) -> SubscriptionPhase {
        let state = self.state.read();

        if state.pending.is_some() {
            SubscriptionPhase::HasPending
        } else if state.current.is_some() {
            SubscriptionPhase::Flipped
        } else {
            SubscriptionPhase::Unflipped
        }
    }

    /// The value flipped last, if any.
    #[must_use]
    pub fn current_value(&self) -> Option<ConfigValue> {
        self.state.read().current.clone()
    }

    /// Generation of the current value; 0 before the first flip.
    #[must_use]
    pub fn generation(&self) -> i64 {
        self.state.read().generation
    }

    /// Whether the last flip changed the payload.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.state.read().changed
    }

    /// Generation at which the payload last changed; 0 before the first flip.
    #[must_use]
    pub fn last_generation_changed(&self) -> i64 {
        self.state.read().last_generation_changed
    }

    /// Retags the source with `generation` and asks it to publish again.
    ///
    /// Fetch failures are logged; the subscription keeps its current value.
    pub fn reload(&self, generation: i64) {
        if self.is_closed() {
            return;
        }

        let mut source = self.source.lock();
        source.reload(generation);
        if let Err(e) = source.fetch() {
            tracing::warn!(key = %self.key, generation, error = %e, "source fetch failed");
        }
    }

    /// Tags the source with `generation` and fetches, returning the failure.
    pub(crate) fn start(&self, generation: i64) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let mut source = self.source.lock();
        source.reload(generation);
        source.fetch()
    }

    /// Closes the subscription. Blocked waits return promptly; idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.holder.interrupt();
        self.source.lock().close();
        tracing::trace!(key = %self.key, "subscription closed");
    }

    /// Returns `true` once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ConfigSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigSubscription")
            .field("key", &self.key)
            .field("phase", &self.phase())
            .field("generation", &self.generation())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
