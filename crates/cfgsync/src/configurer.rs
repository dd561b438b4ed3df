//! Background reconfiguration.
//!
//! [`SimpleConfigurer`] runs a [`SimpleConfigRetriever`] on its own thread and
//! hands every new snapshot to a [`SimpleConfigurable`].
//!
//! ```rust,ignore
//! let retriever = SimpleConfigRetriever::new(context, keys)?;
//! let mut configurer = SimpleConfigurer::new(retriever, |snapshot: &ConfigSnapshot| -> Result<(), ConfigureError> {
//!     let search: SearchConfig = snapshot.get_config("search/0")?;
//!     pool.resize(search.threads);
//!     Ok(())
//! });
//!
//! // Returns once the first snapshot has been applied.
//! configurer.start()?;
//! // ...
//! configurer.close();
//! ```

use std::error::Error as StdError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::{ConfigSnapshot, Error, SimpleConfigRetriever};

/// Error type returned by [`SimpleConfigurable::configure`].
pub type ConfigureError = Box<dyn StdError + Send + Sync>;

/// Receives snapshots from a [`SimpleConfigurer`].
pub trait SimpleConfigurable: Send + 'static {
    /// Applies `snapshot`.
    ///
    /// # Errors
    ///
    /// Any error. During [`SimpleConfigurer::start`] it is returned to the
    /// caller; on the background thread it is logged.
    fn configure(&mut self, snapshot: &ConfigSnapshot) -> Result<(), ConfigureError>;
}

impl<F> SimpleConfigurable for F
where
    F: FnMut(&ConfigSnapshot) -> Result<(), ConfigureError> + Send + 'static,
{
    fn configure(&mut self, snapshot: &ConfigSnapshot) -> Result<(), ConfigureError> {
        self(snapshot)
    }
}

/// Applies snapshots on a background thread until closed.
pub struct SimpleConfigurer {
    retriever: Arc<SimpleConfigRetriever>,
    configurable: Option<Box<dyn SimpleConfigurable>>,
    rejected: Option<ConfigSnapshot>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SimpleConfigurer {
    /// Name of the background thread.
    pub const THREAD_NAME: &'static str = "cfgsync-configurer";

    /// Creates a configurer; nothing runs until [`start`](Self::start).
    pub fn new(retriever: SimpleConfigRetriever, configurable: impl SimpleConfigurable) -> Self {
        Self {
            retriever: Arc::new(retriever),
            configurable: Some(Box::new(configurable)),
            rejected: None,
            worker: Mutex::new(None),
        }
    }

    /// Applies the first snapshot synchronously, then starts the background
    /// thread. Calling it again after success does nothing.
    ///
    /// If the first `configure` call fails, the same snapshot is offered
    /// again by the next `start`.
    ///
    /// Returns without configuring if the retriever is closed before a
    /// snapshot arrives.
    ///
    /// # Errors
    ///
    /// - [`Error::Configure`] if the first `configure` call fails
    /// - [`Error::Configure`] if the thread cannot be spawned
    pub fn start(&mut self) -> Result<(), Error> {
        let Some(mut configurable) = self.configurable.take() else {
            tracing::warn!("configurer already started");
            return Ok(());
        };

        let Some(snapshot) = self.rejected.take().or_else(|| self.first_snapshot()) else {
            self.configurable = Some(configurable);
            return Ok(());
        };

        if let Err(e) = configurable.configure(&snapshot) {
            self.configurable = Some(configurable);
            self.rejected = Some(snapshot);
            return Err(Error::configure(e));
        }
        tracing::debug!(generation = snapshot.generation(), "initial configuration applied");

        let retriever = self.retriever.clone();
        let worker = thread::Builder::new()
            .name(Self::THREAD_NAME.to_string())
            .spawn(move || run(&retriever, configurable.as_mut()))
            .map_err(|e| Error::configure(Box::new(e)))?;

        *self.worker.lock() = Some(worker);
        Ok(())
    }

    fn first_snapshot(&self) -> Option<ConfigSnapshot> {
        let timeout = self.retriever.next_config_timeout();
        while !self.retriever.is_closed() {
            let snapshot = self.retriever.get_configs(timeout);
            if !snapshot.is_empty() {
                return Some(snapshot);
            }
        }
        None
    }

    /// Closes the retriever and joins the background thread. Idempotent.
    pub fn close(&self) {
        self.retriever.close();

        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        if worker.thread().id() == thread::current().id() {
            return;
        }
        if worker.join().is_err() {
            tracing::error!("configurer thread panicked");
        }
    }

    /// Returns `true` once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.retriever.is_closed()
    }

    /// Generation of the last applied snapshot.
    #[must_use]
    pub fn generation(&self) -> i64 {
        self.retriever.generation()
    }
}

fn run(retriever: &SimpleConfigRetriever, configurable: &mut dyn SimpleConfigurable) {
    let timeout = retriever.next_config_timeout();

    while !retriever.is_closed() {
        let snapshot = retriever.get_configs(timeout);
        if snapshot.is_empty() {
            continue;
        }

        let generation = snapshot.generation();
        match catch_unwind(AssertUnwindSafe(|| configurable.configure(&snapshot))) {
            Ok(Ok(())) => tracing::debug!(generation, "configuration applied"),
            Ok(Err(e)) => tracing::warn!(generation, error = %e, "configure callback failed"),
            Err(_) => tracing::error!(generation, "configure callback panicked"),
        }
    }

    tracing::debug!("configurer stopped");
}

impl Drop for SimpleConfigurer {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SimpleConfigurer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleConfigurer")
            .field("retriever", &self.retriever)
            .field("started", &self.configurable.is_none())
            .field("rejected", &self.rejected.as_ref().map(ConfigSnapshot::generation))
            .finish_non_exhaustive()
    }
}
