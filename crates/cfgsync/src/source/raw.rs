//! Source serving a fixed payload.

use crate::ConfigValue;
use crate::Error;
use crate::source::{Source, UpdatePublisher};

/// Serves the same payload for every key. Mostly useful in tests.
#[derive(Debug)]
pub struct RawSource {
    publisher: UpdatePublisher,
    value: ConfigValue,
}

impl RawSource {
    /// Creates a source that always publishes `payload`.
    pub fn new(publisher: UpdatePublisher, payload: impl Into<String>) -> Self {
        Self {
            publisher,
            value: ConfigValue::new(payload),
        }
    }
}

impl Source for RawSource {
    fn fetch(&mut self) -> Result<(), Error> {
        self.publisher.publish(self.value.clone());
        Ok(())
    }

    fn reload(&mut self, generation: i64) {
        self.publisher.set_generation(generation);
    }

    fn close(&mut self) {
        self.publisher.close();
    }
}
