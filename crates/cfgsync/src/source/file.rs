//! File-backed sources.

use std::path::{Path, PathBuf};

use crate::source::{PayloadFormat, Source, UpdatePublisher};
use crate::{ConfigKey, ConfigValue, Error};

/// Serves one file for every key, format detected from its extension.
///
/// Each [`fetch`](Source::fetch) re-reads the file, so pairing it with
/// [`ConfigContext::reload`](crate::ConfigContext::reload) (or the `watch`
/// feature) picks up edits.
#[derive(Debug)]
pub struct FileSource {
    publisher: UpdatePublisher,
    key: ConfigKey,
    path: PathBuf,
}

impl FileSource {
    /// Creates a source reading `path`.
    pub fn new(publisher: UpdatePublisher, key: ConfigKey, path: impl AsRef<Path>) -> Self {
        Self {
            publisher,
            key,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The file this source reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for FileSource {
    fn fetch(&mut self) -> Result<(), Error> {
        if self.publisher.is_closed() {
            return Ok(());
        }

        let value = read_payload(&self.key, &self.path)?;
        self.publisher.publish(value);
        Ok(())
    }

    fn reload(&mut self, generation: i64) {
        self.publisher.set_generation(generation);
    }

    fn close(&mut self) {
        self.publisher.close();
    }
}

/// Serves `<dir>/<def_name>.<ext>`, probing `json`, `toml`, `yaml` and `yml`
/// in that order (formats whose feature is off are skipped).
#[derive(Debug)]
pub struct DirSource {
    publisher: UpdatePublisher,
    key: ConfigKey,
    dir: PathBuf,
}

impl DirSource {
    /// Creates a source reading from `dir`.
    pub fn new(publisher: UpdatePublisher, key: ConfigKey, dir: impl AsRef<Path>) -> Self {
        Self {
            publisher,
            key,
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Finds the file serving this key, if any.
    #[must_use]
    pub fn resolve(&self) -> Option<PathBuf> {
        PayloadFormat::extensions()
            .iter()
            .map(|ext| self.dir.join(format!("{}.{ext}", self.key.def_name())))
            .find(|path| path.is_file())
    }
}

impl Source for DirSource {
    fn fetch(&mut self) -> Result<(), Error> {
        if self.publisher.is_closed() {
            return Ok(());
        }

        let Some(path) = self.resolve() else {
            return Err(Error::source_failed(
                &self.key,
                format!(
                    "no file for `{}` in {}",
                    self.key.def_name(),
                    self.dir.display()
                ),
            ));
        };

        let value = read_payload(&self.key, &path)?;
        self.publisher.publish(value);
        Ok(())
    }

    fn reload(&mut self, generation: i64) {
        self.publisher.set_generation(generation);
    }

    fn close(&mut self) {
        self.publisher.close();
    }
}

fn read_payload(key: &ConfigKey, path: &Path) -> Result<ConfigValue, Error> {
    let format = PayloadFormat::from_path(path).ok_or_else(|| {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown");
        Error::source_failed(key, format!("unknown payload format: .{ext}"))
    })?;

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::source_failed(key, format!("failed to read {}: {e}", path.display()))
    })?;

    format
        .parse_named(&path.display().to_string(), &content)
        .map_err(|e| Error::source_failed(key, format!("{e}: {}", e.message())))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ConfigHolder;

    fn publisher() -> (Arc<ConfigHolder>, UpdatePublisher) {
        let holder = Arc::new(ConfigHolder::new());
        (holder.clone(), UpdatePublisher::new(holder))
    }

    #[test]
    fn test_file_source_publishes_canonical_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.json");
        std::fs::write(&path, "{ \"threads\": 4 }").unwrap();

        let (holder, publisher) = publisher();
        let mut source = FileSource::new(publisher, ConfigKey::new("a", "search", "config"), &path);
        source.reload(3);
        source.fetch().unwrap();

        let update = holder.provide().unwrap();
        assert_eq!(update.value().payload(), r#"{"threads":4}"#);
        assert_eq!(update.generation(), 3);
    }

    #[test]
    fn test_file_source_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.ini");
        std::fs::write(&path, "threads=4").unwrap();

        let (_holder, publisher) = publisher();
        let mut source = FileSource::new(publisher, ConfigKey::new("a", "search", "config"), &path);
        let err = source.fetch().unwrap_err();
        assert!(err.to_string().contains(".ini"));
    }

    #[test]
    fn test_dir_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        let (holder, publisher) = publisher();
        let mut source = DirSource::new(publisher, ConfigKey::new("a", "search", "config"), dir.path());
        assert!(source.resolve().is_none());
        assert!(matches!(source.fetch(), Err(Error::Source { .. })));
        assert!(!holder.poll());
    }

    #[test]
    fn test_dir_source_prefers_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("search.json"), r#"{"from":"json"}"#).unwrap();
        #[cfg(feature = "yaml")]
        std::fs::write(dir.path().join("search.yaml"), "from: yaml\n").unwrap();

        let (holder, publisher) = publisher();
        let mut source = DirSource::new(publisher, ConfigKey::new("a", "search", "config"), dir.path());
        source.fetch().unwrap();

        assert_eq!(holder.provide().unwrap().value().payload(), r#"{"from":"json"}"#);
    }
}
