use crate::bootstrap::BootstrapSource;
use crate::model::feature::{snapshot_from_json, RepositorySnapshot};
use chrono::{DateTime, Utc};
use std::fs;

/// Bootstrap source that reads the flag definitions from a JSON file in the backend's format.
pub struct FileBootstrap {
    snapshot: RepositorySnapshot,
}

impl FileBootstrap {
    /// Creates a new [`FileBootstrap`].
    ///
    /// # Errors
    ///
    /// This method fails in the following cases:
    /// - The given file doesn't exist.
    /// - The given file's content is not a valid definitions document.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use unleash::FileBootstrap;
    ///
    /// let source = FileBootstrap::new("path/to/features.json").unwrap();
    /// ```
    pub fn new(file_path: &str) -> Result<Self, String> {
        let content = match fs::read_to_string(file_path) {
            Ok(content) => content,
            Err(err) => return Err(err.to_string()),
        };
        match snapshot_from_json(content.as_str(), "", DateTime::<Utc>::MIN_UTC) {
            Ok(snapshot) => Ok(Self { snapshot }),
            Err(err) => Err(err.to_string()),
        }
    }
}

impl BootstrapSource for FileBootstrap {
    fn snapshot(&self) -> RepositorySnapshot {
        self.snapshot.clone()
    }
}
