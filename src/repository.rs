use crate::errors::{ClientError, ErrorKind};
use crate::model::feature::RepositorySnapshot;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// Holds the latest [`RepositorySnapshot`].
///
/// Readers get the current snapshot without locking; writers replace it atomically,
/// so a reader never observes a partially updated set of flags.
#[derive(Default)]
pub struct FlagRepository {
    snapshot: ArcSwapOption<RepositorySnapshot>,
}

impl FlagRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last known good snapshot.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::NotYetLoaded`] when no snapshot was stored yet.
    pub fn get_snapshot(&self) -> Result<Arc<RepositorySnapshot>, ClientError> {
        match self.snapshot.load_full() {
            Some(snapshot) => Ok(snapshot),
            None => Err(ClientError::new(
                ErrorKind::NotYetLoaded,
                "Flag definitions are not loaded yet.".to_owned(),
            )),
        }
    }

    /// Atomically replaces the current snapshot.
    pub fn update(&self, snapshot: RepositorySnapshot) {
        self.snapshot.store(Some(Arc::new(snapshot)));
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.load().is_some()
    }

    /// Returns the sorted names of all known flags, or an empty [`Vec`] before the first load.
    pub fn feature_names(&self) -> Vec<String> {
        match &*self.snapshot.load() {
            Some(snapshot) => snapshot.names(),
            None => vec![],
        }
    }
}

#[cfg(test)]
mod repository_tests {
    use crate::errors::ErrorKind;
    use crate::model::feature::{FlagDefinition, RepositorySnapshot};
    use crate::repository::FlagRepository;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn not_yet_loaded() {
        let repo = FlagRepository::new();
        assert!(!repo.is_loaded());
        assert!(repo.feature_names().is_empty());
        assert_eq!(repo.get_snapshot().unwrap_err().kind, ErrorKind::NotYetLoaded);
    }

    #[test]
    fn update_replaces_snapshot() {
        let repo = FlagRepository::new();
        repo.update(RepositorySnapshot::new(vec![FlagDefinition::new("a", true)], "e1"));
        let first = repo.get_snapshot().unwrap();
        repo.update(RepositorySnapshot::new(
            vec![FlagDefinition::new("b", true), FlagDefinition::new("c", false)],
            "e2",
        ));
        let second = repo.get_snapshot().unwrap();

        assert_eq!(first.etag, "e1");
        assert_eq!(first.names(), vec!["a"]);
        assert_eq!(second.etag, "e2");
        assert_eq!(repo.feature_names(), vec!["b", "c"]);
    }

    #[test]
    fn concurrent_readers_see_whole_snapshots() {
        let repo = Arc::new(FlagRepository::new());
        repo.update(RepositorySnapshot::new(vec![FlagDefinition::new("x0", true)], "0"));

        let writer = {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                for i in 1..200 {
                    let features = (0..=i % 5)
                        .map(|n| FlagDefinition::new(format!("x{n}").as_str(), true))
                        .collect();
                    repo.update(RepositorySnapshot::new(features, (i % 5).to_string().as_str()));
                }
            })
        };
        let readers = (0..4)
            .map(|_| {
                let repo = Arc::clone(&repo);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = repo.get_snapshot().unwrap();
                        let expected = snapshot.etag.parse::<usize>().unwrap() + 1;
                        assert_eq!(snapshot.len(), expected);
                    }
                })
            })
            .collect::<Vec<_>>();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
