use crate::model::feature::{snapshot_from_json, RepositorySnapshot};
use crate::FlagDefinition;
use chrono::{DateTime, Utc};

pub mod file;

/// Source of flag definitions used before the backend answers for the first time.
pub trait BootstrapSource: Sync + Send {
    /// Gets the bootstrapped flag definitions.
    fn snapshot(&self) -> RepositorySnapshot;
}

/// Bootstrap source holding definitions given in code or as a JSON document.
///
/// # Examples
///
/// ```rust
/// use unleash::{FlagDefinition, StaticBootstrap, Strategy};
///
/// let source = StaticBootstrap::from(vec![
///     FlagDefinition::new("beta-ui", true).with_strategy(Strategy::new("default", &[])),
/// ]);
///
/// let from_json = StaticBootstrap::from_json(r#"{"version": 1, "features": []}"#).unwrap();
/// ```
pub struct StaticBootstrap {
    snapshot: RepositorySnapshot,
}

impl StaticBootstrap {
    /// Creates a new [`StaticBootstrap`] from a definitions document.
    ///
    /// # Errors
    ///
    /// This method fails if the given document can't be parsed.
    pub fn from_json(json: &str) -> Result<Self, String> {
        match snapshot_from_json(json, "", DateTime::<Utc>::MIN_UTC) {
            Ok(snapshot) => Ok(Self { snapshot }),
            Err(err) => Err(err.to_string()),
        }
    }
}

impl From<Vec<FlagDefinition>> for StaticBootstrap {
    fn from(features: Vec<FlagDefinition>) -> Self {
        let mut snapshot = RepositorySnapshot::new(features, "");
        snapshot.fetched_at = DateTime::<Utc>::MIN_UTC;
        Self { snapshot }
    }
}

impl BootstrapSource for StaticBootstrap {
    fn snapshot(&self) -> RepositorySnapshot {
        self.snapshot.clone()
    }
}
