use crate::Context;
use std::collections::HashMap;

/// API used to implement activation strategies that are not built into the client.
///
/// # Examples
///
/// ```rust
/// use std::collections::HashMap;
/// use unleash::{Context, CustomStrategy};
///
/// struct TenantStrategy {}
///
/// impl CustomStrategy for TenantStrategy {
///     fn name(&self) -> &str {
///         "tenant"
///     }
///
///     fn is_enabled(&self, parameters: &HashMap<String, String>, context: &Context) -> bool {
///         let tenants = parameters.get("tenants").map(|t| t.as_str()).unwrap_or_default();
///         context
///             .properties()
///             .get("tenant")
///             .is_some_and(|t| tenants.split(',').any(|x| x.trim() == t))
///     }
/// }
/// ```
pub trait CustomStrategy: Sync + Send {
    /// The backend name of the strategy.
    fn name(&self) -> &str;

    /// Decides whether the strategy activates for the given `context`.
    fn is_enabled(&self, parameters: &HashMap<String, String>, context: &Context) -> bool;
}

#[derive(Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Box<dyn CustomStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, strategy: Box<dyn CustomStrategy>) {
        self.strategies.insert(strategy.name().to_owned(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<&dyn CustomStrategy> {
        self.strategies.get(name).map(|s| s.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }
}
