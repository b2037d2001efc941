use crate::builder::{ClientBuilder, Options};
use crate::constants::{FEATURES_PATH, METRICS_PATH, REGISTER_PATH};
use crate::errors::ErrorKind;
use crate::eval::details::{EvaluationDetails, FeatureState};
use crate::eval::evaluator::eval_flag;
use crate::eval::variants::select_variant;
use crate::fetch::fetcher::Fetcher;
use crate::fetch::reporter::Reporter;
use crate::fetch::service::FetchService;
use crate::fetch::{endpoint, http_client};
use crate::metrics::MetricsRegistry;
use crate::model::enums::StrategyKind;
use crate::model::feature::{FlagDefinition, RepositorySnapshot};
use crate::modes::PollingMode;
use crate::repository::FlagRepository;
use crate::{ClientError, Context, Switch, Variant};
use chrono::{DateTime, Utc};
use log::{error, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::timeout;

/// The main component for evaluating feature flags.
///
/// Evaluations only read the in-memory snapshot of the flag definitions, they never wait
/// for the network. Failures are logged and turned into the caller supplied defaults.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use unleash::{Client, Context, PollingMode};
///
/// #[tokio::main]
/// async fn main() {
///     let client = Client::builder("https://unleash.example.com/api", "my-app")
///         .api_key("default:production.secret")
///         .polling_mode(PollingMode::AutoPoll(Duration::from_secs(15)))
///         .build()
///         .unwrap();
///
///     let context = Context::new().user_id("user-id");
///     let is_enabled = client.is_enabled("beta-ui", &context, false);
/// }
/// ```
pub struct Client {
    options: Arc<Options>,
    repository: Arc<FlagRepository>,
    service: FetchService,
    reporter: Arc<Reporter>,
    metrics: Arc<MetricsRegistry>,
    started: DateTime<Utc>,
}

impl Client {
    pub(crate) fn with_options(options: Options) -> Result<Self, ClientError> {
        let opts = Arc::new(options);
        let auto_poll = matches!(opts.polling_mode(), PollingMode::AutoPoll(_));
        if auto_poll && Handle::try_current().is_err() {
            return Err(ClientError::new(
                ErrorKind::InvalidConfiguration,
                "Automatic polling requires a running tokio runtime. Build the client within a runtime or use PollingMode::Manual.".to_owned(),
            ));
        }

        let http = http_client(
            opts.app_name(),
            opts.instance_id(),
            opts.api_key().as_deref(),
            *opts.http_timeout(),
        )?;
        let fetcher = Fetcher::new(endpoint(opts.url(), FEATURES_PATH)?, http.clone());
        let reporter = Arc::new(Reporter::new(
            endpoint(opts.url(), REGISTER_PATH)?,
            endpoint(opts.url(), METRICS_PATH)?,
            opts.app_name(),
            opts.instance_id(),
            http,
        ));
        let repository = Arc::new(FlagRepository::new());
        let metrics = Arc::new(MetricsRegistry::new());
        let service = FetchService::new(&opts, Arc::clone(&repository), fetcher);
        if auto_poll && opts.metrics_enabled() {
            service.start_metrics(
                Arc::clone(&reporter),
                Arc::clone(&metrics),
                *opts.metrics_interval(),
            );
        }

        Ok(Self {
            options: opts,
            repository,
            service,
            reporter,
            metrics,
            started: Utc::now(),
        })
    }

    /// Creates a new [`ClientBuilder`] used to build a [`Client`].
    ///
    /// `url` is the base of the backend's client API (e.g. `https://host/api`),
    /// `app_name` identifies the application towards the backend.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use unleash::{Client, PollingMode};
    ///
    /// let client = Client::builder("https://unleash.example.com/api", "my-app")
    ///     .api_key("default:production.secret")
    ///     .polling_mode(PollingMode::Manual)
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder(url: &str, app_name: &str) -> ClientBuilder {
        ClientBuilder::new(url, app_name)
    }

    /// Creates a new [`Client`] with default options.
    ///
    /// # Errors
    ///
    /// This method fails if the given URL or app name is invalid, or when it's
    /// called outside a tokio runtime.
    pub fn new(url: &str, app_name: &str) -> Result<Self, ClientError> {
        ClientBuilder::new(url, app_name).build()
    }

    /// Returns whether the feature flag identified by `name` is enabled for `context`.
    ///
    /// Returns `false` when the kill switch is off. Returns `default` when the definitions
    /// are not loaded yet, the flag doesn't exist, or its evaluation failed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use unleash::{Client, Context, PollingMode};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::new("https://unleash.example.com/api", "my-app").unwrap();
    ///
    ///     let context = Context::new().user_id("user-id").property("tenant", "acme");
    ///     let is_enabled = client.is_enabled("beta-ui", &context, false);
    /// }
    /// ```
    pub fn is_enabled(&self, name: &str, context: &Context, default: bool) -> bool {
        self.is_enabled_details(name, context, default).value
    }

    /// The same as [`Client::is_enabled`] but returns an [`EvaluationDetails`] that
    /// contains additional information about the result of the evaluation process.
    pub fn is_enabled_details(
        &self,
        name: &str,
        context: &Context,
        default: bool,
    ) -> EvaluationDetails<bool> {
        if !self.options.switch().is_on() {
            return EvaluationDetails {
                value: false,
                key: name.to_owned(),
                ..EvaluationDetails::default()
            };
        }
        let snapshot = match self.repository.get_snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(event_id = err.kind.as_u16(); "Flag definitions are not loaded yet when evaluating '{name}'. Returning the default value '{default}'.");
                return EvaluationDetails::from_err(default, name, err);
            }
        };
        let flag = match snapshot.get(name) {
            Some(flag) => flag,
            None => {
                let err = ClientError::new(
                    ErrorKind::FlagMissing,
                    format!("Flag '{name}' was not found in the flag definitions. Returning the default value '{default}'."),
                );
                warn!(event_id = err.kind.as_u16(); "{}", err);
                return EvaluationDetails {
                    fetch_time: Some(snapshot.fetched_at),
                    ..EvaluationDetails::from_err(default, name, err)
                };
            }
        };
        let ctx = self.context(context);
        match self.eval(flag, &ctx, default) {
            Ok(matched_strategy) => {
                let value = matched_strategy.is_some();
                self.count(name, value);
                EvaluationDetails {
                    value,
                    key: name.to_owned(),
                    is_default_value: false,
                    matched_strategy,
                    error: None,
                    fetch_time: Some(snapshot.fetched_at),
                }
            }
            Err(err) => EvaluationDetails {
                fetch_time: Some(snapshot.fetched_at),
                ..EvaluationDetails::from_err(default, name, err)
            },
        }
    }

    /// Selects the variant of the feature flag identified by `name` for `context`.
    ///
    /// Returns `fallback` when the kill switch is off or the flag is not enabled for the
    /// context. When the flag is enabled but has no selectable variant, `fallback` is
    /// returned with [`Variant::feature_enabled`] set.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use unleash::{Client, Context, Variant};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::new("https://unleash.example.com/api", "my-app").unwrap();
    ///
    ///     let context = Context::new().user_id("user-id");
    ///     let variant = client.get_variant("checkout-color", &context, Variant::disabled());
    ///     if variant.enabled {
    ///         println!("{variant}");
    ///     }
    /// }
    /// ```
    pub fn get_variant(&self, name: &str, context: &Context, fallback: Variant) -> Variant {
        if !self.options.switch().is_on() {
            return fallback;
        }
        let snapshot = match self.repository.get_snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(event_id = err.kind.as_u16(); "Flag definitions are not loaded yet when selecting a variant of '{name}'. Returning the fallback variant '{fallback}'.");
                return fallback;
            }
        };
        let flag = match snapshot.get(name) {
            Some(flag) => flag,
            None => {
                warn!(event_id = ErrorKind::FlagMissing.as_u16(); "Flag '{name}' was not found in the flag definitions. Returning the fallback variant '{fallback}'.");
                return fallback;
            }
        };
        let ctx = self.context(context);
        let enabled = self.eval(flag, &ctx, false).is_ok_and(|m| m.is_some());
        self.count(name, enabled);
        if !enabled {
            self.count_variant(name, fallback.name.as_str());
            return fallback;
        }
        match select_variant(flag, &ctx) {
            Some(variant) => {
                self.count_variant(name, variant.name.as_str());
                variant
            }
            None => {
                self.count_variant(name, fallback.name.as_str());
                Variant {
                    feature_enabled: true,
                    ..fallback
                }
            }
        }
    }

    /// Evaluates every known feature flag for `context`, sorted by name.
    ///
    /// When `only_enabled` is `true` only the enabled flags are returned. Returns an empty
    /// [`Vec`] when the kill switch is off or the definitions are not loaded yet.
    pub fn get_features(&self, only_enabled: bool, context: &Context) -> Vec<FeatureState> {
        if !self.options.switch().is_on() {
            return vec![];
        }
        let snapshot = match self.repository.get_snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(event_id = err.kind.as_u16(); "Flag definitions are not loaded yet. Returning empty feature list.");
                return vec![];
            }
        };
        let ctx = self.context(context);
        let mut features = Vec::with_capacity(snapshot.len());
        for name in snapshot.names() {
            let enabled = match snapshot.get(name.as_str()) {
                Some(flag) => self.eval(flag, &ctx, false).is_ok_and(|m| m.is_some()),
                None => false,
            };
            if !only_enabled || enabled {
                features.push(FeatureState { name, enabled });
            }
        }
        features
    }

    /// Returns the sorted names of all known feature flags.
    ///
    /// If there are no definitions to work on, this method returns an empty [`Vec`].
    pub fn feature_names(&self) -> Vec<String> {
        self.repository.feature_names()
    }

    /// Returns the current snapshot of the flag definitions, if any was loaded.
    pub fn snapshot(&self) -> Option<Arc<RepositorySnapshot>> {
        self.repository.get_snapshot().ok()
    }

    /// Announces this client instance to the backend.
    ///
    /// Returns `true` when the backend accepted the registration. Failures are logged and
    /// have no effect on flag evaluation.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use unleash::Client;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::new("https://unleash.example.com/api", "my-app").unwrap();
    ///
    ///     let registered = client.register().await;
    /// }
    /// ```
    pub async fn register(&self) -> bool {
        if !self.options.switch().is_on() {
            return false;
        }
        if self.service.is_offline() {
            warn!(event_id = ErrorKind::OfflineClient.as_u16(); "Client is in offline mode, it cannot register.");
            return false;
        }
        let mut strategies = StrategyKind::builtin_names()
            .iter()
            .map(|s| (*s).to_owned())
            .collect::<Vec<String>>();
        strategies.extend(self.options.strategies().names());
        self.reporter
            .register(
                &strategies,
                self.started,
                self.options.metrics_interval().as_millis(),
            )
            .await
            .is_ok()
    }

    /// Initiates a fetch of the flag definitions.
    ///
    /// # Errors
    ///
    /// This method fails in the following cases:
    /// - The kill switch is off.
    /// - The client is in offline mode.
    /// - The HTTP request that supposed to download the definitions fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use unleash::{Client, PollingMode};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::builder("https://unleash.example.com/api", "my-app")
    ///         .polling_mode(PollingMode::Manual)
    ///         .build()
    ///         .unwrap();
    ///
    ///     client.refresh().await.unwrap();
    /// }
    /// ```
    pub async fn refresh(&self) -> Result<(), ClientError> {
        if !self.options.switch().is_on() {
            let err = ClientError::new(
                ErrorKind::ClientDisabled,
                "Client is disabled by its kill switch, it cannot initiate HTTP calls.".to_owned(),
            );
            warn!(event_id = err.kind.as_u16(); "{}", err);
            return Err(err);
        }
        if self.service.is_offline() {
            let err = ClientError::new(
                ErrorKind::OfflineClient,
                "Client is in offline mode, it cannot initiate HTTP calls.".to_owned(),
            );
            warn!(event_id = err.kind.as_u16(); "{}", err);
            return Err(err);
        }
        self.service.refresh().await
    }

    /// Returns a handle to the kill switch of this [`Client`].
    pub fn switch(&self) -> Switch {
        self.options.switch().clone()
    }

    /// Puts the [`Client`] into offline mode.
    ///
    /// In this mode the client doesn't initiate HTTP requests and works from the last
    /// loaded definitions.
    pub fn offline(&self) {
        self.service.set_mode(true);
    }

    /// Puts the [`Client`] into online mode.
    pub fn online(&self) {
        self.service.set_mode(false);
    }

    /// Returns `true` when the client is configured not to initiate HTTP requests, otherwise `false`.
    pub fn is_offline(&self) -> bool {
        self.service.is_offline()
    }

    /// Asynchronously waits for the first fetch attempt for a maximum duration specified in `wait_timeout`.
    ///
    /// This method fails if the first fetch takes more time than the specified `wait_timeout`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use unleash::Client;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::new("https://unleash.example.com/api", "my-app").unwrap();
    ///     client.wait_for_ready(Duration::from_secs(5)).await.unwrap();
    /// }
    /// ```
    pub async fn wait_for_ready(&self, wait_timeout: Duration) -> Result<(), ClientError> {
        match timeout(wait_timeout, self.service.wait_for_init()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let err = ClientError::new(
                    ErrorKind::ClientInitTimedOut,
                    format!(
                        "Client initialization timed out after {}ms.",
                        wait_timeout.as_millis()
                    ),
                );
                warn!(event_id = err.kind.as_u16(); "{}", err);
                Err(err)
            }
        }
    }

    /// Stops the background tasks of the [`Client`].
    ///
    /// Evaluations keep working from the last loaded definitions.
    pub fn close(&self) {
        self.service.close();
    }

    fn context(&self, context: &Context) -> Context {
        context.with_defaults(self.options.environment(), self.options.app_name())
    }

    fn eval(
        &self,
        flag: &FlagDefinition,
        context: &Context,
        default: bool,
    ) -> Result<Option<String>, ClientError> {
        match eval_flag(
            flag,
            context,
            self.options.strategies(),
            self.options.hostname(),
        ) {
            Ok(matched) => Ok(matched.map(|strategy| strategy.name.clone())),
            Err(err) => {
                let err = ClientError::new(
                    ErrorKind::EvaluationError,
                    format!("Failed to evaluate flag '{}' ({err}). Returning the default value '{default}'.", flag.name),
                );
                error!(event_id = err.kind.as_u16(); "{}", err);
                Err(err)
            }
        }
    }

    fn count(&self, name: &str, enabled: bool) {
        if self.options.metrics_enabled() {
            self.metrics.count(name, enabled);
        }
    }

    fn count_variant(&self, name: &str, variant: &str) {
        if self.options.metrics_enabled() {
            self.metrics.count_variant(name, variant);
        }
    }
}
