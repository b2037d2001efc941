use crate::cache::EmptyConfigCache;
use crate::errors::{ClientError, ErrorKind};
use crate::modes::PollingMode;
use crate::strategy::StrategyRegistry;
use crate::{BootstrapSource, Client, ConfigCache, CustomStrategy, Switch};
use log::warn;
use reqwest::Url;
use std::borrow::Borrow;
use std::env;
use std::time::Duration;

pub const ENV_ENABLED: &str = "UNLEASH_ENABLED";
pub const ENV_URL: &str = "UNLEASH_URL";
pub const ENV_API_KEY: &str = "UNLEASH_API_KEY";
pub const ENV_APP_NAME: &str = "UNLEASH_APP_NAME";
pub const ENV_INSTANCE_ID: &str = "UNLEASH_INSTANCE_ID";
pub const ENV_POLL_INTERVAL: &str = "UNLEASH_POLL_INTERVAL_SECONDS";
pub const ENV_METRICS_ENABLED: &str = "UNLEASH_METRICS_ENABLED";
pub const ENV_ENVIRONMENT: &str = "UNLEASH_ENVIRONMENT";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BACKOFF_FACTOR: u32 = 10;

pub struct Options {
    url: Url,
    app_name: String,
    instance_id: String,
    api_key: Option<String>,
    environment: String,
    hostname: String,
    switch: Switch,
    offline: bool,
    http_timeout: Duration,
    max_backoff: Duration,
    metrics_enabled: bool,
    metrics_interval: Duration,
    cache: Box<dyn ConfigCache>,
    bootstrap: Option<Box<dyn BootstrapSource>>,
    strategies: StrategyRegistry,
    polling_mode: PollingMode,
}

impl Options {
    pub(crate) fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) fn app_name(&self) -> &str {
        &self.app_name
    }

    pub(crate) fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub(crate) fn api_key(&self) -> &Option<String> {
        &self.api_key
    }

    pub(crate) fn environment(&self) -> &str {
        &self.environment
    }

    pub(crate) fn hostname(&self) -> &str {
        &self.hostname
    }

    pub(crate) fn switch(&self) -> &Switch {
        &self.switch
    }

    pub(crate) fn offline(&self) -> bool {
        self.offline
    }

    pub(crate) fn http_timeout(&self) -> &Duration {
        &self.http_timeout
    }

    pub(crate) fn max_backoff(&self) -> &Duration {
        &self.max_backoff
    }

    pub(crate) fn metrics_enabled(&self) -> bool {
        self.metrics_enabled
    }

    pub(crate) fn metrics_interval(&self) -> &Duration {
        &self.metrics_interval
    }

    pub(crate) fn cache(&self) -> &dyn ConfigCache {
        self.cache.borrow()
    }

    pub(crate) fn bootstrap(&self) -> Option<&dyn BootstrapSource> {
        self.bootstrap.as_deref()
    }

    pub(crate) fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    pub(crate) fn polling_mode(&self) -> &PollingMode {
        &self.polling_mode
    }
}

/// Builder to create an Unleash [`Client`].
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use unleash::{Client, PollingMode};
///
/// let builder = Client::builder("https://unleash.example.com/api", "my-app")
///     .api_key("default:production.secret")
///     .polling_mode(PollingMode::AutoPoll(Duration::from_secs(15)));
///
/// let client = builder.build().unwrap();
/// ```
pub struct ClientBuilder {
    url: String,
    app_name: String,
    instance_id: Option<String>,
    api_key: Option<String>,
    environment: Option<String>,
    hostname: Option<String>,
    switch: Option<Switch>,
    offline: bool,
    http_timeout: Option<Duration>,
    max_backoff: Option<Duration>,
    metrics_enabled: bool,
    metrics_interval: Option<Duration>,
    cache: Option<Box<dyn ConfigCache>>,
    bootstrap: Option<Box<dyn BootstrapSource>>,
    strategies: StrategyRegistry,
    polling_mode: Option<PollingMode>,
}

impl ClientBuilder {
    pub(crate) fn new(url: &str, app_name: &str) -> Self {
        Self {
            url: url.to_owned(),
            app_name: app_name.to_owned(),
            instance_id: None,
            api_key: None,
            environment: None,
            hostname: None,
            switch: None,
            offline: false,
            http_timeout: None,
            max_backoff: None,
            metrics_enabled: true,
            metrics_interval: None,
            cache: None,
            bootstrap: None,
            strategies: StrategyRegistry::new(),
            polling_mode: None,
        }
    }

    /// Creates a [`ClientBuilder`] from the process environment.
    ///
    /// Reads `UNLEASH_URL`, `UNLEASH_APP_NAME`, `UNLEASH_API_KEY`, `UNLEASH_INSTANCE_ID`,
    /// `UNLEASH_ENABLED`, `UNLEASH_POLL_INTERVAL_SECONDS`, `UNLEASH_METRICS_ENABLED` and
    /// `UNLEASH_ENVIRONMENT`. Missing variables keep the defaults; invalid values are
    /// reported by [`ClientBuilder::build`] or logged and ignored.
    pub fn from_env() -> Self {
        let mut builder = Self::new(
            env::var(ENV_URL).unwrap_or_default().as_str(),
            env::var(ENV_APP_NAME).unwrap_or_default().as_str(),
        );
        if let Ok(api_key) = env::var(ENV_API_KEY) {
            builder = builder.api_key(api_key.as_str());
        }
        if let Ok(instance_id) = env::var(ENV_INSTANCE_ID) {
            builder = builder.instance_id(instance_id.as_str());
        }
        if let Ok(environment) = env::var(ENV_ENVIRONMENT) {
            builder = builder.environment(environment.as_str());
        }
        if let Some(enabled) = env_bool(ENV_ENABLED) {
            builder = builder.enabled(enabled);
        }
        if let Some(metrics) = env_bool(ENV_METRICS_ENABLED) {
            builder = builder.metrics(metrics);
        }
        if let Ok(raw) = env::var(ENV_POLL_INTERVAL) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => {
                    builder = builder.polling_mode(PollingMode::AutoPoll(Duration::from_secs(secs)))
                }
                _ => {
                    warn!(event_id = ErrorKind::InvalidConfiguration.as_u16(); "Invalid {ENV_POLL_INTERVAL} value '{raw}', using the default poll interval.")
                }
            }
        }
        builder
    }

    /// Sets the API key sent in the `Authorization` header.
    pub fn api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_owned());
        self
    }

    /// Sets the identifier of this client instance.
    /// Default value is derived from the host name.
    pub fn instance_id(mut self, instance_id: &str) -> Self {
        self.instance_id = Some(instance_id.to_owned());
        self
    }

    /// Sets the environment put into every evaluation context that doesn't set one.
    /// Default value is `default`.
    pub fn environment(mut self, environment: &str) -> Self {
        self.environment = Some(environment.to_owned());
        self
    }

    /// Sets the host name used by the `applicationHostname` strategy.
    /// Default value is read from the `HOSTNAME` environment variable.
    pub fn hostname(mut self, hostname: &str) -> Self {
        self.hostname = Some(hostname.to_owned());
        self
    }

    /// Sets the initial state of the kill switch.
    /// Default value is `true`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use unleash::Client;
    ///
    /// let builder = Client::builder("https://unleash.example.com/api", "my-app")
    ///     .enabled(false);
    /// ```
    pub fn enabled(mut self, enabled: bool) -> Self {
        match &self.switch {
            Some(switch) => switch.set(enabled),
            None => self.switch = Some(Switch::new(enabled)),
        }
        self
    }

    /// Sets a shared kill switch whose state is read on every evaluation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use unleash::{Client, Switch};
    ///
    /// let switch = Switch::new(true);
    /// let builder = Client::builder("https://unleash.example.com/api", "my-app")
    ///     .switch(switch.clone());
    ///
    /// // later, e.g. from an admin endpoint
    /// switch.set(false);
    /// ```
    pub fn switch(mut self, switch: Switch) -> Self {
        self.switch = Some(switch);
        self
    }

    /// Indicates whether the client should be initialized in offline mode or not.
    /// Default value is `false`.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Sets the HTTP request timeout.
    /// Default value is `30` seconds.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Sets the upper bound of the delay between failed fetches.
    /// Default value is ten times the poll interval.
    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = Some(max_backoff);
        self
    }

    /// Indicates whether usage metrics should be sent to the backend.
    /// Default value is `true`.
    pub fn metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// Sets how often usage metrics are sent.
    /// Default value is `60` seconds.
    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    /// Sets a [`ConfigCache`] implementation used to persist the last fetched definitions.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use unleash::{ConfigCache, Client};
    ///
    /// let builder = Client::builder("https://unleash.example.com/api", "my-app")
    ///     .cache(Box::new(CustomCache{}));
    ///
    /// struct CustomCache {}
    ///
    /// impl ConfigCache for CustomCache {
    ///     fn read(&self, key: &str) -> Option<String> {
    ///         // read from cache
    ///         None
    ///     }
    ///
    ///     fn write(&self, key: &str, value: &str) {
    ///         // write to cache
    ///     }
    /// }
    /// ```
    pub fn cache(mut self, cache: Box<dyn ConfigCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the definitions used until the first successful fetch.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use unleash::{Client, FileBootstrap};
    ///
    /// let builder = Client::builder("https://unleash.example.com/api", "my-app")
    ///     .bootstrap(Box::new(FileBootstrap::new("features.json").unwrap()));
    /// ```
    pub fn bootstrap(mut self, source: Box<dyn BootstrapSource>) -> Self {
        self.bootstrap = Some(source);
        self
    }

    /// Registers a [`CustomStrategy`] implementation.
    pub fn strategy(mut self, strategy: Box<dyn CustomStrategy>) -> Self {
        self.strategies.register(strategy);
        self
    }

    /// Sets the [`PollingMode`] of the client.
    /// Default value is [`PollingMode::AutoPoll`] with `15` seconds poll interval.
    pub fn polling_mode(mut self, polling_mode: PollingMode) -> Self {
        self.polling_mode = Some(polling_mode);
        self
    }

    /// Creates a [`Client`] from the configuration made on the builder.
    ///
    /// Must be called within a tokio runtime when [`PollingMode::AutoPoll`] is used.
    ///
    /// # Errors
    ///
    /// This method fails in the following cases:
    /// - The URL is empty or invalid.
    /// - The app name is empty.
    /// - The polling interval, the metrics interval or the maximum backoff is zero.
    /// - The HTTP client can't be initialized.
    pub fn build(self) -> Result<Client, ClientError> {
        let options = self.build_options()?;
        Client::with_options(options)
    }

    pub(crate) fn build_options(self) -> Result<Options, ClientError> {
        if self.app_name.trim().is_empty() {
            return Err(ClientError::new(
                ErrorKind::InvalidConfiguration,
                "App name cannot be empty".to_owned(),
            ));
        }
        let url = parse_url(self.url.as_str())?;
        let hostname = self
            .hostname
            .unwrap_or_else(|| env::var("HOSTNAME").unwrap_or_default());
        let polling_mode = self
            .polling_mode
            .unwrap_or(PollingMode::AutoPoll(DEFAULT_POLL_INTERVAL));
        let poll_interval = match polling_mode {
            PollingMode::AutoPoll(interval) => interval,
            PollingMode::Manual => DEFAULT_POLL_INTERVAL,
        };
        let metrics_interval = self.metrics_interval.unwrap_or(DEFAULT_METRICS_INTERVAL);
        for (name, interval) in [
            ("Polling interval", Some(poll_interval)),
            ("Metrics interval", Some(metrics_interval)),
            ("Maximum backoff", self.max_backoff),
        ] {
            if interval.is_some_and(|i| i.is_zero()) {
                return Err(ClientError::new(
                    ErrorKind::InvalidConfiguration,
                    format!("{name} must be greater than zero."),
                ));
            }
        }
        let instance_id = self.instance_id.unwrap_or_else(|| {
            let prefix = if hostname.is_empty() {
                "unleash-rust"
            } else {
                hostname.as_str()
            };
            format!("{prefix}-{:08x}", rand::random::<u32>())
        });
        Ok(Options {
            url,
            app_name: self.app_name,
            instance_id,
            api_key: self.api_key,
            environment: self.environment.unwrap_or_else(|| "default".to_owned()),
            hostname,
            switch: self.switch.unwrap_or_default(),
            offline: self.offline,
            http_timeout: self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT),
            max_backoff: self.max_backoff.unwrap_or(
                poll_interval
                    .checked_mul(MAX_BACKOFF_FACTOR)
                    .unwrap_or(Duration::MAX),
            ),
            metrics_enabled: self.metrics_enabled,
            metrics_interval,
            cache: self.cache.unwrap_or(Box::new(EmptyConfigCache::new())),
            bootstrap: self.bootstrap,
            strategies: self.strategies,
            polling_mode,
        })
    }
}

fn parse_url(raw: &str) -> Result<Url, ClientError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClientError::new(
            ErrorKind::InvalidConfiguration,
            "URL cannot be empty".to_owned(),
        ));
    }
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/")
    };
    match Url::parse(with_slash.as_str()) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(url),
        Ok(_) => Err(ClientError::new(
            ErrorKind::InvalidConfiguration,
            format!("URL '{trimmed}' must use http or https."),
        )),
        Err(err) => Err(ClientError::new(
            ErrorKind::InvalidConfiguration,
            format!("URL '{trimmed}' is invalid. {err}"),
        )),
    }
}

fn env_bool(key: &str) -> Option<bool> {
    let raw = env::var(key).ok()?;
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(event_id = ErrorKind::InvalidConfiguration.as_u16(); "Invalid {key} value '{raw}', ignoring it.");
            None
        }
    }
}

#[cfg(test)]
mod builder_tests {
    use crate::builder::{
        parse_url, ClientBuilder, ENV_API_KEY, ENV_APP_NAME, ENV_ENABLED, ENV_ENVIRONMENT,
        ENV_METRICS_ENABLED, ENV_POLL_INTERVAL, ENV_URL,
    };
    use crate::errors::ErrorKind;
    use crate::modes::PollingMode;
    use std::env;
    use std::time::Duration;

    #[test]
    fn url_validation() {
        assert_eq!(
            parse_url("http://localhost:4242/api").unwrap().as_str(),
            "http://localhost:4242/api/"
        );
        assert_eq!(
            parse_url("https://example.com/api/").unwrap().as_str(),
            "https://example.com/api/"
        );
        assert_eq!(parse_url("").unwrap_err().kind, ErrorKind::InvalidConfiguration);
        assert_eq!(parse_url("not a url").unwrap_err().kind, ErrorKind::InvalidConfiguration);
        assert_eq!(parse_url("ftp://example.com").unwrap_err().kind, ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn empty_app_name() {
        let result = ClientBuilder::new("http://localhost/api", " ").build_options();
        assert_eq!(result.err().unwrap().kind, ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn defaults() {
        let opts = ClientBuilder::new("http://localhost/api", "app")
            .hostname("host-1")
            .build_options()
            .unwrap();
        assert_eq!(opts.environment(), "default");
        assert!(opts.switch().is_on());
        assert!(opts.metrics_enabled());
        assert!(opts.instance_id().starts_with("host-1-"));
        assert_eq!(*opts.max_backoff(), Duration::from_secs(150));
        assert_eq!(*opts.polling_mode(), PollingMode::AutoPoll(Duration::from_secs(15)));
    }

    #[test]
    fn overrides() {
        let opts = ClientBuilder::new("http://localhost/api", "app")
            .instance_id("i-1")
            .enabled(false)
            .polling_mode(PollingMode::AutoPoll(Duration::from_secs(2)))
            .metrics(false)
            .build_options()
            .unwrap();
        assert_eq!(opts.instance_id(), "i-1");
        assert!(!opts.switch().is_on());
        assert!(!opts.metrics_enabled());
        assert_eq!(*opts.max_backoff(), Duration::from_secs(20));
    }

    #[test]
    fn zero_intervals() {
        let builder = || ClientBuilder::new("http://localhost/api", "app");
        let zero = Duration::ZERO;
        for result in [
            builder().polling_mode(PollingMode::AutoPoll(zero)).build_options(),
            builder().metrics_interval(zero).build_options(),
            builder().max_backoff(zero).build_options(),
        ] {
            assert_eq!(result.err().unwrap().kind, ErrorKind::InvalidConfiguration);
        }
        assert!(builder()
            .polling_mode(PollingMode::Manual)
            .metrics(false)
            .build_options()
            .is_ok());
    }

    #[test]
    fn huge_poll_interval() {
        let opts = ClientBuilder::new("http://localhost/api", "app")
            .polling_mode(PollingMode::AutoPoll(Duration::MAX))
            .build_options()
            .unwrap();
        assert_eq!(*opts.max_backoff(), Duration::MAX);
    }

    #[test]
    fn from_env() {
        env::set_var(ENV_URL, "http://localhost:4242/api");
        env::set_var(ENV_APP_NAME, "env-app");
        env::set_var(ENV_API_KEY, "default:development.secret");
        env::set_var(ENV_ENABLED, "false");
        env::set_var(ENV_POLL_INTERVAL, "5");
        env::set_var(ENV_METRICS_ENABLED, "off");
        env::set_var(ENV_ENVIRONMENT, "production");

        let opts = ClientBuilder::from_env().build_options().unwrap();
        assert_eq!(opts.url().as_str(), "http://localhost:4242/api/");
        assert_eq!(opts.app_name(), "env-app");
        assert_eq!(opts.api_key().as_deref(), Some("default:development.secret"));
        assert!(!opts.switch().is_on());
        assert!(!opts.metrics_enabled());
        assert_eq!(opts.environment(), "production");
        assert_eq!(*opts.polling_mode(), PollingMode::AutoPoll(Duration::from_secs(5)));

        env::set_var(ENV_POLL_INTERVAL, "soon");
        env::set_var(ENV_ENABLED, "maybe");
        let opts = ClientBuilder::from_env().build_options().unwrap();
        assert!(opts.switch().is_on());
        assert_eq!(*opts.polling_mode(), PollingMode::AutoPoll(Duration::from_secs(15)));
    }
}
