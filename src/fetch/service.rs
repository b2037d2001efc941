use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use rand::Rng;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::builder::Options;
use crate::constants::CACHE_FORMAT_VERSION;
use crate::errors::{ClientError, ErrorKind};
use crate::fetch::fetcher::{FetchResponse, Fetcher};
use crate::fetch::reporter::Reporter;
use crate::metrics::MetricsRegistry;
use crate::model::feature::{snapshot_from_cached_json, RepositorySnapshot};
use crate::modes::PollingMode;
use crate::repository::FlagRepository;
use crate::utils::sha1;

struct ServiceState {
    fetcher: Fetcher,
    repository: Arc<FlagRepository>,
    cache_key: String,
    offline: AtomicBool,
    initialized: AtomicBool,
    init_notify: Notify,
    fetch_lock: Mutex<()>,
}

impl ServiceState {
    fn initialized(&self) {
        if !self.initialized.swap(true, Ordering::SeqCst) {
            self.init_notify.notify_waiters();
        }
    }
}

/// Keeps the [`FlagRepository`] up to date with the backend.
pub struct FetchService {
    state: Arc<ServiceState>,
    options: Arc<Options>,
    cancellation_token: CancellationToken,
    close: Once,
}

impl FetchService {
    pub fn new(opts: &Arc<Options>, repository: Arc<FlagRepository>, fetcher: Fetcher) -> Self {
        let service = Self {
            state: Arc::new(ServiceState {
                cache_key: cache_key(opts.app_name(), opts.url().as_str()),
                fetcher,
                repository,
                offline: AtomicBool::new(opts.offline()),
                initialized: AtomicBool::new(false),
                init_notify: Notify::new(),
                fetch_lock: Mutex::new(()),
            }),
            options: Arc::clone(opts),
            cancellation_token: CancellationToken::new(),
            close: Once::new(),
        };

        if let Some(snapshot) = initial_snapshot(&service.state, opts) {
            service.state.repository.update(snapshot);
        }

        match opts.polling_mode() {
            PollingMode::AutoPoll(interval) => service.start_poll(*interval),
            PollingMode::Manual => service.state.initialized(),
        }

        service
    }

    /// Fetches the definitions once, outside of the polling schedule.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let result = fetch_once(&self.state, &self.options).await;
        self.state.initialized();
        result.map_err(|(err, _)| err)
    }

    /// Resolves after the first fetch attempt completed.
    pub async fn wait_for_init(&self) {
        let notified = self.state.init_notify.notified();
        if self.state.initialized.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }

    pub fn set_mode(&self, offline: bool) {
        self.state.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.state.offline.load(Ordering::SeqCst)
    }

    /// Periodically posts the collected usage counters until the service is closed.
    pub fn start_metrics(
        &self,
        reporter: Arc<Reporter>,
        metrics: Arc<MetricsRegistry>,
        interval: Duration,
    ) {
        let state = Arc::clone(&self.state);
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {},
                    _ = token.cancelled() => break
                }
                if state.offline.load(Ordering::SeqCst) {
                    continue;
                }
                let bucket = metrics.take_bucket();
                if bucket.is_empty() {
                    continue;
                }
                tokio::select! {
                    _ = reporter.send_metrics(&bucket) => {},
                    _ = token.cancelled() => break
                }
            }
        });
    }

    pub fn close(&self) {
        self.close.call_once(|| self.cancellation_token.cancel());
    }

    fn start_poll(&self, interval: Duration) {
        let state = Arc::clone(&self.state);
        let opts = Arc::clone(&self.options);
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            let mut failures: u32 = 0;
            loop {
                let delay = tokio::select! {
                    result = fetch_once(&state, &opts) => {
                        state.initialized();
                        match result {
                            Ok(()) => {
                                failures = 0;
                                interval
                            }
                            Err((err, _)) if err.kind == ErrorKind::OfflineClient => interval,
                            Err((_, transient)) => {
                                failures = failures.saturating_add(1);
                                let max = *opts.max_backoff();
                                if transient {
                                    backoff_delay(interval, max, failures)
                                } else {
                                    backoff_delay(max, max, 0)
                                }
                            }
                        }
                    },
                    _ = token.cancelled() => break
                };
                if failures > 0 {
                    debug!("Fetch failed {failures} time(s) in a row, next attempt in {}ms", delay.as_millis());
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {},
                    _ = token.cancelled() => break
                }
            }
            debug!("Polling stopped");
        });
    }
}

impl Drop for FetchService {
    fn drop(&mut self) {
        self.close();
    }
}

/// A failed fetch and whether it is worth retrying before `max_backoff` elapses.
type FetchFailure = (ClientError, bool);

async fn fetch_once(state: &Arc<ServiceState>, options: &Arc<Options>) -> Result<(), FetchFailure> {
    if state.offline.load(Ordering::SeqCst) {
        let err = ClientError::new(
            ErrorKind::OfflineClient,
            "Client is in offline mode, it cannot initiate HTTP calls.".to_owned(),
        );
        return Err((err, true));
    }
    let _guard = state.fetch_lock.lock().await;
    let current = state.repository.get_snapshot().ok();
    let etag = current.as_ref().map(|s| s.etag.as_str()).unwrap_or("");
    let response = state.fetcher.fetch(etag).await;

    match response {
        FetchResponse::Fetched(snapshot) => {
            write_cache(state, options, &snapshot);
            state.repository.update(snapshot);
            Ok(())
        }
        FetchResponse::NotModified => {
            if let Some(current) = current {
                let refreshed = current.with_time(Utc::now());
                write_cache(state, options, &refreshed);
                state.repository.update(refreshed);
            }
            Ok(())
        }
        FetchResponse::Failed(err, transient) => Err((err, transient)),
    }
}

fn write_cache(state: &ServiceState, options: &Options, snapshot: &RepositorySnapshot) {
    if snapshot.raw_json.is_empty() {
        return;
    }
    options
        .cache()
        .write(&state.cache_key, snapshot.serialize().as_str());
}

fn initial_snapshot(state: &ServiceState, options: &Options) -> Option<RepositorySnapshot> {
    if let Some(cached) = options.cache().read(&state.cache_key) {
        if !cached.is_empty() {
            match snapshot_from_cached_json(cached.as_str()) {
                Ok(snapshot) => {
                    debug!("Flag definitions loaded from cache");
                    return Some(snapshot);
                }
                Err(err) => {
                    warn!(event_id = ErrorKind::CacheReadFailure.as_u16(); "Error occurred while reading the cache. {err}");
                }
            }
        }
    }
    options.bootstrap().map(|source| {
        debug!("Flag definitions loaded from bootstrap source");
        source.snapshot()
    })
}

fn cache_key(app_name: &str, url: &str) -> String {
    sha1(format!("{app_name}_{url}_features_{CACHE_FORMAT_VERSION}").as_str())
}

/// Delay before the next fetch after `failures` consecutive failures.
pub(crate) fn backoff_delay(interval: Duration, max: Duration, failures: u32) -> Duration {
    let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
    let delay = interval.checked_mul(factor).unwrap_or(max).min(max);
    let max_jitter = u64::try_from(delay.as_millis() / 10).unwrap_or(u64::MAX);
    let jitter = rand::rng().random_range(0..=max_jitter);
    delay.saturating_add(Duration::from_millis(jitter))
}
