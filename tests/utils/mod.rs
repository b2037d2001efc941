use log::kv::Key;
use log::{set_max_level, Level, Log, Metadata, Record};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use unleash::{Client, ClientBuilder, ConfigCache, FileBootstrap, PollingMode};

pub const FEATURES_FILE: &str = "tests/data/features.json";
pub const MOCK_PATH: &str = "/api/client/features";

/// Client evaluating the definitions of `file` without any HTTP traffic.
pub fn offline_client(file: &str) -> ClientBuilder {
    Client::builder("http://localhost:4242/api", "test-app")
        .polling_mode(PollingMode::Manual)
        .offline(true)
        .metrics(false)
        .bootstrap(Box::new(FileBootstrap::new(file).unwrap()))
}

pub fn construct_bool_json_payload(name: &str, enabled: bool) -> String {
    format!(r#"{{"version": 1, "features": [{{"name": "{name}", "enabled": {enabled}, "strategies": [{{"name": "default"}}]}}]}}"#)
}

#[derive(Default, Clone)]
pub struct InMemoryCache {
    pub values: Arc<Mutex<HashMap<String, String>>>,
}

impl ConfigCache for InMemoryCache {
    fn read(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) {
        self.values.lock().unwrap().insert(key.to_owned(), value.to_owned());
    }
}

pub struct PrintLog {}

impl Log for PrintLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.target().contains("unleash")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "[ERROR]",
            Level::Warn => "[WARN]",
            Level::Info => "[INFO]",
            Level::Debug => "[DEBUG]",
            Level::Trace => "[TRACE]",
        };
        println!("{level} {}", record.args());
    }

    fn flush(&self) {}
}

pub struct RecordingLogger {}

impl RecordingLogger {
    thread_local!(pub static LOGS: RefCell<String> = RefCell::new(String::default()));
}

impl Log for RecordingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.target().contains("unleash")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARNING",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let event_id = record
            .key_values()
            .get(Key::from("event_id"))
            .and_then(|v| v.to_i64())
            .unwrap_or_default();
        Self::LOGS.with_borrow_mut(|l| l.push_str(format!("{level} [{event_id}] {}\n", record.args()).as_str()));
    }

    fn flush(&self) {}
}

pub fn log_record_init() {
    set_max_level(log::LevelFilter::Info);
    _ = log::set_logger(&RecordingLogger {});
}
