#![allow(dead_code)]

use unleash::{Client, Context, PollingMode, Variant};

use crate::utils::{log_record_init, offline_client, RecordingLogger, FEATURES_FILE};

mod utils;

#[test]
fn missing_flag() {
    log_record_init();
    let client = offline_client(FEATURES_FILE).build().unwrap();
    _ = RecordingLogger::LOGS.take();

    _ = client.is_enabled("ghost", &Context::new(), true);
    let logs = RecordingLogger::LOGS.take();
    assert_eq!(logs, "WARNING [1001] Flag 'ghost' was not found in the flag definitions. Returning the default value 'true'.\n");

    _ = client.get_variant("ghost", &Context::new(), Variant::disabled());
    let logs = RecordingLogger::LOGS.take();
    assert_eq!(logs, "WARNING [1001] Flag 'ghost' was not found in the flag definitions. Returning the fallback variant 'disabled'.\n");
}

#[test]
fn not_loaded() {
    log_record_init();
    let client = Client::builder("http://localhost:4242/api", "test-app").polling_mode(PollingMode::Manual).build().unwrap();
    _ = RecordingLogger::LOGS.take();

    _ = client.is_enabled("beta-ui", &Context::new(), false);
    let logs = RecordingLogger::LOGS.take();
    assert_eq!(logs, "WARNING [1000] Flag definitions are not loaded yet when evaluating 'beta-ui'. Returning the default value 'false'.\n");
}

#[test]
fn evaluation_error() {
    log_record_init();
    let client = offline_client(FEATURES_FILE).build().unwrap();
    _ = RecordingLogger::LOGS.take();

    _ = client.is_enabled("broken-rollout", &Context::new().user_id("1"), true);
    let logs = RecordingLogger::LOGS.take();
    assert_eq!(logs, "ERROR [1003] Failed to evaluate flag 'broken-rollout' (strategy 'flexibleRollout' is invalid: rollout 'abc' is not a percentage). Returning the default value 'true'.\n");
}

#[test]
fn unsupported_strategy() {
    log_record_init();
    let client = offline_client(FEATURES_FILE).build().unwrap();
    _ = RecordingLogger::LOGS.take();

    _ = client.is_enabled("unsupported-feature", &Context::new(), true);
    let logs = RecordingLogger::LOGS.take();
    assert_eq!(logs, "WARNING [1002] Strategy 'mystery' of flag 'unsupported-feature' is not supported, treating it as not activated.\n");
}

#[test]
fn kill_switch_is_silent() {
    log_record_init();
    let client = offline_client(FEATURES_FILE).enabled(false).build().unwrap();
    _ = RecordingLogger::LOGS.take();

    _ = client.is_enabled("ghost", &Context::new(), true);
    _ = client.is_enabled("broken-rollout", &Context::new(), true);
    _ = client.get_features(false, &Context::new());
    assert!(RecordingLogger::LOGS.take().is_empty());
}
