pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SDK_NAME: &str = "unleash-rust";

pub const FEATURES_PATH: &str = "client/features";
pub const REGISTER_PATH: &str = "client/register";
pub const METRICS_PATH: &str = "client/metrics";

pub const APP_NAME_HEADER: &str = "unleash-appname";
pub const INSTANCE_ID_HEADER: &str = "unleash-instanceid";
pub const SDK_HEADER: &str = "unleash-sdk";

pub const CACHE_FORMAT_VERSION: &str = "v1";
