use std::time::Duration;

/// Describes how the client keeps its flag definitions up to date.
#[derive(Debug, Clone, PartialEq)]
pub enum PollingMode {
    /// Definitions are fetched in the background with the given interval.
    AutoPoll(Duration),
    /// Definitions are fetched only when [`crate::Client::refresh`] is called.
    Manual,
}
