use std::error::Error;
use std::fmt::{Display, Formatter};

/// Error kind that represents failures reported by the [`crate::Client`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ErrorKind {
    /// No error occurred.
    NoError = 0,
    /// Initialization of the internal [`reqwest::Client`] failed.
    HttpClientInitFailure = 100,
    /// The client configuration is invalid (e.g. empty or malformed URL, empty app name).
    InvalidConfiguration = 101,
    /// The evaluation failed because no flag definitions were loaded yet.
    NotYetLoaded = 1000,
    /// The evaluated feature flag was not found in the loaded definitions.
    FlagMissing = 1001,
    /// A strategy of the evaluated flag has no known or registered implementation.
    UnsupportedStrategy = 1002,
    /// An unexpected fault occurred during strategy evaluation (e.g. malformed parameters).
    EvaluationError = 1003,
    /// An HTTP response indicating an invalid API key was received (401, 403 or 404).
    InvalidApiKey = 1100,
    /// Invalid HTTP response was received (unexpected HTTP status code).
    UnexpectedHttpResponse = 1101,
    /// The HTTP request timed out.
    HttpRequestTimeout = 1102,
    /// The backend could not be reached (most likely, due to a local network issue).
    BackendUnreachable = 1103,
    /// An invalid HTTP response was received (200 OK with an invalid content).
    MalformedResponse = 1105,
    /// Announcing the client instance to the backend failed.
    RegistrationFailure = 1200,
    /// Sending usage metrics to the backend failed.
    MetricsFailure = 1201,
    /// The cached definitions document could not be parsed.
    CacheReadFailure = 2201,
    /// The client is in offline mode, it cannot initiate HTTP requests.
    OfflineClient = 3200,
    /// The kill switch of the client is off.
    ClientDisabled = 3201,
    /// The first fetch didn't complete within the time given to [`crate::Client::wait_for_ready`].
    ClientInitTimedOut = 4200,
}

impl ErrorKind {
    pub(crate) fn as_u16(&self) -> u16 {
        *self as u16
    }
}

/// Error struct that holds the [`ErrorKind`] and message of the reported failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientError {
    /// Error kind that represents failures reported by the [`crate::Client`].
    pub kind: ErrorKind,
    /// The text representation of the failure.
    pub message: String,
}

impl ClientError {
    pub(crate) fn new(kind: ErrorKind, message: String) -> Self {
        Self { message, kind }
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message.as_str())
    }
}

impl Error for ClientError {}
