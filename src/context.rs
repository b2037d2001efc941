use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

pub const USER_ID: &str = "userId";
pub const SESSION_ID: &str = "sessionId";
pub const REMOTE_ADDRESS: &str = "remoteAddress";
pub const ENVIRONMENT: &str = "environment";
pub const APP_NAME: &str = "appName";
pub const CURRENT_TIME: &str = "currentTime";

/// Describes the per-request attributes used for evaluating strategies, constraints and variants.
///
/// A [`Context`] is built once per evaluation and never changes afterwards.
///
/// # Examples:
///
/// ```rust
/// use unleash::Context;
///
/// let context = Context::new()
///     .user_id("user-1")
///     .session_id("session-1")
///     .remote_address("10.0.0.12")
///     .property("plan", "premium");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    user_id: Option<String>,
    session_id: Option<String>,
    remote_address: Option<String>,
    environment: Option<String>,
    app_name: Option<String>,
    current_time: Option<DateTime<Utc>>,
    properties: HashMap<String, String>,
}

impl Context {
    /// Creates an empty [`Context`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user identifier.
    pub fn user_id(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_owned());
        self
    }

    /// Sets the session identifier.
    pub fn session_id(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_owned());
        self
    }

    /// Sets the IP address of the caller.
    pub fn remote_address(mut self, remote_address: &str) -> Self {
        self.remote_address = Some(remote_address.to_owned());
        self
    }

    /// Sets the environment name.
    pub fn environment(mut self, environment: &str) -> Self {
        self.environment = Some(environment.to_owned());
        self
    }

    /// Sets the application name.
    pub fn app_name(mut self, app_name: &str) -> Self {
        self.app_name = Some(app_name.to_owned());
        self
    }

    /// Pins the time used by date constraints. When not set, the time of the evaluation is used.
    pub fn current_time(mut self, current_time: DateTime<Utc>) -> Self {
        self.current_time = Some(current_time);
        self
    }

    /// Sets a custom property.
    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_owned(), value.to_owned());
        self
    }

    /// Returns the user identifier, if set.
    pub fn get_user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Returns the session identifier, if set.
    pub fn get_session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Returns the IP address of the caller, if set.
    pub fn get_remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    /// Returns the custom properties.
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Looks up a context field by its backend name.
    ///
    /// Well-known fields (`userId`, `sessionId`, `remoteAddress`, `environment`, `appName`,
    /// `currentTime`) are resolved first, anything else is read from the custom properties.
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            USER_ID => self.user_id.as_deref().map(Cow::Borrowed),
            SESSION_ID => self.session_id.as_deref().map(Cow::Borrowed),
            REMOTE_ADDRESS => self.remote_address.as_deref().map(Cow::Borrowed),
            ENVIRONMENT => self.environment.as_deref().map(Cow::Borrowed),
            APP_NAME => self.app_name.as_deref().map(Cow::Borrowed),
            CURRENT_TIME => Some(Cow::Owned(self.now().to_rfc3339())),
            _ => self.properties.get(name).map(|v| Cow::Borrowed(v.as_str())),
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.current_time.unwrap_or_else(Utc::now)
    }

    pub(crate) fn with_defaults(&self, environment: &str, app_name: &str) -> Self {
        let mut ctx = self.clone();
        if ctx.environment.is_none() {
            ctx.environment = Some(environment.to_owned());
        }
        if ctx.app_name.is_none() {
            ctx.app_name = Some(app_name.to_owned());
        }
        ctx
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{userId: {}, sessionId: {}, remoteAddress: {}, properties: {}}}",
            self.user_id.as_deref().unwrap_or("<none>"),
            self.session_id.as_deref().unwrap_or("<none>"),
            self.remote_address.as_deref().unwrap_or("<none>"),
            self.properties.len()
        )
    }
}

#[cfg(test)]
mod context_tests {
    use crate::context::{Context, USER_ID};
    use chrono::{TimeZone, Utc};

    #[test]
    fn field_lookup() {
        let ctx = Context::new()
            .user_id("u1")
            .session_id("s1")
            .remote_address("127.0.0.1")
            .property("plan", "pro");

        assert_eq!(ctx.field(USER_ID).unwrap(), "u1");
        assert_eq!(ctx.field("sessionId").unwrap(), "s1");
        assert_eq!(ctx.field("remoteAddress").unwrap(), "127.0.0.1");
        assert_eq!(ctx.field("plan").unwrap(), "pro");
        assert!(ctx.field("missing").is_none());
        assert!(ctx.field("environment").is_none());
    }

    #[test]
    fn current_time_is_pinned() {
        let time = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let ctx = Context::new().current_time(time);
        assert_eq!(ctx.field("currentTime").unwrap(), time.to_rfc3339());
    }

    #[test]
    fn defaults_do_not_override() {
        let ctx = Context::new().environment("prod").with_defaults("dev", "app");
        assert_eq!(ctx.field("environment").unwrap(), "prod");
        assert_eq!(ctx.field("appName").unwrap(), "app");
    }
}
