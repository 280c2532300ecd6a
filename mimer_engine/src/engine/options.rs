use crate::error::MimerError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Which public object reported a failure to the error handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    Connection,
    Cursor,
}

/// What the error handler wants done with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerAction {
    /// Return the error to the caller.
    #[default]
    Raise,
    /// Keep it in `messages` only and return a neutral value.
    Ignore,
}

pub type ErrorHandler = Arc<dyn Fn(ErrorSource, &MimerError) -> HandlerAction + Send + Sync>;

fn deserialize_password<'de, D>(deserializer: D) -> Result<Zeroizing<String>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Zeroizing::new)
}

/// Login and session options for [`crate::Connection::connect`].
///
/// An empty `dsn` lets the library resolve `MIMER_DATABASE` or the default
/// database; an empty `user` logs in with the operating system identity.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    pub dsn: String,
    pub user: String,
    #[serde(skip_serializing, deserialize_with = "deserialize_password")]
    pub password: Zeroizing<String>,
    pub autocommit: bool,
    #[serde(skip)]
    pub error_handler: Option<ErrorHandler>,
}

impl ConnectOptions {
    pub fn new(dsn: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            user: user.into(),
            password: Zeroizing::new(password.into()),
            autocommit: false,
            error_handler: None,
        }
    }

    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ErrorSource, &MimerError) -> HandlerAction + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("dsn", &self.dsn)
            .field("user", &self.user)
            .field("password", &"****")
            .field("autocommit", &self.autocommit)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

/// How to find and trace the native library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Explicit path of the shared library; `MIMERAPI_PATH` and the platform
    /// default are tried when unset.
    pub library_path: Option<PathBuf>,
    pub trace_api: bool,
}

impl EnvironmentConfig {
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn with_trace_api(mut self, enabled: bool) -> Self {
        self.trace_api = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options_builder() {
        let options = ConnectOptions::new("testdb", "mimerpy", "secret").with_autocommit(true);
        assert_eq!(options.dsn, "testdb");
        assert_eq!(options.user, "mimerpy");
        assert_eq!(options.password(), "secret");
        assert!(options.autocommit);
        assert!(options.error_handler.is_none());
    }

    #[test]
    fn test_password_is_not_serialized_or_printed() {
        let options = ConnectOptions::new("testdb", "mimerpy", "secret");
        let json = serde_json::to_string(&options).expect("serialize");
        assert!(!json.contains("secret"));
        assert!(!format!("{:?}", options).contains("secret"));
    }

    #[test]
    fn test_connect_options_from_json() {
        let options: ConnectOptions =
            serde_json::from_str(r#"{"dsn":"db","user":"u","password":"pw"}"#).expect("parse");
        assert_eq!(options.password(), "pw");
        assert!(!options.autocommit);
    }

    #[test]
    fn test_error_handler_is_attached() {
        let options = ConnectOptions::default().with_error_handler(|_, _| HandlerAction::Ignore);
        let handler = options.error_handler.expect("handler");
        let err = MimerError::InternalError("x".to_string());
        assert_eq!(handler(ErrorSource::Cursor, &err), HandlerAction::Ignore);
    }

    #[test]
    fn test_environment_config_defaults() {
        let config: EnvironmentConfig = serde_json::from_str("{}").expect("parse");
        assert!(config.library_path.is_none());
        assert!(!config.trace_api);
        let config = config.with_library_path("/opt/lib.so").with_trace_api(true);
        assert_eq!(config.library_path, Some(PathBuf::from("/opt/lib.so")));
        assert!(config.trace_api);
    }
}
