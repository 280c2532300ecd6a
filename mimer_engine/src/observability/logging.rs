use log::Level;

/// Environment variable that turns on tracing of every native call.
pub const API_TRACE_ENV: &str = "MIMER_API_TRACE";

fn read_trace_from_env() -> Option<bool> {
    std::env::var(API_TRACE_ENV)
        .ok()
        .and_then(|value| crate::pool::parse_bool_flag(&value))
}

fn resolve_trace(config_override: bool, env_override: Option<bool>) -> bool {
    config_override || env_override.unwrap_or(false)
}

#[derive(Debug, Clone, Copy)]
pub struct StructuredLogger {
    enabled: bool,
}

impl StructuredLogger {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Tracing on when `configured` is set or `MIMER_API_TRACE` is a true flag.
    pub fn from_env(configured: bool) -> Self {
        Self::new(resolve_trace(configured, read_trace_from_env()))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Logs one native call and its status. `args` is only rendered when
    /// tracing is on.
    pub fn log_call<F>(&self, name: &str, args: F, rc: i32)
    where
        F: FnOnce() -> String,
    {
        if !self.enabled {
            return;
        }

        log::trace!("Call {}({})", name, args());
        let level = if rc < 0 { Level::Debug } else { Level::Trace };
        log::log!(level, "Ret {}: {}", name, rc);
    }

    pub fn log_session(&self, level: Level, dsn: &str, user: &str, action: &str) {
        if !self.enabled {
            return;
        }

        log::log!(level, "Session {}: dsn={}, user={}", action, dsn, user);
    }

    pub fn log_statement(&self, level: Level, sql: &str, rc: i32) {
        if !self.enabled {
            return;
        }

        log::log!(level, "Statement: {}, rc={}", sql, rc);
    }
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new(false)
    }
}
