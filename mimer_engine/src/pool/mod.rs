use crate::engine::{ConnectOptions, Connection, MimerEnvironment};
use crate::error::{MimerError, Result};
use crate::handles::{lock_handles, SharedHandleManager};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

const POOL_DEEP_HEALTH_CHECK_ENV: &str = "MIMERPY_POOL_DEEP_HEALTH_CHECK";
const HEALTH_CHECK_SQL: &str = "select m from system.onerow";

pub(crate) fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_deep_health_check_from_env() -> Option<bool> {
    std::env::var(POOL_DEEP_HEALTH_CHECK_ENV)
        .ok()
        .and_then(|value| parse_bool_flag(&value))
}

fn resolve_deep_health_check(configured: bool, env_override: Option<bool>) -> bool {
    env_override.unwrap_or(configured)
}

/// Pool options as given by the caller. `0` means unbounded for both
/// `max_unused` and `max_connections`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    #[serde(alias = "initialconnections")]
    pub initial_connections: u32,
    #[serde(alias = "maxunused")]
    pub max_unused: u32,
    #[serde(alias = "maxconnections")]
    pub max_connections: u32,
    pub block: bool,
    pub deep_health_check: bool,
    #[serde(flatten)]
    pub connect: ConnectOptions,
}

impl PoolOptions {
    pub fn new(connect: ConnectOptions) -> Self {
        Self {
            connect,
            ..Self::default()
        }
    }

    pub fn with_initial_connections(mut self, n: u32) -> Self {
        self.initial_connections = n;
        self
    }

    pub fn with_max_unused(mut self, n: u32) -> Self {
        self.max_unused = n;
        self
    }

    pub fn with_max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn with_block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    pub fn with_deep_health_check(mut self, enabled: bool) -> Self {
        self.deep_health_check = enabled;
        self
    }
}

/// Normalised pool limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub initial_connections: u32,
    pub max_unused: u32,
    pub max_connections: u32,
    pub block: bool,
    pub deep_health_check: bool,
}

impl PoolConfig {
    pub fn from_options(options: &PoolOptions) -> Self {
        Self::normalize(options, read_deep_health_check_from_env())
    }

    fn normalize(options: &PoolOptions, env_override: Option<bool>) -> Self {
        let initial_connections = options.initial_connections;
        let max_unused = if options.max_unused > 0 && options.max_unused < initial_connections {
            initial_connections
        } else {
            options.max_unused
        };
        let max_connections = if options.max_connections > 0 && options.max_connections < max_unused {
            max_unused
        } else {
            options.max_connections
        };
        Self {
            initial_connections,
            max_unused,
            max_connections,
            block: options.block,
            deep_health_check: resolve_deep_health_check(options.deep_health_check, env_override),
        }
    }
}

/// Shallow check is "session open"; the deep check also runs a trivial query
/// and rolls back afterwards.
fn is_healthy(conn: &Connection, deep: bool) -> bool {
    if !conn.is_open() {
        return false;
    }
    if !deep {
        return true;
    }
    let probe = || -> Result<bool> {
        let mut cursor = conn.execute(HEALTH_CHECK_SQL, ())?;
        let row = cursor.fetchone()?;
        cursor.close()?;
        if !conn.is_autocommit() {
            conn.rollback()?;
        }
        Ok(!row.is_empty())
    };
    match probe() {
        Ok(healthy) => healthy,
        Err(e) => {
            log::debug!("Pooled connection failed health check: {}", e);
            false
        }
    }
}

fn close_quietly(conn: Connection, context: &str) {
    if let Err(e) = conn.close() {
        log::debug!("Closing pooled connection ({}) failed: {}", context, e);
    }
}

struct PoolState {
    idle: VecDeque<Connection>,
    in_use: HashMap<u64, SharedHandleManager>,
    next_id: u64,
    closed: bool,
}

impl PoolState {
    fn connections(&self) -> usize {
        self.idle.len() + self.in_use.len()
    }
}

struct PoolShared {
    env: MimerEnvironment,
    connect: ConnectOptions,
    config: PoolConfig,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl PoolShared {
    fn lock_state(&self) -> Result<MutexGuard<'_, PoolState>> {
        self.state
            .lock()
            .map_err(|_| MimerError::InternalError("Failed to lock pool state".to_string()))
    }

    fn open(&self) -> Result<Connection> {
        Connection::connect(&self.env, &self.connect)
    }

    fn accepts(&self, state: &PoolState) -> bool {
        let max_unused = self.config.max_unused as usize;
        let max_connections = self.config.max_connections as usize;
        // The returning connection is no longer in `in_use`.
        let connections = state.connections() + 1;
        max_unused == 0
            || (state.idle.len() < max_unused && (max_connections == 0 || connections <= max_connections))
    }

    fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        let mut state = self.lock_state()?;
        let max = self.config.max_connections as usize;
        if state.closed {
            return Err(MimerError::Pool("Pool is closed".to_string()));
        }
        if max > 0 {
            if self.config.block {
                while state.in_use.len() >= max {
                    state = self
                        .available
                        .wait(state)
                        .map_err(|_| MimerError::InternalError("Failed to lock pool state".to_string()))?;
                    if state.closed {
                        return Err(MimerError::Pool("Pool is closed".to_string()));
                    }
                }
            } else if state.in_use.len() >= max {
                return Err(MimerError::PoolExhausted {
                    max_connections: self.config.max_connections,
                });
            }
        }

        let conn = match state.idle.pop_front() {
            Some(conn) if !is_healthy(&conn, self.config.deep_health_check) => {
                log::debug!("Replacing unhealthy pooled connection");
                close_quietly(conn, "unhealthy");
                self.open()?
            }
            Some(conn) => {
                if conn.in_transaction() {
                    conn.rollback()?;
                }
                conn
            }
            None => self.open()?,
        };

        let id = state.next_id;
        state.next_id += 1;
        state.in_use.insert(id, conn.handles());
        log::trace!(
            "Pool checkout {}: {} idle, {} in use",
            id,
            state.idle.len(),
            state.in_use.len()
        );
        Ok(PooledConnection {
            conn: Some(conn),
            id,
            pool: Arc::clone(self),
        })
    }

    fn store_or_close(&self, id: u64, conn: Connection) -> Result<()> {
        let mut state = self.lock_state()?;
        let registered = state.in_use.remove(&id).is_some();
        let mut result = Ok(());

        if registered
            && !state.closed
            && self.accepts(&state)
            && is_healthy(&conn, self.config.deep_health_check)
        {
            match conn.reset().and_then(|_| conn.autocommit(self.connect.autocommit)) {
                Ok(()) => state.idle.push_back(conn),
                Err(e) => {
                    close_quietly(conn, "reset failed");
                    result = Err(e);
                }
            }
        } else {
            result = conn.close();
        }

        log::trace!(
            "Pool return {}: {} idle, {} in use",
            id,
            state.idle.len(),
            state.in_use.len()
        );
        self.available.notify_one();
        result
    }

    fn close(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        state.closed = true;
        while let Some(conn) = state.idle.pop_front() {
            close_quietly(conn, "pool close");
        }
        for (id, handles) in state.in_use.drain() {
            if let Err(e) = lock_handles(&handles).and_then(|mut h| h.shutdown()) {
                log::debug!("Closing checked-out connection {} failed: {}", id, e);
            }
        }
        self.available.notify_all();
        Ok(())
    }
}

/// Client-side pool of [`Connection`]s sharing one set of credentials.
///
/// Connections are handed out as [`PooledConnection`]s; closing or dropping
/// one returns it to the pool, which either caches it (after rolling back and
/// restoring the configured autocommit mode) or closes it for good.
pub struct MimerPool {
    shared: Arc<PoolShared>,
}

impl MimerPool {
    pub fn new(env: MimerEnvironment, options: PoolOptions) -> Result<Self> {
        let config = PoolConfig::from_options(&options);
        log::debug!("Creating Mimer pool: {:?}", config);
        let pool = Self {
            shared: Arc::new(PoolShared {
                env,
                connect: options.connect,
                config,
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    in_use: HashMap::new(),
                    next_id: 1,
                    closed: false,
                }),
                available: Condvar::new(),
            }),
        };

        let initial = (0..pool.shared.config.initial_connections)
            .map(|_| pool.get_connection())
            .collect::<Result<Vec<_>>>()?;
        for conn in initial.into_iter().rev() {
            pool.store_or_close(conn)?;
        }
        Ok(pool)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Takes an idle connection or opens a new one. With a connection limit
    /// reached this waits when `block` is set and fails with
    /// [`MimerError::PoolExhausted`] otherwise.
    pub fn get_connection(&self) -> Result<PooledConnection> {
        self.shared.acquire()
    }

    /// Returns `conn` to the pool; same as `conn.close()`.
    pub fn store_or_close(&self, conn: PooledConnection) -> Result<()> {
        conn.close()
    }

    /// Number of idle connections.
    pub fn cached_connections(&self) -> usize {
        self.shared.lock_state().map(|s| s.idle.len()).unwrap_or(0)
    }

    /// Number of checked-out connections.
    pub fn used_connections(&self) -> usize {
        self.shared.lock_state().map(|s| s.in_use.len()).unwrap_or(0)
    }

    pub fn connections(&self) -> usize {
        self.shared.lock_state().map(|s| s.connections()).unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock_state().map(|s| s.closed).unwrap_or(true)
    }

    /// Closes every idle and every checked-out connection. Failures of single
    /// connections are logged and do not stop the rest.
    pub fn close(&self) -> Result<()> {
        self.shared.close()
    }
}

impl Drop for MimerPool {
    fn drop(&mut self) {
        if let Err(e) = self.shared.close() {
            log::warn!("Closing pool on drop failed: {}", e);
        }
    }
}

/// A [`Connection`] checked out of a [`MimerPool`].
pub struct PooledConnection {
    conn: Option<Connection>,
    id: u64,
    pool: Arc<PoolShared>,
}

impl PooledConnection {
    /// Hands the connection back to its pool, which decides whether the
    /// session stays open.
    pub fn close(mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => self.pool.store_or_close(self.id, conn),
            None => Ok(()),
        }
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `close` and `drop` take the connection out, both consume self.
        self.conn.as_ref().unwrap_or_else(|| unreachable!("pooled connection already returned"))
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap_or_else(|| unreachable!("pooled connection already returned"))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.pool.store_or_close(self.id, conn) {
                log::warn!("Returning pooled connection on drop failed: {}", e);
            }
        }
    }
}

/// [`r2d2::ManageConnection`] over [`Connection`], for callers that prefer an
/// `r2d2::Pool`. `is_valid` runs the same deep health check as [`MimerPool`].
#[derive(Clone)]
pub struct MimerConnectionManager {
    env: MimerEnvironment,
    options: ConnectOptions,
}

impl MimerConnectionManager {
    pub fn new(env: MimerEnvironment, options: ConnectOptions) -> Self {
        Self { env, options }
    }
}

impl r2d2::ManageConnection for MimerConnectionManager {
    type Connection = Connection;
    type Error = MimerError;

    fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        Connection::connect(&self.env, &self.options)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        if is_healthy(conn, true) {
            Ok(())
        } else {
            Err(MimerError::Pool("Connection failed health check".to_string()))
        }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        !conn.is_open()
    }
}
