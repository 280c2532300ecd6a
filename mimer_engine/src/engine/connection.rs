use super::cursor::Cursor;
use super::environment::MimerEnvironment;
use super::options::{ConnectOptions, ErrorSource, HandlerAction};
use super::transaction::TransactionEnd;
use crate::error::{codes, MimerError, Result};
use crate::handles::{lock_handles, HandleManager, SharedHandleManager};
use crate::protocol::Params;
use log::Level;
use std::sync::{Arc, Mutex};

/// One session with a Mimer SQL database.
///
/// Autocommit is off unless requested: the first statement after a commit or
/// rollback starts a new transaction implicitly. Closing the connection
/// closes every cursor created from it and rolls back open work.
pub struct Connection {
    handles: SharedHandleManager,
}

impl Connection {
    pub fn connect(env: &MimerEnvironment, options: &ConnectOptions) -> Result<Self> {
        let native = env.native();
        native
            .logger()
            .log_session(Level::Debug, &options.dsn, &options.user, "connect");

        let session = match native.begin_session(&options.dsn, &options.user, options.password()) {
            Ok(session) => session,
            Err(rc) => {
                let err = native.map_error(rc, None);
                log::debug!("Login to {:?} as {:?} failed: {}", options.dsn, options.user, err);
                if let Some(handler) = &options.error_handler {
                    // Nothing to hand back without a session, so the error is
                    // returned whatever the handler decides.
                    handler(ErrorSource::Connection, &err);
                }
                return Err(err);
            }
        };

        let manager = HandleManager::new(native, session, options.autocommit, options.error_handler.clone());
        Ok(Self {
            handles: Arc::new(Mutex::new(manager)),
        })
    }

    pub fn handles(&self) -> SharedHandleManager {
        self.handles.clone()
    }

    fn finish<T>(&self, result: Result<T>, neutral: impl FnOnce() -> T) -> Result<T> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let handler = match lock_handles(&self.handles) {
            Ok(mut h) => {
                h.messages_mut().push(err.clone());
                h.error_handler()
            }
            Err(_) => None,
        };
        match handler
            .map(|handler| handler(ErrorSource::Connection, &err))
            .unwrap_or_default()
        {
            HandlerAction::Raise => Err(err),
            HandlerAction::Ignore => Ok(neutral()),
        }
    }

    fn open_guard(&self) -> Result<std::sync::MutexGuard<'_, HandleManager>> {
        let mut h = lock_handles(&self.handles)?;
        h.session()?;
        h.messages_mut().clear();
        Ok(h)
    }

    pub fn is_open(&self) -> bool {
        lock_handles(&self.handles).map(|h| h.is_open()).unwrap_or(false)
    }

    pub fn in_transaction(&self) -> bool {
        lock_handles(&self.handles)
            .map(|h| h.in_transaction())
            .unwrap_or(false)
    }

    pub fn is_autocommit(&self) -> bool {
        lock_handles(&self.handles).map(|h| h.autocommit()).unwrap_or(false)
    }

    pub fn messages(&self) -> Vec<MimerError> {
        lock_handles(&self.handles)
            .map(|h| h.messages().to_vec())
            .unwrap_or_default()
    }

    /// Number of cursors still registered with this connection.
    pub fn open_cursors(&self) -> usize {
        lock_handles(&self.handles).map(|h| h.cursor_count()).unwrap_or(0)
    }

    fn new_cursor(&self, scrollable: bool) -> Result<Cursor> {
        drop(self.open_guard()?);
        Cursor::open(self.handles.clone(), scrollable)
    }

    /// A forward-only cursor.
    pub fn cursor(&self) -> Result<Cursor> {
        self.new_cursor(false)
    }

    /// A cursor that reads result sets into memory and supports `scroll`.
    pub fn scroll_cursor(&self) -> Result<Cursor> {
        self.new_cursor(true)
    }

    /// Creates a forward-only cursor and executes `sql` on it.
    pub fn execute<P: Into<Params>>(&self, sql: &str, params: P) -> Result<Cursor> {
        let mut cursor = self.cursor()?;
        cursor.execute(sql, params)?;
        Ok(cursor)
    }

    /// Creates a forward-only cursor and runs `sql` over `param_sets`.
    pub fn executemany<I, P>(&self, sql: &str, param_sets: I) -> Result<Cursor>
    where
        I: IntoIterator<Item = P>,
        P: Into<Params>,
    {
        let mut cursor = self.cursor()?;
        cursor.executemany(sql, param_sets)?;
        Ok(cursor)
    }

    fn end_transaction(&self, end: TransactionEnd) -> Result<()> {
        let result = self
            .open_guard()
            .and_then(|mut h| h.end_transaction(end.is_rollback()));
        self.finish(result, || ())
    }

    pub fn commit(&self) -> Result<()> {
        self.end_transaction(TransactionEnd::Commit)
    }

    pub fn rollback(&self) -> Result<()> {
        self.end_transaction(TransactionEnd::Rollback)
    }

    /// Switches autocommit. Turning it on rolls back an open transaction.
    pub fn autocommit(&self, enabled: bool) -> Result<()> {
        let result = self.open_guard().and_then(|mut h| {
            h.set_autocommit(enabled);
            if enabled && h.in_transaction() {
                h.end_transaction(true)?;
            }
            Ok(())
        });
        self.finish(result, || ())
    }

    /// Closes every cursor, rolls back open work and ends the session. Safe
    /// to repeat.
    pub fn close(&self) -> Result<()> {
        let result = lock_handles(&self.handles).and_then(|mut h| h.shutdown());
        self.finish(result, || ())
    }

    /// Closes the cursors created from this connection and rolls back open
    /// work, leaving the session open.
    pub fn reset(&self) -> Result<()> {
        let result = self.open_guard().and_then(|mut h| {
            h.close_all_cursors()?;
            if h.in_transaction() {
                h.end_transaction(true)?;
            }
            Ok(())
        });
        self.finish(result, || ())
    }

    /// Runs `f` and commits when it succeeds, rolls back when it fails.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback() {
                    log::warn!("Rollback after failed transaction body failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    fn tpc_unsupported<T>(&self, neutral: impl FnOnce() -> T) -> Result<T> {
        self.finish(Err(MimerError::local(codes::TPC_UNSUPPORTED)), neutral)
    }

    pub fn xid(&self, _format_id: i32, _global_transaction_id: &str, _branch_qualifier: &str) -> Result<()> {
        self.tpc_unsupported(|| ())
    }

    pub fn tpc_begin(&self, _xid: &str) -> Result<()> {
        self.tpc_unsupported(|| ())
    }

    pub fn tpc_prepare(&self) -> Result<()> {
        self.tpc_unsupported(|| ())
    }

    pub fn tpc_commit(&self, _xid: Option<&str>) -> Result<()> {
        self.tpc_unsupported(|| ())
    }

    pub fn tpc_rollback(&self, _xid: Option<&str>) -> Result<()> {
        self.tpc_unsupported(|| ())
    }

    pub fn tpc_recover(&self) -> Result<Vec<String>> {
        self.tpc_unsupported(Vec::new)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if !self.is_open() {
            return;
        }
        if let Err(e) = lock_handles(&self.handles).and_then(|mut h| h.shutdown()) {
            log::warn!("Closing connection on drop failed: {}", e);
        }
    }
}
