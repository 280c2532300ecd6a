use crate::engine::options::ErrorHandler;
use crate::error::{codes, MimerError, Result};
use crate::native::{BindArena, NativeHandle, NativeLayer, SessionHandle, StatementHandle};
use crate::protocol::{ColumnDescription, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Where the rows of a cursor come from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RowSource {
    /// Rows are fetched from the open native cursor one at a time.
    #[default]
    Streaming,
    /// The whole result set was read on execute.
    Materialized { rows: Vec<Row>, position: usize },
}

/// Native and bookkeeping state of one cursor, owned by its connection so
/// that closing the connection can close every cursor deterministically.
#[derive(Debug)]
pub struct CursorState {
    pub scrollable: bool,
    pub statement: Option<StatementHandle>,
    pub last_sql: Option<String>,
    /// The native cursor of `statement` is open.
    pub result_open: bool,
    pub description: Option<Vec<ColumnDescription>>,
    pub rowcount: i64,
    pub messages: Vec<MimerError>,
    pub rows: RowSource,
}

impl CursorState {
    fn new(scrollable: bool) -> Self {
        Self {
            scrollable,
            statement: None,
            last_sql: None,
            result_open: false,
            description: None,
            rowcount: -1,
            messages: Vec::new(),
            rows: RowSource::Streaming,
        }
    }

    pub fn has_result_set(&self) -> bool {
        self.result_open || matches!(self.rows, RowSource::Materialized { .. })
    }

    pub fn column_count(&self) -> usize {
        self.description.as_ref().map(Vec::len).unwrap_or(0)
    }
}

/// Per-connection registry of native handles: the session, every cursor
/// created from it, and the bind buffers of their statements.
pub struct HandleManager {
    native: Arc<NativeLayer>,
    session: Option<SessionHandle>,
    autocommit: bool,
    in_transaction: bool,
    messages: Vec<MimerError>,
    cursors: HashMap<u32, CursorState>,
    next_cursor_id: u32,
    arena: BindArena,
    error_handler: Option<ErrorHandler>,
}

impl HandleManager {
    pub fn new(
        native: Arc<NativeLayer>,
        session: SessionHandle,
        autocommit: bool,
        error_handler: Option<ErrorHandler>,
    ) -> Self {
        Self {
            native,
            session: Some(session),
            autocommit,
            in_transaction: false,
            messages: Vec::new(),
            cursors: HashMap::new(),
            next_cursor_id: 1,
            arena: BindArena::new(),
            error_handler,
        }
    }

    pub fn native(&self) -> Arc<NativeLayer> {
        self.native.clone()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Result<SessionHandle> {
        self.session
            .ok_or_else(|| MimerError::local(codes::CONNECTION_NOT_OPEN))
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn set_autocommit(&mut self, autocommit: bool) {
        self.autocommit = autocommit;
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn messages(&self) -> &[MimerError] {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut Vec<MimerError> {
        &mut self.messages
    }

    pub fn error_handler(&self) -> Option<ErrorHandler> {
        self.error_handler.clone()
    }

    /// Files `error` with cursor `id`, or with the connection once the cursor
    /// is gone.
    pub fn record_cursor_error(&mut self, id: u32, error: MimerError) {
        match self.cursors.get_mut(&id) {
            Some(state) => state.messages.push(error),
            None => self.messages.push(error),
        }
    }

    pub fn arena(&self) -> &BindArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut BindArena {
        &mut self.arena
    }

    pub fn map_session_error(&self, code: i32) -> MimerError {
        self.native
            .map_error(code, self.session.map(NativeHandle::Session))
    }

    pub fn register_cursor(&mut self, scrollable: bool) -> Result<u32> {
        self.session()?;
        let id = self.next_cursor_id;
        self.next_cursor_id += 1;
        self.cursors.insert(id, CursorState::new(scrollable));
        Ok(id)
    }

    /// State of an open cursor. A closed connection reports "connection not
    /// open", a closed cursor on an open connection "cursor not open".
    pub fn cursor(&self, id: u32) -> Result<&CursorState> {
        self.session()?;
        self.cursors
            .get(&id)
            .ok_or_else(|| MimerError::local(codes::CURSOR_NOT_OPEN))
    }

    pub fn cursor_mut(&mut self, id: u32) -> Result<&mut CursorState> {
        self.session()?;
        self.cursors
            .get_mut(&id)
            .ok_or_else(|| MimerError::local(codes::CURSOR_NOT_OPEN))
    }

    pub fn has_cursor(&self, id: u32) -> bool {
        self.cursors.contains_key(&id)
    }

    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    /// Starts the implicit transaction when autocommit is off and none is open.
    pub fn ensure_transaction(&mut self) -> Result<()> {
        let session = self.session()?;
        if self.autocommit || self.in_transaction {
            return Ok(());
        }
        self.native
            .begin_transaction(session)
            .map_err(|rc| self.map_session_error(rc))?;
        self.in_transaction = true;
        Ok(())
    }

    /// Commits or rolls back. The native call is made whether or not a
    /// transaction is marked open.
    pub fn end_transaction(&mut self, rollback: bool) -> Result<()> {
        let session = self.session()?;
        let result = self
            .native
            .end_transaction(session, rollback)
            .map_err(|rc| self.map_session_error(rc));
        self.in_transaction = false;
        result.map(|_| ())
    }

    /// Ends the statement of cursor `id`, if any, and frees its buffers.
    pub fn release_statement(&mut self, id: u32) -> Result<()> {
        let native = self.native.clone();
        let Some(state) = self.cursors.get_mut(&id) else {
            return Ok(());
        };
        state.result_open = false;
        state.last_sql = None;
        let Some(statement) = state.statement.take() else {
            return Ok(());
        };
        native
            .end_statement(&mut self.arena, statement)
            .map(|_| ())
            .map_err(|rc| native.map_error(rc, Some(NativeHandle::Statement(statement))))
    }

    /// Removes cursor `id`, ending its statement. Closing an unknown cursor is
    /// a no-op.
    pub fn close_cursor(&mut self, id: u32) -> Result<()> {
        let result = if self.session.is_some() {
            self.release_statement(id)
        } else {
            Ok(())
        };
        self.cursors.remove(&id);
        result
    }

    /// Closes every registered cursor, returning the first failure.
    pub fn close_all_cursors(&mut self) -> Result<()> {
        let mut first_error = None;
        let ids: Vec<u32> = self.cursors.keys().copied().collect();
        for id in ids {
            if let Err(e) = self.close_cursor(id) {
                log::debug!("Closing cursor {} failed: {}", id, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Closes every cursor, rolls back an open transaction and ends the
    /// session. Every step is attempted; the first failure is returned.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(session) = self.session else {
            return Ok(());
        };
        let mut first_error = self.close_all_cursors().err();

        if self.in_transaction {
            if let Err(e) = self.end_transaction(true) {
                first_error.get_or_insert(e);
            }
        }

        if let Err(rc) = self.native.end_session(session) {
            first_error.get_or_insert(self.map_session_error(rc));
        }
        self.session = None;
        self.in_transaction = false;
        log::debug!("Session {:#x} ended", session.as_raw());

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

pub type SharedHandleManager = Arc<Mutex<HandleManager>>;

pub fn lock_handles(handles: &SharedHandleManager) -> Result<MutexGuard<'_, HandleManager>> {
    handles
        .lock()
        .map_err(|_| MimerError::InternalError("Failed to lock handles mutex".to_string()))
}
