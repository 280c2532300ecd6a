use super::api::{MimerApi, NativeHandle, SessionHandle, StatementHandle, DDL_STATEMENT};
use super::arena::BindArena;
use super::marshal::{self, check, NativeResult, NAME_PROBE_LEN};
use super::types::DispatchTable;
use crate::error::codes::{DATA_CONVERSION, LOGIN_FAILURE, OUT_OF_MEMORY};
use crate::error::{map_status, MimerError};
use crate::observability::StructuredLogger;
use crate::protocol::Value;
use log::Level;
use std::ffi::CString;
use std::sync::Arc;

/// Outcome of preparing SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prepared {
    /// The library reported a DDL statement; no handle was produced and the
    /// text must go through immediate execution.
    Ddl,
    Statement(StatementHandle),
}

fn c_string(text: &str) -> NativeResult<CString> {
    CString::new(text).map_err(|_| DATA_CONVERSION)
}

/// Normalized entry points over a [`MimerApi`]: every call returns a
/// [`NativeResult`], is traced through the logger and goes through the
/// dispatch table for typed access.
pub struct NativeLayer {
    api: Arc<dyn MimerApi>,
    dispatch: DispatchTable,
    logger: StructuredLogger,
}

impl NativeLayer {
    pub fn new(api: Arc<dyn MimerApi>, dispatch: DispatchTable, logger: StructuredLogger) -> Self {
        Self {
            api,
            dispatch,
            logger,
        }
    }

    pub fn api(&self) -> &dyn MimerApi {
        self.api.as_ref()
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    pub fn map_error(&self, code: i32, handle: Option<NativeHandle>) -> MimerError {
        map_status(self.api(), code, handle)
    }

    fn traced<F>(&self, name: &str, args: F, rc: i32) -> NativeResult<i32>
    where
        F: FnOnce() -> String,
    {
        self.logger.log_call(name, args, rc);
        check(rc)
    }

    pub fn begin_session(&self, dsn: &str, user: &str, password: &str) -> NativeResult<SessionHandle> {
        let c_dsn = c_string(dsn)?;
        let c_user = c_string(user)?;
        let c_password = c_string(password)?;
        let (rc, handle) = self.api.begin_session(&c_dsn, &c_user, &c_password);
        self.traced("MimerBeginSession8", || format!("{}, {}, ****", dsn, user), rc)?;
        let session = handle.ok_or(LOGIN_FAILURE)?;
        self.logger.log_session(Level::Debug, dsn, user, "open");
        Ok(session)
    }

    pub fn end_session(&self, session: SessionHandle) -> NativeResult<i32> {
        let rc = self.api.end_session(session);
        self.traced("MimerEndSession", || format!("{:#x}", session.as_raw()), rc)
    }

    pub fn begin_transaction(&self, session: SessionHandle) -> NativeResult<i32> {
        let rc = self.api.begin_transaction(session);
        self.traced("MimerBeginTransaction", || format!("{:#x}", session.as_raw()), rc)
    }

    pub fn end_transaction(&self, session: SessionHandle, rollback: bool) -> NativeResult<i32> {
        let rc = self.api.end_transaction(session, rollback);
        self.traced(
            "MimerEndTransaction",
            || format!("{:#x}, rollback={}", session.as_raw(), rollback),
            rc,
        )
    }

    pub fn begin_statement(&self, session: SessionHandle, sql: &str, options: i32) -> NativeResult<Prepared> {
        let c_sql = c_string(sql)?;
        let (rc, handle) = self.api.begin_statement(session, &c_sql, options);
        self.logger.log_statement(Level::Debug, sql, rc);
        if rc == DDL_STATEMENT {
            return Ok(Prepared::Ddl);
        }
        self.traced("MimerBeginStatement8", || format!("{}, {}", sql, options), rc)?;
        handle.map(Prepared::Statement).ok_or(OUT_OF_MEMORY)
    }

    /// Ends `statement` and frees every buffer bound to it, whatever the
    /// library answers.
    pub fn end_statement(&self, arena: &mut BindArena, statement: StatementHandle) -> NativeResult<i32> {
        let rc = self.api.end_statement(statement);
        arena.release(statement);
        self.traced("MimerEndStatement", || format!("{:#x}", statement.as_raw()), rc)
    }

    pub fn execute_statement(&self, session: SessionHandle, sql: &str) -> NativeResult<i32> {
        let c_sql = c_string(sql)?;
        let rc = self.api.execute_statement(session, &c_sql);
        self.traced("MimerExecuteStatement8", || sql.to_string(), rc)
    }

    pub fn open_cursor(&self, statement: StatementHandle) -> NativeResult<i32> {
        let rc = self.api.open_cursor(statement);
        self.traced("MimerOpenCursor", || format!("{:#x}", statement.as_raw()), rc)
    }

    pub fn close_cursor(&self, statement: StatementHandle) -> NativeResult<i32> {
        let rc = self.api.close_cursor(statement);
        self.traced("MimerCloseCursor", || format!("{:#x}", statement.as_raw()), rc)
    }

    pub fn add_batch(&self, statement: StatementHandle) -> NativeResult<i32> {
        let rc = self.api.add_batch(statement);
        self.traced("MimerAddBatch", || format!("{:#x}", statement.as_raw()), rc)
    }

    pub fn execute(&self, statement: StatementHandle) -> NativeResult<i32> {
        let rc = self.api.execute(statement);
        self.traced("MimerExecute", || format!("{:#x}", statement.as_raw()), rc)
    }

    /// Fetches the next row; `Ok(END_OF_SET)` once the set is exhausted.
    pub fn fetch(&self, statement: StatementHandle) -> NativeResult<i32> {
        let rc = self.api.fetch(statement);
        self.traced("MimerFetch", || format!("{:#x}", statement.as_raw()), rc)
    }

    pub fn parameter_count(&self, statement: StatementHandle) -> NativeResult<usize> {
        let rc = self.api.parameter_count(statement);
        let count = self.traced("MimerParameterCount", || format!("{:#x}", statement.as_raw()), rc)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn parameter_type(&self, statement: StatementHandle, index: i16) -> NativeResult<i32> {
        let rc = self.api.parameter_type(statement, index);
        self.traced("MimerParameterType", || format!("{:#x}, {}", statement.as_raw(), index), rc)
    }

    /// Parameter name without the leading `:` marker.
    pub fn parameter_name(&self, statement: StatementHandle, index: i16) -> NativeResult<String> {
        let name = marshal::read_text(NAME_PROBE_LEN, |buf| {
            self.api.parameter_name(statement, index, buf)
        })?;
        Ok(name.trim_start_matches(':').to_string())
    }

    pub fn column_count(&self, statement: StatementHandle) -> NativeResult<i32> {
        let rc = self.api.column_count(statement);
        self.traced("MimerColumnCount", || format!("{:#x}", statement.as_raw()), rc)
    }

    pub fn column_type(&self, statement: StatementHandle, index: i16) -> NativeResult<i32> {
        let rc = self.api.column_type(statement, index);
        self.traced("MimerColumnType", || format!("{:#x}, {}", statement.as_raw(), index), rc)
    }

    pub fn column_name(&self, statement: StatementHandle, index: i16) -> NativeResult<String> {
        marshal::read_text(NAME_PROBE_LEN, |buf| self.api.column_name(statement, index, buf))
    }

    /// Reads column `index` of the current row with the accessor the
    /// dispatch table assigns to `type_code`.
    pub fn get_value(&self, statement: StatementHandle, index: i16, type_code: i32) -> NativeResult<Value> {
        marshal::get_value(self.api(), statement, index, self.dispatch.lookup(type_code))
    }

    /// Binds `value` to parameter `index` with the setter for `type_code`.
    /// Buffers handed to the library are kept in `arena` under `statement`.
    pub fn set_value(
        &self,
        arena: &mut BindArena,
        statement: StatementHandle,
        index: i16,
        type_code: i32,
        value: &Value,
    ) -> NativeResult<i32> {
        marshal::set_value(self.api(), arena, statement, index, self.dispatch.lookup(type_code), value)
    }
}
