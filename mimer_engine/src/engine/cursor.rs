use super::options::{ErrorSource, HandlerAction};
use crate::error::{codes, MimerError, Result};
use crate::handles::{lock_handles, HandleManager, RowSource, SharedHandleManager};
use crate::native::{
    BindArena, NativeHandle, NativeLayer, Prepared, StatementHandle, END_OF_SET, FORWARD_ONLY,
};
use crate::protocol::{ColumnDescription, Params, Row};
use std::str::FromStr;

/// How [`Cursor::scroll`] interprets its offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollMode {
    #[default]
    Relative,
    Absolute,
}

impl FromStr for ScrollMode {
    type Err = MimerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "relative" => Ok(ScrollMode::Relative),
            "absolute" => Ok(ScrollMode::Absolute),
            _ => Err(MimerError::local(codes::ILLEGAL_SCROLL_MODE)),
        }
    }
}

fn ordinal(position: usize) -> Result<i16> {
    i16::try_from(position).map_err(|_| MimerError::local(codes::INVALID_PARAMETER_COUNT))
}

fn statement_error(native: &NativeLayer, statement: StatementHandle) -> impl Fn(i32) -> MimerError + '_ {
    move |rc| native.map_error(rc, Some(NativeHandle::Statement(statement)))
}

/// Binds one parameter set. Values are looked up by position, or by the
/// parameter's name for a named set, and bound with the setter for the
/// parameter's declared type.
fn bind_parameters(
    native: &NativeLayer,
    arena: &mut BindArena,
    statement: StatementHandle,
    params: &Params,
) -> Result<()> {
    let failed = statement_error(native, statement);
    let count = native.parameter_count(statement).map_err(&failed)?;
    if count == 0 {
        return Ok(());
    }
    if params.len() != count {
        return Err(MimerError::local(codes::INVALID_PARAMETER_FORMAT));
    }

    for position in 1..=count {
        let index = ordinal(position)?;
        let type_code = native.parameter_type(statement, index).map_err(&failed)?;
        let value = match params {
            Params::Positional(values) => &values[position - 1],
            Params::Named(values) => {
                let name = native.parameter_name(statement, index).map_err(&failed)?;
                values
                    .get(&name)
                    .ok_or_else(|| MimerError::local_with(codes::MISSING_PARAMETER_KEY, Some(&name)))?
            }
            Params::None => return Err(MimerError::local(codes::INVALID_PARAMETER_FORMAT)),
        };
        native
            .set_value(arena, statement, index, type_code, value)
            .map_err(&failed)?;
    }
    Ok(())
}

fn describe(native: &NativeLayer, statement: StatementHandle, columns: usize) -> Result<Vec<ColumnDescription>> {
    let failed = statement_error(native, statement);
    (1..=columns)
        .map(|position| {
            let index = ordinal(position)?;
            let name = native.column_name(statement, index).map_err(&failed)?;
            let type_code = native.column_type(statement, index).map_err(&failed)?;
            Ok(ColumnDescription::new(name, type_code))
        })
        .collect()
}

/// Fetches and reads the next row; `None` at end of set. The column type is
/// asked per row because the accessor depends on it.
fn fetch_row(native: &NativeLayer, statement: StatementHandle, columns: usize) -> Result<Option<Row>> {
    let failed = statement_error(native, statement);
    if native.fetch(statement).map_err(&failed)? == END_OF_SET {
        return Ok(None);
    }

    let mut row = Vec::with_capacity(columns);
    for position in 1..=columns {
        let index = ordinal(position)?;
        let type_code = native.column_type(statement, index).map_err(&failed)?;
        row.push(native.get_value(statement, index, type_code).map_err(&failed)?);
    }
    Ok(Some(row))
}

/// Database cursor created from a [`crate::Connection`].
///
/// A forward-only cursor streams rows from the open native cursor. A
/// scrollable cursor reads the whole result set on execute and serves
/// fetches and [`Cursor::scroll`] from memory. The cursor's native state
/// lives in its connection's handle registry, so closing the connection
/// closes the cursor too.
pub struct Cursor {
    handles: SharedHandleManager,
    id: u32,
    arraysize: usize,
}

impl Cursor {
    pub(crate) fn open(handles: SharedHandleManager, scrollable: bool) -> Result<Self> {
        let id = lock_handles(&handles)?.register_cursor(scrollable)?;
        Ok(Self {
            handles,
            id,
            arraysize: 1,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Offers a failure to the connection's error handler after recording it
    /// in `messages`. An ignored failure yields `neutral()`.
    fn finish<T>(&self, result: Result<T>, neutral: impl FnOnce() -> T) -> Result<T> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        let handler = match lock_handles(&self.handles) {
            Ok(mut h) => {
                h.record_cursor_error(self.id, err.clone());
                h.error_handler()
            }
            Err(_) => None,
        };
        match handler.map(|handler| handler(ErrorSource::Cursor, &err)).unwrap_or_default() {
            HandlerAction::Raise => Err(err),
            HandlerAction::Ignore => Ok(neutral()),
        }
    }

    /// Checks that the cursor is usable, clears its messages and starts the
    /// implicit transaction.
    fn begin(&self, h: &mut HandleManager) -> Result<()> {
        h.cursor_mut(self.id)?.messages.clear();
        h.ensure_transaction()
    }

    pub fn is_open(&self) -> bool {
        lock_handles(&self.handles)
            .map(|h| h.cursor(self.id).is_ok())
            .unwrap_or(false)
    }

    pub fn is_scrollable(&self) -> bool {
        lock_handles(&self.handles)
            .ok()
            .and_then(|h| h.cursor(self.id).ok().map(|state| state.scrollable))
            .unwrap_or(false)
    }

    /// Column metadata of the current result set.
    pub fn description(&self) -> Option<Vec<ColumnDescription>> {
        lock_handles(&self.handles)
            .ok()
            .and_then(|h| h.cursor(self.id).ok().and_then(|state| state.description.clone()))
    }

    /// Rows affected by the last statement, or the column count of the last
    /// query (the row count for a scrollable cursor). `-1` before any execute.
    pub fn rowcount(&self) -> i64 {
        lock_handles(&self.handles)
            .ok()
            .and_then(|h| h.cursor(self.id).ok().map(|state| state.rowcount))
            .unwrap_or(-1)
    }

    /// Position in a materialized result set.
    pub fn rownumber(&self) -> Option<usize> {
        let h = lock_handles(&self.handles).ok()?;
        match h.cursor(self.id).ok()?.rows {
            RowSource::Materialized { position, .. } => Some(position),
            RowSource::Streaming => None,
        }
    }

    pub fn messages(&self) -> Vec<MimerError> {
        lock_handles(&self.handles)
            .ok()
            .and_then(|h| h.cursor(self.id).ok().map(|state| state.messages.clone()))
            .unwrap_or_default()
    }

    pub fn arraysize(&self) -> usize {
        self.arraysize
    }

    pub fn set_arraysize(&mut self, size: usize) {
        self.arraysize = size;
    }

    pub fn execute<P: Into<Params>>(&mut self, sql: &str, params: P) -> Result<()> {
        let params = params.into();
        let result = self.execute_inner(sql, &params);
        self.finish(result, || ())
    }

    fn execute_inner(&self, sql: &str, params: &Params) -> Result<()> {
        let mut h = lock_handles(&self.handles)?;
        let session = h.session()?;
        self.begin(&mut h)?;
        let native = h.native();

        let reusable = {
            let state = h.cursor(self.id)?;
            match state.statement {
                Some(statement) if !state.result_open && state.last_sql.as_deref() == Some(sql) => {
                    Some(statement)
                }
                _ => None,
            }
        };

        let statement = match reusable {
            Some(statement) => {
                h.arena_mut().release(statement);
                statement
            }
            None => {
                h.release_statement(self.id)?;
                let prepared = native
                    .begin_statement(session, sql, FORWARD_ONLY)
                    .map_err(|rc| h.map_session_error(rc))?;
                match prepared {
                    Prepared::Ddl => {
                        let state = h.cursor_mut(self.id)?;
                        state.description = None;
                        state.rows = RowSource::Streaming;
                        native
                            .execute_statement(session, sql)
                            .map_err(|rc| h.map_session_error(rc))?;
                        return Ok(());
                    }
                    Prepared::Statement(statement) => {
                        let state = h.cursor_mut(self.id)?;
                        state.statement = Some(statement);
                        state.last_sql = Some(sql.to_string());
                        statement
                    }
                }
            }
        };

        {
            let state = h.cursor_mut(self.id)?;
            state.description = None;
            state.rows = RowSource::Streaming;
        }
        let failed = statement_error(&native, statement);
        bind_parameters(&native, h.arena_mut(), statement, params)?;

        let columns = native.column_count(statement).map_err(&failed)?;
        let columns = usize::try_from(columns).unwrap_or(0);
        if columns == 0 {
            let affected = native.execute(statement).map_err(&failed)?;
            h.cursor_mut(self.id)?.rowcount = i64::from(affected);
            return Ok(());
        }

        h.cursor_mut(self.id)?.rowcount = columns as i64;
        native.open_cursor(statement).map_err(&failed)?;
        h.cursor_mut(self.id)?.result_open = true;
        let description = describe(&native, statement, columns)?;
        let state = h.cursor_mut(self.id)?;
        state.description = Some(description);
        if !state.scrollable {
            return Ok(());
        }

        let mut rows = Vec::new();
        while let Some(row) = fetch_row(&native, statement, columns)? {
            rows.push(row);
        }
        native.close_cursor(statement).map_err(&failed)?;
        let state = h.cursor_mut(self.id)?;
        state.result_open = false;
        state.rowcount = rows.len() as i64;
        state.rows = RowSource::Materialized { rows, position: 0 };
        Ok(())
    }

    /// Executes `sql` once per parameter set as a single batch. `rowcount`
    /// becomes the sum of the batch-add statuses.
    pub fn executemany<I, P>(&mut self, sql: &str, param_sets: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<Params>,
    {
        let sets: Vec<Params> = param_sets.into_iter().map(Into::into).collect();
        let result = self.executemany_inner(sql, &sets);
        self.finish(result, || ())
    }

    fn executemany_inner(&self, sql: &str, sets: &[Params]) -> Result<()> {
        let mut h = lock_handles(&self.handles)?;
        let session = h.session()?;
        self.begin(&mut h)?;
        if sets.is_empty() || sets.iter().any(|params| matches!(params, Params::None)) {
            return Err(MimerError::local(codes::INVALID_PARAMETER_FORMAT));
        }
        let native = h.native();

        h.release_statement(self.id)?;
        {
            let state = h.cursor_mut(self.id)?;
            state.description = None;
            state.rows = RowSource::Streaming;
        }
        let statement = match native
            .begin_statement(session, sql, FORWARD_ONLY)
            .map_err(|rc| h.map_session_error(rc))?
        {
            Prepared::Ddl => return Err(MimerError::local(codes::UNSUPPORTED_METHOD)),
            Prepared::Statement(statement) => statement,
        };
        let state = h.cursor_mut(self.id)?;
        state.statement = Some(statement);
        state.rowcount = 0;

        let failed = statement_error(&native, statement);
        let last = sets.len() - 1;
        let mut rowcount = 0i64;
        for (i, params) in sets.iter().enumerate() {
            bind_parameters(&native, h.arena_mut(), statement, params)?;
            if i != last {
                rowcount += i64::from(native.add_batch(statement).map_err(&failed)?);
            }
        }
        native.execute(statement).map_err(&failed)?;
        h.cursor_mut(self.id)?.rowcount = rowcount;
        Ok(())
    }

    /// Next row of the result set; an empty row once it is exhausted.
    pub fn fetchone(&mut self) -> Result<Row> {
        let result = self.fetchone_inner();
        self.finish(result, Vec::new)
    }

    fn fetchone_inner(&self) -> Result<Row> {
        let mut h = lock_handles(&self.handles)?;
        self.begin(&mut h)?;
        let native = h.native();
        let state = h.cursor_mut(self.id)?;
        if let RowSource::Materialized { rows, position } = &mut state.rows {
            return Ok(match rows.get(*position) {
                Some(row) => {
                    *position += 1;
                    row.clone()
                }
                None => Vec::new(),
            });
        }
        let statement = match state.statement {
            Some(statement) if state.result_open => statement,
            _ => return Err(MimerError::local(codes::NO_RESULT_SET)),
        };
        let columns = state.column_count();
        Ok(fetch_row(&native, statement, columns)?.unwrap_or_default())
    }

    /// Up to `size` rows, or `arraysize` rows when `size` is `None`. A given
    /// size becomes the new `arraysize`.
    pub fn fetchmany(&mut self, size: Option<usize>) -> Result<Vec<Row>> {
        if let Some(size) = size {
            self.arraysize = size;
        }
        let result = self.fetch_rows(Some(self.arraysize));
        self.finish(result, Vec::new)
    }

    /// Every remaining row.
    pub fn fetchall(&mut self) -> Result<Vec<Row>> {
        let result = self.fetch_rows(None);
        self.finish(result, Vec::new)
    }

    fn fetch_rows(&self, limit: Option<usize>) -> Result<Vec<Row>> {
        let mut h = lock_handles(&self.handles)?;
        self.begin(&mut h)?;
        let native = h.native();
        let state = h.cursor_mut(self.id)?;
        if let RowSource::Materialized { rows, position } = &mut state.rows {
            let start = (*position).min(rows.len());
            let end = match limit {
                Some(n) => start.saturating_add(n).min(rows.len()),
                None => rows.len(),
            };
            *position = end;
            return Ok(rows[start..end].to_vec());
        }
        let statement = match state.statement {
            Some(statement) if state.result_open => statement,
            _ => return Err(MimerError::local(codes::NO_RESULT_SET)),
        };
        let columns = state.column_count();

        let mut rows = Vec::new();
        while limit.map_or(true, |n| rows.len() < n) {
            match fetch_row(&native, statement, columns)? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Moves a scrollable cursor by `value` rows, or to row `value`.
    pub fn scroll(&mut self, value: i64, mode: ScrollMode) -> Result<()> {
        let result = self.scroll_inner(value, mode);
        self.finish(result, || ())
    }

    fn scroll_inner(&self, value: i64, mode: ScrollMode) -> Result<()> {
        let mut h = lock_handles(&self.handles)?;
        self.begin(&mut h)?;
        let state = h.cursor_mut(self.id)?;
        let scrollable = state.scrollable;
        match &mut state.rows {
            RowSource::Materialized { rows, position } => {
                let current = i64::try_from(*position).unwrap_or(i64::MAX);
                let target = match mode {
                    ScrollMode::Relative => current.saturating_add(value),
                    ScrollMode::Absolute => value,
                };
                match usize::try_from(target) {
                    Ok(target) if target < rows.len() => {
                        *position = target;
                        Ok(())
                    }
                    _ => Err(MimerError::ScrollOutOfRange {
                        position: target,
                        rows: rows.len(),
                    }),
                }
            }
            RowSource::Streaming if scrollable => Err(MimerError::local(codes::NO_RESULT_SET)),
            RowSource::Streaming => Err(MimerError::local(codes::UNSUPPORTED_METHOD)),
        }
    }

    pub fn nextset(&mut self) -> Result<()> {
        self.finish(Err(MimerError::local(codes::UNSUPPORTED_METHOD)), || ())
    }

    pub fn callproc(&mut self, _procname: &str) -> Result<()> {
        self.finish(Err(MimerError::local(codes::UNSUPPORTED_METHOD)), || ())
    }

    pub fn setinputsizes(&mut self, _sizes: &[usize]) {}

    pub fn setoutputsizes(&mut self, _size: usize, _column: Option<usize>) {}

    /// Ends the statement and detaches the cursor. Safe to repeat.
    pub fn close(&mut self) -> Result<()> {
        let result = lock_handles(&self.handles).and_then(|mut h| h.close_cursor(self.id));
        self.finish(result, || ())
    }
}

impl Iterator for Cursor {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.fetchone() {
            Ok(row) if row.is_empty() => None,
            Ok(row) => Some(Ok(row)),
            Err(err) => Some(Err(err)),
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        let result = lock_handles(&self.handles).and_then(|mut h| {
            if h.has_cursor(self.id) {
                h.close_cursor(self.id)
            } else {
                Ok(())
            }
        });
        if let Err(e) = result {
            log::warn!("Closing cursor {} on drop failed: {}", self.id, e);
        }
    }
}
