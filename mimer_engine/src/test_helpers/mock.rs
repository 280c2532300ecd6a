//! In-memory stand-in for the Mimer API shared library.
//!
//! Tables are shared by every session opened on one `MockMimer`. Transactions
//! are optimistic: each keeps private changes and validates them on commit,
//! so the first of two conflicting writers wins and the second gets
//! `-10001`. Every entry point bumps a per-name call counter.

use super::mock_sql::{self, ColumnSpec, Expr, Sql};
use crate::native::api::{
    LobHandle, MimerApi, NativeHandle, SessionHandle, StatementHandle, DDL_STATEMENT, END_OF_SET,
};
use crate::native::type_code;
use crate::protocol::Value;
use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::{Mutex, MutexGuard};

pub const TRANSACTION_CONFLICT: i32 = -10001;
pub const PRIMARY_KEY_VIOLATION: i32 = -10101;
pub const SYNTAX_ERROR: i32 = -12101;
pub const TABLE_NOT_FOUND: i32 = -12200;
pub const COLUMN_NOT_FOUND: i32 = -12201;
pub const DDL_AFTER_DML: i32 = -12517;
pub const TABLE_EXISTS: i32 = -12560;
pub const LOGIN_REJECTED: i32 = -14006;
pub const TABLE_LOCKED: i32 = -16001;
pub const VALUE_TOO_LARGE: i32 = -24010;
pub const TYPE_MISMATCH: i32 = -24011;
pub const INVALID_HANDLE: i32 = -24101;
pub const PARAMETER_NOT_SET: i32 = -24102;
pub const INDEX_OUT_OF_RANGE: i32 = -24103;
pub const NO_CURRENT_ROW: i32 = -24104;

const CONFLICT_MESSAGE: &str = "Transaction aborted due to conflict with other transaction";
const DEFAULT_API_VERSION: &str = "11.0.7A";
const FIRST_HANDLE: usize = 0x1000;
const HANDLE_STEP: usize = 0x10;

type Failure = (i32, String);
type Outcome<T> = std::result::Result<T, Failure>;

fn failure(code: i32, message: impl Into<String>) -> Failure {
    (code, message.into())
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    type_code: i32,
    length: Option<usize>,
}

impl From<&ColumnSpec> for Column {
    fn from(spec: &ColumnSpec) -> Self {
        Self {
            name: spec.name.clone(),
            type_code: spec.type_code,
            length: spec.length,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredRow {
    id: u64,
    version: u64,
    values: Vec<Value>,
}

#[derive(Debug)]
struct Table {
    schema: String,
    name: String,
    columns: Vec<Column>,
    key: Option<usize>,
    rows: Vec<StoredRow>,
}

impl Table {
    fn column(&self, name: &str) -> Outcome<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| failure(COLUMN_NOT_FOUND, format!("Column {} not found", name)))
    }
}

#[derive(Debug, Clone, Default)]
struct TableChanges {
    inserted: Vec<StoredRow>,
    /// Row id to (version the change was based on, new values).
    updated: HashMap<u64, (u64, Vec<Value>)>,
    /// Row id to the version it was deleted at.
    deleted: HashMap<u64, u64>,
}

impl TableChanges {
    fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
struct Txn {
    changes: HashMap<String, TableChanges>,
}

impl Txn {
    fn has_changes(&self) -> bool {
        self.changes.values().any(|c| !c.is_empty())
    }

    fn touches(&self, table: &str) -> bool {
        self.changes.get(table).is_some_and(|c| !c.is_empty())
    }
}

struct Session {
    user: String,
    txn: Option<Txn>,
}

#[derive(Debug, Clone)]
enum Operand {
    Literal(Value),
    Param(usize),
}

type Filter = Option<(usize, Operand)>;

#[derive(Debug, Clone)]
enum Plan {
    Insert {
        table: String,
        targets: Vec<usize>,
        values: Vec<Operand>,
    },
    Select {
        table: String,
        columns: Vec<usize>,
        filter: Filter,
    },
    Update {
        table: String,
        sets: Vec<(usize, Operand)>,
        filter: Filter,
    },
    Delete {
        table: String,
        filter: Filter,
    },
}

struct ParamSlot {
    name: Option<String>,
    column: Column,
}

struct ResultCursor {
    rows: Vec<Vec<Value>>,
    next: usize,
    current: Option<usize>,
}

struct Statement {
    session: usize,
    plan: Plan,
    params: Vec<ParamSlot>,
    bound: Vec<Option<Value>>,
    batch: Vec<Vec<Option<Value>>>,
    result_columns: Vec<Column>,
    cursor: Option<ResultCursor>,
}

impl Statement {
    fn current_value(&self, index: i16) -> Outcome<&Value> {
        let cursor = self
            .cursor
            .as_ref()
            .ok_or_else(|| failure(NO_CURRENT_ROW, "Cursor not open"))?;
        let row = cursor
            .current
            .and_then(|i| cursor.rows.get(i))
            .ok_or_else(|| failure(NO_CURRENT_ROW, "No current row"))?;
        usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| row.get(i))
            .ok_or_else(|| failure(INDEX_OUT_OF_RANGE, format!("Column {} out of range", index)))
    }

    fn slot(&self, index: i16) -> Outcome<usize> {
        usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .filter(|i| *i < self.params.len())
            .ok_or_else(|| failure(INDEX_OUT_OF_RANGE, format!("Parameter {} out of range", index)))
    }

    fn result_column(&self, index: i16) -> Outcome<&Column> {
        usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.result_columns.get(i))
            .ok_or_else(|| failure(INDEX_OUT_OF_RANGE, format!("Column {} out of range", index)))
    }
}

enum Lob {
    Read {
        data: Vec<u8>,
        offset: usize,
    },
    Write {
        statement: usize,
        slot: usize,
        data: Vec<u8>,
        text: bool,
    },
}

struct Database {
    next_handle: usize,
    next_row_id: u64,
    next_version: u64,
    tables: HashMap<String, Table>,
    sessions: HashMap<usize, Session>,
    statements: HashMap<usize, Statement>,
    lobs: HashMap<usize, Lob>,
    errors: HashMap<usize, Failure>,
    failures: HashMap<&'static str, Failure>,
    login: Option<(String, String)>,
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Int(x), Value::Double(y)) | (Value::Double(y), Value::Int(x)) => (*x as f64) == *y,
        (Value::Str(x), Value::Str(y)) => x.trim_end() == y.trim_end(),
        _ => a == b,
    }
}

fn resolve(operand: &Operand, params: &[Value]) -> Value {
    match operand {
        Operand::Literal(v) => v.clone(),
        Operand::Param(i) => params.get(*i).cloned().unwrap_or(Value::Null),
    }
}

fn too_large() -> Failure {
    failure(VALUE_TOO_LARGE, "Value was too large to fit in destination")
}

fn mismatch(column: &Column, value: &Value) -> Failure {
    failure(
        TYPE_MISMATCH,
        format!("Value of type {} can not be stored in column {}", value.type_name(), column.name),
    )
}

/// Checks `value` against the declared type of `column` and returns the form
/// it is stored in.
fn store_value(column: &Column, value: Value) -> Outcome<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let code = column.type_code;
    match code {
        type_code::SMALLINT | type_code::INTEGER | type_code::BIGINT => {
            let v = match value {
                Value::Int(v) => v,
                Value::Bool(b) => i128::from(b),
                other => return Err(mismatch(column, &other)),
            };
            let fits = match code {
                type_code::SMALLINT => i16::try_from(v).is_ok(),
                type_code::INTEGER => i32::try_from(v).is_ok(),
                _ => i64::try_from(v).is_ok(),
            };
            if fits {
                Ok(Value::Int(v))
            } else {
                Err(too_large())
            }
        }
        type_code::REAL | type_code::DOUBLE => match value {
            Value::Double(v) if code == type_code::REAL => Ok(Value::Double(f64::from(v as f32))),
            Value::Double(v) => Ok(Value::Double(v)),
            Value::Int(v) => Ok(Value::Double(v as f64)),
            other => Err(mismatch(column, &other)),
        },
        type_code::BOOLEAN => match value {
            Value::Bool(b) => Ok(Value::Bool(b)),
            Value::Int(v) => Ok(Value::Bool(v != 0)),
            other => Err(mismatch(column, &other)),
        },
        type_code::CHARACTER
        | type_code::CHARACTER_VARYING
        | type_code::NATIONAL_CHARACTER
        | type_code::NATIONAL_CHARACTER_VARYING
        | type_code::CLOB
        | type_code::NCLOB => {
            let text = match value {
                Value::Str(s) => s,
                other => return Err(mismatch(column, &other)),
            };
            let chars = text.chars().count();
            match column.length {
                Some(limit) if chars > limit => Err(too_large()),
                Some(limit)
                    if code == type_code::CHARACTER || code == type_code::NATIONAL_CHARACTER =>
                {
                    Ok(Value::Str(format!("{:<width$}", text, width = limit)))
                }
                _ => Ok(Value::Str(text)),
            }
        }
        type_code::BINARY | type_code::BINARY_VARYING | type_code::BLOB => {
            let bytes = match value {
                Value::Bytes(b) => b,
                other => return Err(mismatch(column, &other)),
            };
            match column.length {
                Some(limit) if bytes.len() > limit => Err(too_large()),
                _ => Ok(Value::Bytes(bytes)),
            }
        }
        _ => Err(mismatch(column, &value)),
    }
}

fn text_type(code: i32) -> bool {
    matches!(code, type_code::CLOB | type_code::NCLOB)
}

impl Database {
    fn new() -> Self {
        let mut tables = HashMap::new();
        tables.insert(
            "system.onerow".to_string(),
            Table {
                schema: "SYSTEM".to_string(),
                name: "ONEROW".to_string(),
                columns: vec![Column {
                    name: "M".to_string(),
                    type_code: type_code::CHARACTER,
                    length: Some(1),
                }],
                key: None,
                rows: vec![StoredRow {
                    id: 0,
                    version: 0,
                    values: vec![Value::Str("X".to_string())],
                }],
            },
        );
        Self {
            next_handle: FIRST_HANDLE,
            next_row_id: 1,
            next_version: 1,
            tables,
            sessions: HashMap::new(),
            statements: HashMap::new(),
            lobs: HashMap::new(),
            errors: HashMap::new(),
            failures: HashMap::new(),
            login: None,
        }
    }

    fn allocate(&mut self) -> usize {
        let handle = self.next_handle;
        self.next_handle += HANDLE_STEP;
        handle
    }

    /// Records `failure` as the last error of `handle` and returns its code.
    fn fail(&mut self, handle: usize, (code, message): Failure) -> i32 {
        self.errors.insert(handle, (code, message));
        code
    }

    fn injected(&mut self, name: &'static str, handle: usize) -> Option<i32> {
        let injected = self.failures.get(name).cloned()?;
        Some(self.fail(handle, injected))
    }

    fn session(&self, handle: usize) -> Outcome<&Session> {
        self.sessions
            .get(&handle)
            .ok_or_else(|| failure(INVALID_HANDLE, "Invalid session handle"))
    }

    fn statement(&self, handle: usize) -> Outcome<&Statement> {
        self.statements
            .get(&handle)
            .ok_or_else(|| failure(INVALID_HANDLE, "Invalid statement handle"))
    }

    fn statement_mut(&mut self, handle: usize) -> Outcome<&mut Statement> {
        self.statements
            .get_mut(&handle)
            .ok_or_else(|| failure(INVALID_HANDLE, "Invalid statement handle"))
    }

    fn table(&self, name: &str) -> Outcome<&Table> {
        self.tables
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| failure(TABLE_NOT_FOUND, format!("Table {} not found", name)))
    }

    /// Rows of `table` as seen from inside `txn`.
    fn visible_rows(&self, table: &str, txn: Option<&Txn>) -> Vec<StoredRow> {
        let Some(stored) = self.tables.get(table) else {
            return Vec::new();
        };
        let changes = txn.and_then(|t| t.changes.get(table));
        let mut rows: Vec<StoredRow> = stored
            .rows
            .iter()
            .filter(|row| !changes.is_some_and(|c| c.deleted.contains_key(&row.id)))
            .map(|row| match changes.and_then(|c| c.updated.get(&row.id)) {
                Some((_, values)) => StoredRow {
                    id: row.id,
                    version: row.version,
                    values: values.clone(),
                },
                None => row.clone(),
            })
            .collect();
        if let Some(changes) = changes {
            rows.extend(changes.inserted.iter().cloned());
        }
        rows
    }

    fn plan(&self, sql: Sql) -> Outcome<(Plan, Vec<ParamSlot>, Vec<Column>)> {
        let mut slots = Vec::new();
        let mut operand = |expr: Expr, column: &Column| match expr {
            Expr::Literal(v) => Operand::Literal(v),
            Expr::Param(name) => {
                slots.push(ParamSlot {
                    name,
                    column: column.clone(),
                });
                Operand::Param(slots.len() - 1)
            }
        };

        let (plan, result_columns) = match sql {
            Sql::Insert {
                table,
                columns,
                values,
            } => {
                let t = self.table(&table)?;
                let targets = match columns {
                    Some(names) => names.iter().map(|n| t.column(n)).collect::<Outcome<Vec<_>>>()?,
                    None => (0..values.len()).collect(),
                };
                if targets.len() != values.len() || targets.iter().any(|i| *i >= t.columns.len()) {
                    return Err(failure(SYNTAX_ERROR, "Number of values does not match number of columns"));
                }
                let values = values
                    .into_iter()
                    .zip(&targets)
                    .map(|(expr, i)| operand(expr, &t.columns[*i]))
                    .collect();
                let plan = Plan::Insert {
                    table: table.to_ascii_lowercase(),
                    targets,
                    values,
                };
                (plan, Vec::new())
            }
            Sql::Select {
                table,
                columns,
                filter,
            } => {
                let t = self.table(&table)?;
                let columns = match columns {
                    Some(names) => names.iter().map(|n| t.column(n)).collect::<Outcome<Vec<_>>>()?,
                    None => (0..t.columns.len()).collect(),
                };
                let filter = match filter {
                    Some((name, expr)) => {
                        let i = t.column(&name)?;
                        Some((i, operand(expr, &t.columns[i])))
                    }
                    None => None,
                };
                let result = columns.iter().map(|i| t.columns[*i].clone()).collect();
                let plan = Plan::Select {
                    table: table.to_ascii_lowercase(),
                    columns,
                    filter,
                };
                (plan, result)
            }
            Sql::Update { table, sets, filter } => {
                let t = self.table(&table)?;
                let mut resolved = Vec::new();
                for (name, expr) in sets {
                    let i = t.column(&name)?;
                    resolved.push((i, operand(expr, &t.columns[i])));
                }
                let filter = match filter {
                    Some((name, expr)) => {
                        let i = t.column(&name)?;
                        Some((i, operand(expr, &t.columns[i])))
                    }
                    None => None,
                };
                let plan = Plan::Update {
                    table: table.to_ascii_lowercase(),
                    sets: resolved,
                    filter,
                };
                (plan, Vec::new())
            }
            Sql::Delete { table, filter } => {
                let t = self.table(&table)?;
                let filter = match filter {
                    Some((name, expr)) => {
                        let i = t.column(&name)?;
                        Some((i, operand(expr, &t.columns[i])))
                    }
                    None => None,
                };
                let plan = Plan::Delete {
                    table: table.to_ascii_lowercase(),
                    filter,
                };
                (plan, Vec::new())
            }
            Sql::CreateTable { .. } | Sql::DropTable { .. } => {
                return Err(failure(SYNTAX_ERROR, "Data definition statement can not be prepared"));
            }
        };
        Ok((plan, slots, result_columns))
    }

    fn matches(row: &StoredRow, filter: &Filter, params: &[Value]) -> bool {
        match filter {
            Some((i, operand)) => values_equal(&row.values[*i], &resolve(operand, params)),
            None => true,
        }
    }

    /// Runs one DML plan inside `txn`, returning the number of rows touched.
    fn apply(&mut self, txn: &mut Txn, plan: &Plan, params: &[Value]) -> Outcome<i32> {
        match plan {
            Plan::Insert {
                table,
                targets,
                values,
            } => {
                let t = self.table(table)?;
                let mut row = vec![Value::Null; t.columns.len()];
                for (i, operand) in targets.iter().zip(values) {
                    row[*i] = store_value(&t.columns[*i], resolve(operand, params))?;
                }
                if let Some(key) = t.key {
                    if row[key].is_null() {
                        return Err(failure(PRIMARY_KEY_VIOLATION, "Primary key constraint violation"));
                    }
                    let duplicate = self
                        .visible_rows(table, Some(txn))
                        .iter()
                        .any(|r| values_equal(&r.values[key], &row[key]));
                    if duplicate {
                        return Err(failure(PRIMARY_KEY_VIOLATION, "Primary key constraint violation"));
                    }
                }
                let id = self.next_row_id;
                self.next_row_id += 1;
                txn.changes
                    .entry(table.clone())
                    .or_default()
                    .inserted
                    .push(StoredRow {
                        id,
                        version: 0,
                        values: row,
                    });
                Ok(1)
            }
            Plan::Update { table, sets, filter } => {
                let t = self.table(table)?;
                let mut pending = Vec::new();
                for row in self.visible_rows(table, Some(txn)) {
                    if !Self::matches(&row, filter, params) {
                        continue;
                    }
                    let mut values = row.values.clone();
                    for (i, operand) in sets {
                        values[*i] = store_value(&t.columns[*i], resolve(operand, params))?;
                    }
                    pending.push((row.id, row.version, values));
                }
                let changes = txn.changes.entry(table.clone()).or_default();
                let count = pending.len();
                for (id, version, values) in pending {
                    if let Some(own) = changes.inserted.iter_mut().find(|r| r.id == id) {
                        own.values = values;
                    } else {
                        let base = changes.updated.get(&id).map(|(base, _)| *base).unwrap_or(version);
                        changes.updated.insert(id, (base, values));
                    }
                }
                Ok(i32::try_from(count).unwrap_or(i32::MAX))
            }
            Plan::Delete { table, filter } => {
                self.table(table)?;
                let doomed: Vec<(u64, u64)> = self
                    .visible_rows(table, Some(txn))
                    .into_iter()
                    .filter(|row| Self::matches(row, filter, params))
                    .map(|row| (row.id, row.version))
                    .collect();
                let changes = txn.changes.entry(table.clone()).or_default();
                for (id, version) in &doomed {
                    if let Some(pos) = changes.inserted.iter().position(|r| r.id == *id) {
                        changes.inserted.remove(pos);
                    } else {
                        let base = changes.updated.remove(id).map(|(base, _)| base).unwrap_or(*version);
                        changes.deleted.insert(*id, base);
                    }
                }
                Ok(i32::try_from(doomed.len()).unwrap_or(i32::MAX))
            }
            Plan::Select { .. } => Ok(0),
        }
    }

    fn validate(&self, txn: &Txn) -> Outcome<()> {
        let conflict = || failure(TRANSACTION_CONFLICT, CONFLICT_MESSAGE);
        for (name, changes) in &txn.changes {
            if changes.is_empty() {
                continue;
            }
            let table = self.tables.get(name).ok_or_else(conflict)?;
            let current = |id: &u64| table.rows.iter().find(|r| r.id == *id).map(|r| r.version);
            for (id, (base, _)) in &changes.updated {
                if current(id) != Some(*base) {
                    return Err(conflict());
                }
            }
            for (id, base) in &changes.deleted {
                if current(id) != Some(*base) {
                    return Err(conflict());
                }
            }
            if let Some(key) = table.key {
                for row in &changes.inserted {
                    let taken = table.rows.iter().any(|r| {
                        !changes.deleted.contains_key(&r.id) && values_equal(&r.values[key], &row.values[key])
                    });
                    if taken {
                        return Err(conflict());
                    }
                }
            }
        }
        Ok(())
    }

    fn commit(&mut self, txn: Txn) -> Outcome<()> {
        self.validate(&txn)?;
        let version = self.next_version;
        self.next_version += 1;
        for (name, changes) in txn.changes {
            let Some(table) = self.tables.get_mut(&name) else {
                continue;
            };
            table.rows.retain(|r| !changes.deleted.contains_key(&r.id));
            for row in table.rows.iter_mut() {
                if let Some((_, values)) = changes.updated.get(&row.id) {
                    row.values = values.clone();
                    row.version = version;
                }
            }
            for mut row in changes.inserted {
                row.version = version;
                table.rows.push(row);
            }
        }
        Ok(())
    }

    /// Runs `plan` for `session`: inside its open transaction, or as a
    /// transaction of its own that commits immediately.
    fn run(&mut self, session: usize, plan: &Plan, params: &[Value]) -> Outcome<i32> {
        let open = self
            .sessions
            .get_mut(&session)
            .ok_or_else(|| failure(INVALID_HANDLE, "Invalid session handle"))?
            .txn
            .take();
        let autocommit = open.is_none();
        let mut txn = open.unwrap_or_default();
        let before = txn.clone();

        let result = self.apply(&mut txn, plan, params);
        if autocommit {
            let count = result?;
            self.commit(txn)?;
            return Ok(count);
        }
        let keep = if result.is_ok() { txn } else { before };
        if let Some(s) = self.sessions.get_mut(&session) {
            s.txn = Some(keep);
        }
        result
    }

    fn execute_ddl(&mut self, session: usize, sql: &str) -> Outcome<()> {
        let (user, dirty) = {
            let s = self.session(session)?;
            (s.user.clone(), s.txn.as_ref().is_some_and(Txn::has_changes))
        };
        if dirty {
            return Err(failure(
                DDL_AFTER_DML,
                "Data definition statements are not allowed in a transaction with data manipulation",
            ));
        }

        match mock_sql::parse(sql).map_err(|e| failure(SYNTAX_ERROR, e))? {
            Sql::CreateTable { name, columns } => {
                let key = name.to_ascii_lowercase();
                if self.tables.contains_key(&key) {
                    return Err(failure(TABLE_EXISTS, format!("Table {} already exists", name)));
                }
                let table = Table {
                    schema: user,
                    key: columns.iter().position(|c| c.primary_key),
                    columns: columns.iter().map(Column::from).collect(),
                    name,
                    rows: Vec::new(),
                };
                self.tables.insert(key, table);
            }
            Sql::DropTable { name } => {
                let key = name.to_ascii_lowercase();
                let table = self.table(&name)?;
                let locked = self
                    .sessions
                    .iter()
                    .any(|(h, s)| *h != session && s.txn.as_ref().is_some_and(|t| t.touches(&key)));
                if locked {
                    return Err(failure(
                        TABLE_LOCKED,
                        format!("Table {}.{} locked by another user", table.schema, table.name),
                    ));
                }
                self.tables.remove(&key);
            }
            _ => return Err(failure(SYNTAX_ERROR, "Not a data definition statement")),
        }
        Ok(())
    }

    fn bound_params(statement: &Statement, set: &[Option<Value>]) -> Outcome<Vec<Value>> {
        set.iter()
            .enumerate()
            .map(|(i, v)| {
                v.clone()
                    .ok_or_else(|| failure(PARAMETER_NOT_SET, format!("Parameter {} not set", i + 1)))
            })
            .collect::<Outcome<Vec<_>>>()
            .and_then(|values| {
                if values.len() == statement.params.len() {
                    Ok(values)
                } else {
                    Err(failure(PARAMETER_NOT_SET, "Parameters not set"))
                }
            })
    }

    fn bind(&mut self, handle: usize, index: i16, value: Value) -> Outcome<i32> {
        let statement = self.statement_mut(handle)?;
        let slot = statement.slot(index)?;
        let stored = store_value(&statement.params[slot].column, value)?;
        statement.bound[slot] = Some(stored);
        Ok(0)
    }

    fn open_cursor(&mut self, handle: usize) -> Outcome<i32> {
        let statement = self.statement(handle)?;
        let Plan::Select {
            table,
            columns,
            filter,
        } = &statement.plan
        else {
            return Err(failure(NO_CURRENT_ROW, "Statement does not return a result set"));
        };
        let params = Self::bound_params(statement, &statement.bound)?;
        let txn = self.session(statement.session)?.txn.as_ref();
        let rows = self
            .visible_rows(table, txn)
            .into_iter()
            .filter(|row| Self::matches(row, filter, &params))
            .map(|row| columns.iter().map(|i| row.values[*i].clone()).collect())
            .collect();
        self.statement_mut(handle)?.cursor = Some(ResultCursor {
            rows,
            next: 0,
            current: None,
        });
        Ok(0)
    }

    fn execute(&mut self, handle: usize) -> Outcome<i32> {
        let statement = self.statement_mut(handle)?;
        let mut sets = std::mem::take(&mut statement.batch);
        sets.push(statement.bound.clone());
        let session = statement.session;
        let plan = statement.plan.clone();

        let mut total = 0i32;
        for set in &sets {
            let params = Self::bound_params(self.statement(handle)?, set)?;
            total = total.saturating_add(self.run(session, &plan, &params)?);
        }
        Ok(total)
    }
}

/// In-memory implementation of [`MimerApi`] for tests and benches.
pub struct MockMimer {
    api_version: String,
    calls: Mutex<HashMap<&'static str, usize>>,
    db: Mutex<Database>,
}

impl Default for MockMimer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMimer {
    pub fn new() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            calls: Mutex::new(HashMap::new()),
            db: Mutex::new(Database::new()),
        }
    }

    pub fn with_api_version(mut self, version: &str) -> Self {
        self.api_version = version.to_string();
        self
    }

    /// Only `user`/`password` may open sessions afterwards.
    pub fn with_login(self, user: &str, password: &str) -> Self {
        self.db().login = Some((user.to_string(), password.to_string()));
        self
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self, name: &'static str) {
        let mut calls = self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *calls.entry(name).or_insert(0) += 1;
    }

    /// Counts calls, applies injected failures and turns the outcome of `f`
    /// into a status recorded against `handle`.
    fn call<F>(&self, name: &'static str, handle: usize, f: F) -> i32
    where
        F: FnOnce(&mut Database) -> Outcome<i32>,
    {
        self.enter(name);
        let mut db = self.db();
        if let Some(code) = db.injected(name, handle) {
            return code;
        }
        match f(&mut db) {
            Ok(rc) => rc,
            Err(failure) => db.fail(handle, failure),
        }
    }

    pub fn calls(&self, name: &str) -> usize {
        let calls = self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        calls.get(name).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        let calls = self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        calls.values().sum()
    }

    pub fn reset_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Makes every later call of entry point `name` fail with `code`.
    pub fn fail_with(&self, name: &'static str, code: i32, message: &str) {
        self.db().failures.insert(name, failure(code, message));
    }

    pub fn clear_failures(&self) {
        self.db().failures.clear();
    }

    pub fn open_sessions(&self) -> usize {
        self.db().sessions.len()
    }

    pub fn open_statements(&self) -> usize {
        self.db().statements.len()
    }

    /// Committed row count of `table`.
    pub fn committed_rows(&self, table: &str) -> Option<usize> {
        self.db()
            .tables
            .get(&table.to_ascii_lowercase())
            .map(|t| t.rows.len())
    }
}

fn write_text(buf: &mut [u8], text: &[u8]) -> i32 {
    if let Some(room) = buf.len().checked_sub(1) {
        let n = text.len().min(room);
        buf[..n].copy_from_slice(&text[..n]);
        buf[n] = 0;
    }
    i32::try_from(text.len()).unwrap_or(i32::MAX)
}

impl MimerApi for MockMimer {
    fn api_version(&self) -> String {
        self.enter("MimerAPIVersion");
        self.api_version.clone()
    }

    fn begin_session(&self, _database: &CStr, user: &CStr, password: &CStr) -> (i32, Option<SessionHandle>) {
        self.enter("MimerBeginSession8");
        let mut db = self.db();
        if let Some((code, _)) = db.failures.get("MimerBeginSession8") {
            return (*code, None);
        }
        let user = user.to_string_lossy().into_owned();
        let password = password.to_string_lossy().into_owned();
        if let Some((expected_user, expected_password)) = &db.login {
            if *expected_user != user || *expected_password != password {
                return (LOGIN_REJECTED, None);
            }
        }
        let handle = db.allocate();
        let user = if user.is_empty() {
            "SYSADM".to_string()
        } else {
            user.to_ascii_uppercase()
        };
        db.sessions.insert(handle, Session { user, txn: None });
        (0, SessionHandle::from_raw(handle))
    }

    fn end_session(&self, session: SessionHandle) -> i32 {
        self.call("MimerEndSession", session.as_raw(), |db| {
            let handle = session.as_raw();
            db.sessions
                .remove(&handle)
                .ok_or_else(|| failure(INVALID_HANDLE, "Invalid session handle"))?;
            db.statements.retain(|_, s| s.session != handle);
            db.errors.remove(&handle);
            Ok(0)
        })
    }

    fn begin_transaction(&self, session: SessionHandle) -> i32 {
        self.call("MimerBeginTransaction", session.as_raw(), |db| {
            let s = db
                .sessions
                .get_mut(&session.as_raw())
                .ok_or_else(|| failure(INVALID_HANDLE, "Invalid session handle"))?;
            if s.txn.is_none() {
                s.txn = Some(Txn::default());
            }
            Ok(0)
        })
    }

    fn end_transaction(&self, session: SessionHandle, rollback: bool) -> i32 {
        self.call("MimerEndTransaction", session.as_raw(), |db| {
            let txn = db
                .sessions
                .get_mut(&session.as_raw())
                .ok_or_else(|| failure(INVALID_HANDLE, "Invalid session handle"))?
                .txn
                .take();
            match txn {
                Some(txn) if !rollback => db.commit(txn).map(|_| 0),
                _ => Ok(0),
            }
        })
    }

    fn begin_statement(&self, session: SessionHandle, sql: &CStr, _options: i32) -> (i32, Option<StatementHandle>) {
        let mut created = None;
        let rc = self.call("MimerBeginStatement8", session.as_raw(), |db| {
            db.session(session.as_raw())?;
            let text = sql.to_string_lossy();
            if mock_sql::is_ddl(&text) {
                return Ok(DDL_STATEMENT);
            }
            let parsed = mock_sql::parse(&text).map_err(|e| failure(SYNTAX_ERROR, e))?;
            let (plan, params, result_columns) = db.plan(parsed)?;
            let handle = db.allocate();
            db.statements.insert(
                handle,
                Statement {
                    session: session.as_raw(),
                    plan,
                    bound: vec![None; params.len()],
                    params,
                    batch: Vec::new(),
                    result_columns,
                    cursor: None,
                },
            );
            created = StatementHandle::from_raw(handle);
            Ok(0)
        });
        (rc, created)
    }

    fn end_statement(&self, statement: StatementHandle) -> i32 {
        self.call("MimerEndStatement", statement.as_raw(), |db| {
            let handle = statement.as_raw();
            db.statements
                .remove(&handle)
                .ok_or_else(|| failure(INVALID_HANDLE, "Invalid statement handle"))?;
            db.lobs
                .retain(|_, lob| !matches!(lob, Lob::Write { statement, .. } if *statement == handle));
            db.errors.remove(&handle);
            Ok(0)
        })
    }

    fn execute_statement(&self, session: SessionHandle, sql: &CStr) -> i32 {
        self.call("MimerExecuteStatement8", session.as_raw(), |db| {
            let text = sql.to_string_lossy();
            if mock_sql::is_ddl(&text) {
                return db.execute_ddl(session.as_raw(), &text).map(|_| 0);
            }
            db.session(session.as_raw())?;
            let parsed = mock_sql::parse(&text).map_err(|e| failure(SYNTAX_ERROR, e))?;
            let (plan, params, _) = db.plan(parsed)?;
            if !params.is_empty() {
                return Err(failure(PARAMETER_NOT_SET, "Parameter markers need a prepared statement"));
            }
            db.run(session.as_raw(), &plan, &[])
        })
    }

    fn open_cursor(&self, statement: StatementHandle) -> i32 {
        self.call("MimerOpenCursor", statement.as_raw(), |db| db.open_cursor(statement.as_raw()))
    }

    fn close_cursor(&self, statement: StatementHandle) -> i32 {
        self.call("MimerCloseCursor", statement.as_raw(), |db| {
            db.statement_mut(statement.as_raw())?.cursor = None;
            Ok(0)
        })
    }

    fn add_batch(&self, statement: StatementHandle) -> i32 {
        self.call("MimerAddBatch", statement.as_raw(), |db| {
            let s = db.statement_mut(statement.as_raw())?;
            let set = s.bound.clone();
            s.batch.push(set);
            Ok(0)
        })
    }

    fn execute(&self, statement: StatementHandle) -> i32 {
        self.call("MimerExecute", statement.as_raw(), |db| db.execute(statement.as_raw()))
    }

    fn fetch(&self, statement: StatementHandle) -> i32 {
        self.call("MimerFetch", statement.as_raw(), |db| {
            let s = db.statement_mut(statement.as_raw())?;
            let cursor = s
                .cursor
                .as_mut()
                .ok_or_else(|| failure(NO_CURRENT_ROW, "Cursor not open"))?;
            if cursor.next < cursor.rows.len() {
                cursor.current = Some(cursor.next);
                cursor.next += 1;
                Ok(0)
            } else {
                cursor.current = None;
                Ok(END_OF_SET)
            }
        })
    }

    fn parameter_count(&self, statement: StatementHandle) -> i32 {
        self.call("MimerParameterCount", statement.as_raw(), |db| {
            let count = db.statement(statement.as_raw())?.params.len();
            Ok(i32::try_from(count).unwrap_or(i32::MAX))
        })
    }

    fn parameter_type(&self, statement: StatementHandle, index: i16) -> i32 {
        self.call("MimerParameterType", statement.as_raw(), |db| {
            let s = db.statement(statement.as_raw())?;
            Ok(s.params[s.slot(index)?].column.type_code)
        })
    }

    fn parameter_name(&self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        self.call("MimerParameterName8", statement.as_raw(), |db| {
            let s = db.statement(statement.as_raw())?;
            let name = s.params[s.slot(index)?].name.clone().unwrap_or_default();
            Ok(write_text(buf, name.as_bytes()))
        })
    }

    fn column_count(&self, statement: StatementHandle) -> i32 {
        self.call("MimerColumnCount", statement.as_raw(), |db| {
            let count = db.statement(statement.as_raw())?.result_columns.len();
            Ok(i32::try_from(count).unwrap_or(i32::MAX))
        })
    }

    fn column_type(&self, statement: StatementHandle, index: i16) -> i32 {
        self.call("MimerColumnType", statement.as_raw(), |db| {
            Ok(db.statement(statement.as_raw())?.result_column(index)?.type_code)
        })
    }

    fn column_name(&self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        self.call("MimerColumnName8", statement.as_raw(), |db| {
            let column = db.statement(statement.as_raw())?.result_column(index)?;
            Ok(write_text(buf, column.name.as_bytes()))
        })
    }

    fn is_null(&self, statement: StatementHandle, index: i16) -> i32 {
        self.call("MimerIsNull", statement.as_raw(), |db| {
            let value = db.statement(statement.as_raw())?.current_value(index)?;
            Ok(i32::from(value.is_null()))
        })
    }

    fn get_int32(&self, statement: StatementHandle, index: i16, out: &mut i32) -> i32 {
        self.call("MimerGetInt32", statement.as_raw(), |db| {
            match db.statement(statement.as_raw())?.current_value(index)? {
                Value::Int(v) => *out = i32::try_from(*v).map_err(|_| too_large())?,
                other => return Err(failure(TYPE_MISMATCH, format!("Column holds {}", other.type_name()))),
            }
            Ok(0)
        })
    }

    fn get_int64(&self, statement: StatementHandle, index: i16, out: &mut i64) -> i32 {
        self.call("MimerGetInt64", statement.as_raw(), |db| {
            match db.statement(statement.as_raw())?.current_value(index)? {
                Value::Int(v) => *out = i64::try_from(*v).map_err(|_| too_large())?,
                other => return Err(failure(TYPE_MISMATCH, format!("Column holds {}", other.type_name()))),
            }
            Ok(0)
        })
    }

    fn get_double(&self, statement: StatementHandle, index: i16, out: &mut f64) -> i32 {
        self.call("MimerGetDouble", statement.as_raw(), |db| {
            match db.statement(statement.as_raw())?.current_value(index)? {
                Value::Double(v) => *out = *v,
                Value::Int(v) => *out = *v as f64,
                other => return Err(failure(TYPE_MISMATCH, format!("Column holds {}", other.type_name()))),
            }
            Ok(0)
        })
    }

    fn get_boolean(&self, statement: StatementHandle, index: i16) -> i32 {
        self.call("MimerGetBoolean", statement.as_raw(), |db| {
            match db.statement(statement.as_raw())?.current_value(index)? {
                Value::Bool(v) => Ok(i32::from(*v)),
                other => Err(failure(TYPE_MISMATCH, format!("Column holds {}", other.type_name()))),
            }
        })
    }

    fn get_string(&self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        self.call("MimerGetString8", statement.as_raw(), |db| {
            match db.statement(statement.as_raw())?.current_value(index)? {
                Value::Str(s) => Ok(write_text(buf, s.as_bytes())),
                Value::Int(v) => Ok(write_text(buf, v.to_string().as_bytes())),
                Value::Double(v) => Ok(write_text(buf, v.to_string().as_bytes())),
                other => Err(failure(TYPE_MISMATCH, format!("Column holds {}", other.type_name()))),
            }
        })
    }

    fn get_binary(&self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        self.call("MimerGetBinary", statement.as_raw(), |db| {
            match db.statement(statement.as_raw())?.current_value(index)? {
                Value::Bytes(b) => {
                    let n = b.len().min(buf.len());
                    buf[..n].copy_from_slice(&b[..n]);
                    Ok(i32::try_from(b.len()).unwrap_or(i32::MAX))
                }
                other => Err(failure(TYPE_MISMATCH, format!("Column holds {}", other.type_name()))),
            }
        })
    }

    fn get_lob(&self, statement: StatementHandle, index: i16, length: &mut usize, lob: &mut LobHandle) -> i32 {
        self.call("MimerGetLob", statement.as_raw(), |db| {
            let (data, len) = match db.statement(statement.as_raw())?.current_value(index)? {
                Value::Bytes(b) => (b.clone(), b.len()),
                Value::Str(s) => (s.as_bytes().to_vec(), s.chars().count()),
                other => return Err(failure(TYPE_MISMATCH, format!("Column holds {}", other.type_name()))),
            };
            let handle = db.allocate();
            db.lobs.insert(handle, Lob::Read { data, offset: 0 });
            *length = len;
            lob.0 = handle;
            Ok(0)
        })
    }

    fn get_blob_data(&self, lob: &mut LobHandle, buf: &mut [u8]) -> i32 {
        self.call("MimerGetBlobData", lob.0, |db| match db.lobs.get_mut(&lob.0) {
            Some(Lob::Read { data, offset }) => {
                let n = buf.len().min(data.len() - *offset);
                buf[..n].copy_from_slice(&data[*offset..*offset + n]);
                *offset += n;
                let remaining = data.len() - *offset;
                if remaining == 0 {
                    db.lobs.remove(&lob.0);
                }
                Ok(i32::try_from(remaining).unwrap_or(i32::MAX))
            }
            _ => Err(failure(INVALID_HANDLE, "Invalid LOB handle")),
        })
    }

    fn get_nclob_data(&self, lob: &mut LobHandle, buf: &mut [u8]) -> i32 {
        self.call("MimerGetNclobData8", lob.0, |db| match db.lobs.remove(&lob.0) {
            Some(Lob::Read { data, offset }) => {
                write_text(buf, &data[offset..]);
                Ok(0)
            }
            _ => Err(failure(INVALID_HANDLE, "Invalid LOB handle")),
        })
    }

    fn set_null(&self, statement: StatementHandle, index: i16) -> i32 {
        self.call("MimerSetNull", statement.as_raw(), |db| db.bind(statement.as_raw(), index, Value::Null))
    }

    fn set_int32(&self, statement: StatementHandle, index: i16, value: i32) -> i32 {
        self.call("MimerSetInt32", statement.as_raw(), |db| {
            db.bind(statement.as_raw(), index, Value::from(value))
        })
    }

    fn set_int64(&self, statement: StatementHandle, index: i16, value: i64) -> i32 {
        self.call("MimerSetInt64", statement.as_raw(), |db| {
            db.bind(statement.as_raw(), index, Value::from(value))
        })
    }

    fn set_double(&self, statement: StatementHandle, index: i16, value: f64) -> i32 {
        self.call("MimerSetDouble", statement.as_raw(), |db| {
            db.bind(statement.as_raw(), index, Value::Double(value))
        })
    }

    fn set_boolean(&self, statement: StatementHandle, index: i16, value: bool) -> i32 {
        self.call("MimerSetBoolean", statement.as_raw(), |db| {
            db.bind(statement.as_raw(), index, Value::Bool(value))
        })
    }

    unsafe fn set_string(&self, statement: StatementHandle, index: i16, value: &CStr) -> i32 {
        let text = value.to_string_lossy().into_owned();
        self.call("MimerSetString8", statement.as_raw(), |db| {
            db.bind(statement.as_raw(), index, Value::Str(text))
        })
    }

    unsafe fn set_binary(&self, statement: StatementHandle, index: i16, value: &[u8]) -> i32 {
        self.call("MimerSetBinary", statement.as_raw(), |db| {
            db.bind(statement.as_raw(), index, Value::Bytes(value.to_vec()))
        })
    }

    fn set_lob(&self, statement: StatementHandle, index: i16, length: usize, lob: &mut LobHandle) -> i32 {
        self.call("MimerSetLob", statement.as_raw(), |db| {
            let s = db.statement(statement.as_raw())?;
            let slot = s.slot(index)?;
            let column = &s.params[slot].column;
            if column.length.is_some_and(|limit| length > limit) {
                return Err(too_large());
            }
            let text = text_type(column.type_code);
            let empty = if text { Value::Str(String::new()) } else { Value::Bytes(Vec::new()) };
            db.bind(statement.as_raw(), index, empty)?;
            let handle = db.allocate();
            db.lobs.insert(
                handle,
                Lob::Write {
                    statement: statement.as_raw(),
                    slot,
                    data: Vec::with_capacity(length),
                    text,
                },
            );
            lob.0 = handle;
            Ok(0)
        })
    }

    unsafe fn set_blob_data(&self, lob: &mut LobHandle, data: &[u8]) -> i32 {
        self.call("MimerSetBlobData", lob.0, |db| {
            let (statement, slot, value) = match db.lobs.get_mut(&lob.0) {
                Some(Lob::Write {
                    statement,
                    slot,
                    data: acc,
                    text: false,
                }) => {
                    acc.extend_from_slice(data);
                    (*statement, *slot, Value::Bytes(acc.clone()))
                }
                _ => return Err(failure(INVALID_HANDLE, "Invalid LOB handle")),
            };
            db.statement_mut(statement)?.bound[slot] = Some(value);
            Ok(0)
        })
    }

    unsafe fn set_nclob_data(&self, lob: &mut LobHandle, data: &CStr) -> i32 {
        self.call("MimerSetNclobData8", lob.0, |db| {
            let (statement, slot, value) = match db.lobs.get_mut(&lob.0) {
                Some(Lob::Write {
                    statement,
                    slot,
                    data: acc,
                    text: true,
                }) => {
                    acc.extend_from_slice(data.to_bytes());
                    let text = String::from_utf8_lossy(acc).into_owned();
                    (*statement, *slot, Value::Str(text))
                }
                _ => return Err(failure(INVALID_HANDLE, "Invalid LOB handle")),
            };
            db.statement_mut(statement)?.bound[slot] = Some(value);
            Ok(0)
        })
    }

    fn get_error(&self, handle: NativeHandle, code: &mut i32, buf: &mut [u8]) -> i32 {
        self.enter("MimerGetError8");
        let db = self.db();
        match db.errors.get(&handle.as_raw()) {
            Some((stored, message)) => {
                *code = *stored;
                write_text(buf, message.as_bytes())
            }
            None => INVALID_HANDLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn c(text: &str) -> CString {
        CString::new(text).expect("no interior NUL")
    }

    fn open(mock: &MockMimer) -> SessionHandle {
        let (rc, session) = mock.begin_session(&c("db"), &c("mimerpy"), &c("pw"));
        assert_eq!(rc, 0);
        session.expect("session")
    }

    fn exec(mock: &MockMimer, session: SessionHandle, sql: &str) -> i32 {
        mock.execute_statement(session, &c(sql))
    }

    #[test]
    fn test_ddl_is_reported_on_prepare() {
        let mock = MockMimer::new();
        let s = open(&mock);
        let (rc, stmt) = mock.begin_statement(s, &c("create table t(c1 int)"), 0);
        assert_eq!(rc, DDL_STATEMENT);
        assert!(stmt.is_none());
    }

    #[test]
    fn test_ddl_leaves_transaction_open() {
        let mock = MockMimer::new();
        let s = open(&mock);
        assert_eq!(mock.begin_transaction(s), 0);
        assert_eq!(exec(&mock, s, "create table t(c1 int)"), 0);
        assert_eq!(exec(&mock, s, "insert into t values (1)"), 1);
        assert_eq!(exec(&mock, s, "create table u(c1 int)"), DDL_AFTER_DML);
        assert_eq!(mock.end_transaction(s, true), 0);
        assert_eq!(mock.committed_rows("t"), Some(0));
    }

    #[test]
    fn test_first_committer_wins() {
        let mock = MockMimer::new();
        let setup = open(&mock);
        assert_eq!(exec(&mock, setup, "create table t(c1 int primary key, c2 int)"), 0);
        assert_eq!(exec(&mock, setup, "insert into t values (1, 1)"), 1);

        let a = open(&mock);
        let b = open(&mock);
        mock.begin_transaction(a);
        mock.begin_transaction(b);
        assert_eq!(exec(&mock, a, "update t set c2 = 2 where c1 = 1"), 1);
        assert_eq!(exec(&mock, b, "update t set c2 = 3 where c1 = 1"), 1);
        assert_eq!(mock.end_transaction(a, false), 0);
        assert_eq!(mock.end_transaction(b, false), TRANSACTION_CONFLICT);

        let mut code = 0;
        let mut buf = [0u8; 128];
        let len = mock.get_error(NativeHandle::Session(b), &mut code, &mut buf);
        assert_eq!(code, TRANSACTION_CONFLICT);
        assert_eq!(&buf[..len as usize], CONFLICT_MESSAGE.as_bytes());
    }

    #[test]
    fn test_drop_blocked_by_other_writer() {
        let mock = MockMimer::new();
        let setup = open(&mock);
        exec(&mock, setup, "create table conflict_test2 (int1 integer, int2 integer)");

        let writer = open(&mock);
        mock.begin_transaction(writer);
        assert_eq!(exec(&mock, writer, "insert into conflict_test2 values (200, 200)"), 1);

        let dropper = open(&mock);
        assert_eq!(exec(&mock, dropper, "drop table conflict_test2 cascade"), TABLE_LOCKED);
        let mut code = 0;
        let mut buf = [0u8; 128];
        let len = mock.get_error(NativeHandle::Session(dropper), &mut code, &mut buf);
        assert_eq!(
            std::str::from_utf8(&buf[..len as usize]).expect("utf8"),
            "Table MIMERPY.conflict_test2 locked by another user"
        );
    }

    #[test]
    fn test_smallint_range_is_enforced() {
        let mock = MockMimer::new();
        let s = open(&mock);
        exec(&mock, s, "create table t(c1 smallint)");
        let (rc, stmt) = mock.begin_statement(s, &c("insert into t values (?)"), 0);
        assert_eq!(rc, 0);
        let stmt = stmt.expect("statement");
        assert_eq!(mock.set_int32(stmt, 1, 32767), 0);
        assert_eq!(mock.set_int32(stmt, 1, 32768), VALUE_TOO_LARGE);
    }

    #[test]
    fn test_injected_failure_and_counters() {
        let mock = MockMimer::new();
        let s = open(&mock);
        mock.fail_with("MimerBeginTransaction", -18001, "Server gone");
        assert_eq!(mock.begin_transaction(s), -18001);
        mock.clear_failures();
        assert_eq!(mock.begin_transaction(s), 0);
        assert_eq!(mock.calls("MimerBeginTransaction"), 2);
        assert_eq!(mock.calls("MimerBeginSession8"), 1);
    }

    #[test]
    fn test_login_is_checked() {
        let mock = MockMimer::new().with_login("mimerpy", "secret");
        let (rc, session) = mock.begin_session(&c("db"), &c("mimerpy"), &c("wrong"));
        assert_eq!(rc, LOGIN_REJECTED);
        assert!(session.is_none());
        assert_eq!(mock.open_sessions(), 0);
    }
}
