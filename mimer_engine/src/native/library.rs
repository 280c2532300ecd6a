use super::api::{LobHandle, MimerApi, NativeHandle, SessionHandle, StatementHandle};
use super::loader;
use crate::error::{MimerError, Result};
use libloading::Library;
use std::ffi::{c_char, c_void, CStr};
use std::path::{Path, PathBuf};
use std::ptr;

type RawSession = *mut c_void;
type RawStatement = *mut c_void;
type RawLob = *mut c_void;

type StatementCall = unsafe extern "C" fn(RawStatement) -> i32;
type IndexCall = unsafe extern "C" fn(RawStatement, i16) -> i32;
type NameCall = unsafe extern "C" fn(RawStatement, i16, *mut c_char, usize) -> i32;

struct Symbols {
    api_version: unsafe extern "C" fn() -> *const c_char,
    begin_session: unsafe extern "C" fn(*const c_char, *const c_char, *const c_char, *mut RawSession) -> i32,
    end_session: unsafe extern "C" fn(*mut RawSession) -> i32,
    begin_transaction: unsafe extern "C" fn(RawSession, i32) -> i32,
    end_transaction: unsafe extern "C" fn(RawSession, i32) -> i32,
    begin_statement: unsafe extern "C" fn(RawSession, *const c_char, i32, *mut RawStatement) -> i32,
    end_statement: unsafe extern "C" fn(*mut RawStatement) -> i32,
    execute_statement: unsafe extern "C" fn(RawSession, *const c_char) -> i32,
    open_cursor: StatementCall,
    close_cursor: StatementCall,
    add_batch: StatementCall,
    execute: StatementCall,
    fetch: StatementCall,
    parameter_count: StatementCall,
    parameter_type: IndexCall,
    parameter_name: NameCall,
    column_count: StatementCall,
    column_type: IndexCall,
    column_name: NameCall,
    is_null: IndexCall,
    get_int32: unsafe extern "C" fn(RawStatement, i16, *mut i32) -> i32,
    get_int64: unsafe extern "C" fn(RawStatement, i16, *mut i64) -> i32,
    get_double: unsafe extern "C" fn(RawStatement, i16, *mut f64) -> i32,
    get_boolean: IndexCall,
    get_string: NameCall,
    get_binary: unsafe extern "C" fn(RawStatement, i16, *mut c_void, usize) -> i32,
    get_lob: unsafe extern "C" fn(RawStatement, i16, *mut usize, *mut RawLob) -> i32,
    get_blob_data: unsafe extern "C" fn(*mut RawLob, *mut c_void, usize) -> i32,
    get_nclob_data: unsafe extern "C" fn(*mut RawLob, *mut c_char, usize) -> i32,
    set_null: IndexCall,
    set_int32: unsafe extern "C" fn(RawStatement, i16, i32) -> i32,
    set_int64: unsafe extern "C" fn(RawStatement, i16, i64) -> i32,
    set_double: unsafe extern "C" fn(RawStatement, i16, f64) -> i32,
    set_boolean: unsafe extern "C" fn(RawStatement, i16, i32) -> i32,
    set_string: unsafe extern "C" fn(RawStatement, i16, *const c_char) -> i32,
    set_binary: unsafe extern "C" fn(RawStatement, i16, *const c_void, usize) -> i32,
    set_lob: unsafe extern "C" fn(RawStatement, i16, usize, *mut RawLob) -> i32,
    set_blob_data: unsafe extern "C" fn(*mut RawLob, *const c_void, usize) -> i32,
    set_nclob_data: unsafe extern "C" fn(*mut RawLob, *const c_char, usize) -> i32,
    get_error: unsafe extern "C" fn(*mut c_void, *mut i32, *mut c_char, usize) -> i32,
}

macro_rules! resolve {
    ($lib:expr, $name:literal) => {{
        let symbol = $lib
            .get(concat!($name, "\0").as_bytes())
            .map_err(|e| MimerError::LibraryLoad(format!("missing symbol {}: {}", $name, e)))?;
        *symbol
    }};
}

impl Symbols {
    /// # Safety
    ///
    /// `lib` must be the Mimer API library so that each symbol has the
    /// signature declared in [`Symbols`].
    unsafe fn resolve(lib: &Library) -> Result<Self> {
        Ok(Self {
            api_version: resolve!(lib, "MimerAPIVersion"),
            begin_session: resolve!(lib, "MimerBeginSession8"),
            end_session: resolve!(lib, "MimerEndSession"),
            begin_transaction: resolve!(lib, "MimerBeginTransaction"),
            end_transaction: resolve!(lib, "MimerEndTransaction"),
            begin_statement: resolve!(lib, "MimerBeginStatement8"),
            end_statement: resolve!(lib, "MimerEndStatement"),
            execute_statement: resolve!(lib, "MimerExecuteStatement8"),
            open_cursor: resolve!(lib, "MimerOpenCursor"),
            close_cursor: resolve!(lib, "MimerCloseCursor"),
            add_batch: resolve!(lib, "MimerAddBatch"),
            execute: resolve!(lib, "MimerExecute"),
            fetch: resolve!(lib, "MimerFetch"),
            parameter_count: resolve!(lib, "MimerParameterCount"),
            parameter_type: resolve!(lib, "MimerParameterType"),
            parameter_name: resolve!(lib, "MimerParameterName8"),
            column_count: resolve!(lib, "MimerColumnCount"),
            column_type: resolve!(lib, "MimerColumnType"),
            column_name: resolve!(lib, "MimerColumnName8"),
            is_null: resolve!(lib, "MimerIsNull"),
            get_int32: resolve!(lib, "MimerGetInt32"),
            get_int64: resolve!(lib, "MimerGetInt64"),
            get_double: resolve!(lib, "MimerGetDouble"),
            get_boolean: resolve!(lib, "MimerGetBoolean"),
            get_string: resolve!(lib, "MimerGetString8"),
            get_binary: resolve!(lib, "MimerGetBinary"),
            get_lob: resolve!(lib, "MimerGetLob"),
            get_blob_data: resolve!(lib, "MimerGetBlobData"),
            get_nclob_data: resolve!(lib, "MimerGetNclobData8"),
            set_null: resolve!(lib, "MimerSetNull"),
            set_int32: resolve!(lib, "MimerSetInt32"),
            set_int64: resolve!(lib, "MimerSetInt64"),
            set_double: resolve!(lib, "MimerSetDouble"),
            set_boolean: resolve!(lib, "MimerSetBoolean"),
            set_string: resolve!(lib, "MimerSetString8"),
            set_binary: resolve!(lib, "MimerSetBinary"),
            set_lob: resolve!(lib, "MimerSetLob"),
            set_blob_data: resolve!(lib, "MimerSetBlobData"),
            set_nclob_data: resolve!(lib, "MimerSetNclobData8"),
            get_error: resolve!(lib, "MimerGetError8"),
        })
    }
}

/// The Mimer API shared library, loaded at runtime.
///
/// Symbols are resolved once on load; the `Library` is kept alive for as long
/// as the function pointers can be called.
pub struct MimerLibrary {
    symbols: Symbols,
    path: PathBuf,
    _library: Library,
}

impl MimerLibrary {
    pub fn load(path: &Path) -> Result<Self> {
        // SAFETY: loading the Mimer API runs no initialisers with
        // preconditions on the caller.
        let library = unsafe { Library::new(path) }
            .map_err(|e| MimerError::LibraryLoad(format!("{}: {}", path.display(), e)))?;
        // SAFETY: the symbol table matches the Mimer API C declarations.
        let symbols = unsafe { Symbols::resolve(&library) }?;
        log::debug!("Loaded Mimer API from {}", path.display());
        Ok(Self {
            symbols,
            path: path.to_path_buf(),
            _library: library,
        })
    }

    /// Loads from `explicit`, else `MIMERAPI_PATH`, else the platform's
    /// conventional library names, returning the first that loads.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let mut failures = Vec::new();
        for candidate in loader::candidate_paths(explicit) {
            match Self::load(&candidate) {
                Ok(library) => return Ok(library),
                Err(e) => failures.push(e.to_string()),
            }
        }
        Err(MimerError::LibraryLoad(format!(
            "Mimer API library not found ({})",
            failures.join("; ")
        )))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn session_ptr(session: SessionHandle) -> RawSession {
    session.as_raw() as RawSession
}

fn statement_ptr(statement: StatementHandle) -> RawStatement {
    statement.as_raw() as RawStatement
}

impl MimerApi for MimerLibrary {
    fn api_version(&self) -> String {
        // SAFETY: returns a static NUL-terminated string or null.
        let raw = unsafe { (self.symbols.api_version)() };
        if raw.is_null() {
            return String::new();
        }
        // SAFETY: non-null pointer to a static C string owned by the library.
        unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned()
    }

    fn begin_session(
        &self,
        database: &CStr,
        user: &CStr,
        password: &CStr,
    ) -> (i32, Option<SessionHandle>) {
        let mut raw: RawSession = ptr::null_mut();
        // SAFETY: all strings are NUL-terminated and outlive the call.
        let rc = unsafe {
            (self.symbols.begin_session)(database.as_ptr(), user.as_ptr(), password.as_ptr(), &mut raw)
        };
        (rc, SessionHandle::from_raw(raw as usize))
    }

    fn end_session(&self, session: SessionHandle) -> i32 {
        let mut raw = session_ptr(session);
        // SAFETY: `session` came from `begin_session` and is ended once.
        unsafe { (self.symbols.end_session)(&mut raw) }
    }

    fn begin_transaction(&self, session: SessionHandle) -> i32 {
        // SAFETY: live session handle.
        unsafe { (self.symbols.begin_transaction)(session_ptr(session), 0) }
    }

    fn end_transaction(&self, session: SessionHandle, rollback: bool) -> i32 {
        // SAFETY: live session handle.
        unsafe { (self.symbols.end_transaction)(session_ptr(session), i32::from(rollback)) }
    }

    fn begin_statement(
        &self,
        session: SessionHandle,
        sql: &CStr,
        options: i32,
    ) -> (i32, Option<StatementHandle>) {
        let mut raw: RawStatement = ptr::null_mut();
        // SAFETY: live session handle, NUL-terminated SQL text.
        let rc = unsafe {
            (self.symbols.begin_statement)(session_ptr(session), sql.as_ptr(), options, &mut raw)
        };
        (rc, StatementHandle::from_raw(raw as usize))
    }

    fn end_statement(&self, statement: StatementHandle) -> i32 {
        let mut raw = statement_ptr(statement);
        // SAFETY: `statement` came from `begin_statement` and is ended once.
        unsafe { (self.symbols.end_statement)(&mut raw) }
    }

    fn execute_statement(&self, session: SessionHandle, sql: &CStr) -> i32 {
        // SAFETY: live session handle, NUL-terminated SQL text.
        unsafe { (self.symbols.execute_statement)(session_ptr(session), sql.as_ptr()) }
    }

    fn open_cursor(&self, statement: StatementHandle) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.open_cursor)(statement_ptr(statement)) }
    }

    fn close_cursor(&self, statement: StatementHandle) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.close_cursor)(statement_ptr(statement)) }
    }

    fn add_batch(&self, statement: StatementHandle) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.add_batch)(statement_ptr(statement)) }
    }

    fn execute(&self, statement: StatementHandle) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.execute)(statement_ptr(statement)) }
    }

    fn fetch(&self, statement: StatementHandle) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.fetch)(statement_ptr(statement)) }
    }

    fn parameter_count(&self, statement: StatementHandle) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.parameter_count)(statement_ptr(statement)) }
    }

    fn parameter_type(&self, statement: StatementHandle, index: i16) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.parameter_type)(statement_ptr(statement), index) }
    }

    fn parameter_name(&self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        // SAFETY: `buf` is writable for `buf.len()` bytes.
        unsafe {
            (self.symbols.parameter_name)(statement_ptr(statement), index, buf.as_mut_ptr().cast(), buf.len())
        }
    }

    fn column_count(&self, statement: StatementHandle) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.column_count)(statement_ptr(statement)) }
    }

    fn column_type(&self, statement: StatementHandle, index: i16) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.column_type)(statement_ptr(statement), index) }
    }

    fn column_name(&self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        // SAFETY: `buf` is writable for `buf.len()` bytes.
        unsafe {
            (self.symbols.column_name)(statement_ptr(statement), index, buf.as_mut_ptr().cast(), buf.len())
        }
    }

    fn is_null(&self, statement: StatementHandle, index: i16) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.is_null)(statement_ptr(statement), index) }
    }

    fn get_int32(&self, statement: StatementHandle, index: i16, value: &mut i32) -> i32 {
        // SAFETY: `value` is a valid out pointer.
        unsafe { (self.symbols.get_int32)(statement_ptr(statement), index, value) }
    }

    fn get_int64(&self, statement: StatementHandle, index: i16, value: &mut i64) -> i32 {
        // SAFETY: `value` is a valid out pointer.
        unsafe { (self.symbols.get_int64)(statement_ptr(statement), index, value) }
    }

    fn get_double(&self, statement: StatementHandle, index: i16, value: &mut f64) -> i32 {
        // SAFETY: `value` is a valid out pointer.
        unsafe { (self.symbols.get_double)(statement_ptr(statement), index, value) }
    }

    fn get_boolean(&self, statement: StatementHandle, index: i16) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.get_boolean)(statement_ptr(statement), index) }
    }

    fn get_string(&self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        // SAFETY: `buf` is writable for `buf.len()` bytes.
        unsafe {
            (self.symbols.get_string)(statement_ptr(statement), index, buf.as_mut_ptr().cast(), buf.len())
        }
    }

    fn get_binary(&self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32 {
        // SAFETY: `buf` is writable for `buf.len()` bytes.
        unsafe {
            (self.symbols.get_binary)(statement_ptr(statement), index, buf.as_mut_ptr().cast(), buf.len())
        }
    }

    fn get_lob(
        &self,
        statement: StatementHandle,
        index: i16,
        length: &mut usize,
        lob: &mut LobHandle,
    ) -> i32 {
        let mut raw = lob.0 as RawLob;
        // SAFETY: out pointers are valid for the duration of the call.
        let rc = unsafe { (self.symbols.get_lob)(statement_ptr(statement), index, length, &mut raw) };
        lob.0 = raw as usize;
        rc
    }

    fn get_blob_data(&self, lob: &mut LobHandle, buf: &mut [u8]) -> i32 {
        let mut raw = lob.0 as RawLob;
        // SAFETY: `buf` is writable for `buf.len()` bytes.
        let rc = unsafe { (self.symbols.get_blob_data)(&mut raw, buf.as_mut_ptr().cast(), buf.len()) };
        lob.0 = raw as usize;
        rc
    }

    fn get_nclob_data(&self, lob: &mut LobHandle, buf: &mut [u8]) -> i32 {
        let mut raw = lob.0 as RawLob;
        // SAFETY: `buf` is writable for `buf.len()` bytes.
        let rc = unsafe { (self.symbols.get_nclob_data)(&mut raw, buf.as_mut_ptr().cast(), buf.len()) };
        lob.0 = raw as usize;
        rc
    }

    fn set_null(&self, statement: StatementHandle, index: i16) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.set_null)(statement_ptr(statement), index) }
    }

    fn set_int32(&self, statement: StatementHandle, index: i16, value: i32) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.set_int32)(statement_ptr(statement), index, value) }
    }

    fn set_int64(&self, statement: StatementHandle, index: i16, value: i64) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.set_int64)(statement_ptr(statement), index, value) }
    }

    fn set_double(&self, statement: StatementHandle, index: i16, value: f64) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.set_double)(statement_ptr(statement), index, value) }
    }

    fn set_boolean(&self, statement: StatementHandle, index: i16, value: bool) -> i32 {
        // SAFETY: live statement handle.
        unsafe { (self.symbols.set_boolean)(statement_ptr(statement), index, i32::from(value)) }
    }

    unsafe fn set_string(&self, statement: StatementHandle, index: i16, value: &CStr) -> i32 {
        (self.symbols.set_string)(statement_ptr(statement), index, value.as_ptr())
    }

    unsafe fn set_binary(&self, statement: StatementHandle, index: i16, value: &[u8]) -> i32 {
        (self.symbols.set_binary)(statement_ptr(statement), index, value.as_ptr().cast(), value.len())
    }

    fn set_lob(
        &self,
        statement: StatementHandle,
        index: i16,
        length: usize,
        lob: &mut LobHandle,
    ) -> i32 {
        let mut raw = lob.0 as RawLob;
        // SAFETY: `raw` is a valid out pointer.
        let rc = unsafe { (self.symbols.set_lob)(statement_ptr(statement), index, length, &mut raw) };
        lob.0 = raw as usize;
        rc
    }

    unsafe fn set_blob_data(&self, lob: &mut LobHandle, data: &[u8]) -> i32 {
        let mut raw = lob.0 as RawLob;
        let rc = (self.symbols.set_blob_data)(&mut raw, data.as_ptr().cast(), data.len());
        lob.0 = raw as usize;
        rc
    }

    unsafe fn set_nclob_data(&self, lob: &mut LobHandle, data: &CStr) -> i32 {
        let mut raw = lob.0 as RawLob;
        let rc = (self.symbols.set_nclob_data)(&mut raw, data.as_ptr(), data.to_bytes().len());
        lob.0 = raw as usize;
        rc
    }

    fn get_error(&self, handle: NativeHandle, code: &mut i32, buf: &mut [u8]) -> i32 {
        // SAFETY: live handle, out pointers valid for the call.
        unsafe {
            (self.symbols.get_error)(handle.as_raw() as *mut c_void, code, buf.as_mut_ptr().cast(), buf.len())
        }
    }
}
