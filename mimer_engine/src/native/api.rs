use std::ffi::CStr;

/// Status returned by every successful native call.
pub const SUCCESS: i32 = 0;
/// `begin_statement` status for a data definition statement. The returned
/// handle is unusable; the text must go through `execute_statement`.
pub const DDL_STATEMENT: i32 = -24005;
/// `fetch` status once the result set is exhausted.
pub const END_OF_SET: i32 = 100;

/// Statement option for a forward-only cursor.
pub const FORWARD_ONLY: i32 = 0;
/// Statement option for a scrollable cursor.
pub const SCROLLABLE: i32 = 1;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(usize);

        impl $name {
            /// Wraps a raw handle value; `0` is the null handle.
            pub fn from_raw(raw: usize) -> Option<Self> {
                (raw != 0).then_some(Self(raw))
            }

            pub fn as_raw(self) -> usize {
                self.0
            }
        }
    };
}

opaque_handle!(
    /// Authenticated session with a database server.
    SessionHandle
);
opaque_handle!(
    /// Prepared statement created from a session.
    StatementHandle
);

/// Large object locator. Zero until `get_lob`/`set_lob` fills it in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LobHandle(pub usize);

/// Handle whose most recent error the library can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeHandle {
    Session(SessionHandle),
    Statement(StatementHandle),
}

impl NativeHandle {
    pub fn as_raw(self) -> usize {
        match self {
            NativeHandle::Session(handle) => handle.as_raw(),
            NativeHandle::Statement(handle) => handle.as_raw(),
        }
    }
}

/// Entry points of the Mimer SQL C API.
///
/// Every call returns the library's own status code: negative on failure,
/// zero or a call-specific non-negative value on success. Nothing here raises;
/// interpretation is left to the caller.
///
/// Variable-length getters write into `buf` and return the full length of the
/// value in bytes, so a return value that does not fit tells the caller to
/// retry with a larger buffer. String getters NUL-terminate within `buf`.
pub trait MimerApi: Send + Sync {
    /// Version string of the loaded library, e.g. `11.0.7A`.
    fn api_version(&self) -> String;

    fn begin_session(
        &self,
        database: &CStr,
        user: &CStr,
        password: &CStr,
    ) -> (i32, Option<SessionHandle>);
    fn end_session(&self, session: SessionHandle) -> i32;

    fn begin_transaction(&self, session: SessionHandle) -> i32;
    fn end_transaction(&self, session: SessionHandle, rollback: bool) -> i32;

    fn begin_statement(
        &self,
        session: SessionHandle,
        sql: &CStr,
        options: i32,
    ) -> (i32, Option<StatementHandle>);
    fn end_statement(&self, statement: StatementHandle) -> i32;
    fn execute_statement(&self, session: SessionHandle, sql: &CStr) -> i32;
    fn open_cursor(&self, statement: StatementHandle) -> i32;
    fn close_cursor(&self, statement: StatementHandle) -> i32;
    fn add_batch(&self, statement: StatementHandle) -> i32;
    fn execute(&self, statement: StatementHandle) -> i32;
    fn fetch(&self, statement: StatementHandle) -> i32;

    fn parameter_count(&self, statement: StatementHandle) -> i32;
    fn parameter_type(&self, statement: StatementHandle, index: i16) -> i32;
    fn parameter_name(&self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32;
    fn column_count(&self, statement: StatementHandle) -> i32;
    fn column_type(&self, statement: StatementHandle, index: i16) -> i32;
    fn column_name(&self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32;

    /// Returns `1` when the column of the current row is NULL, `0` otherwise.
    fn is_null(&self, statement: StatementHandle, index: i16) -> i32;
    fn get_int32(&self, statement: StatementHandle, index: i16, value: &mut i32) -> i32;
    fn get_int64(&self, statement: StatementHandle, index: i16, value: &mut i64) -> i32;
    fn get_double(&self, statement: StatementHandle, index: i16, value: &mut f64) -> i32;
    /// Returns `0` for false and a positive value for true.
    fn get_boolean(&self, statement: StatementHandle, index: i16) -> i32;
    fn get_string(&self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32;
    fn get_binary(&self, statement: StatementHandle, index: i16, buf: &mut [u8]) -> i32;
    /// Opens a LOB locator for reading. `length` receives bytes for binary
    /// LOBs and characters for character LOBs.
    fn get_lob(
        &self,
        statement: StatementHandle,
        index: i16,
        length: &mut usize,
        lob: &mut LobHandle,
    ) -> i32;
    /// Reads the next `buf.len()` bytes of a BLOB.
    fn get_blob_data(&self, lob: &mut LobHandle, buf: &mut [u8]) -> i32;
    /// Reads an NCLOB as UTF-8 into `buf`, NUL-terminated.
    fn get_nclob_data(&self, lob: &mut LobHandle, buf: &mut [u8]) -> i32;

    fn set_null(&self, statement: StatementHandle, index: i16) -> i32;
    fn set_int32(&self, statement: StatementHandle, index: i16, value: i32) -> i32;
    fn set_int64(&self, statement: StatementHandle, index: i16, value: i64) -> i32;
    fn set_double(&self, statement: StatementHandle, index: i16, value: f64) -> i32;
    fn set_boolean(&self, statement: StatementHandle, index: i16, value: bool) -> i32;
    /// Binds a string parameter.
    ///
    /// # Safety
    ///
    /// The library may keep a pointer into `value` until the statement is
    /// executed, re-prepared or ended. `value` must stay allocated and
    /// unmodified until then.
    unsafe fn set_string(&self, statement: StatementHandle, index: i16, value: &CStr) -> i32;
    /// Binds a binary parameter.
    ///
    /// # Safety
    ///
    /// Same contract as [`MimerApi::set_string`].
    unsafe fn set_binary(&self, statement: StatementHandle, index: i16, value: &[u8]) -> i32;
    /// Opens a LOB locator for a parameter of `length` bytes.
    fn set_lob(
        &self,
        statement: StatementHandle,
        index: i16,
        length: usize,
        lob: &mut LobHandle,
    ) -> i32;
    /// Sends the next chunk of a BLOB parameter.
    ///
    /// # Safety
    ///
    /// Same contract as [`MimerApi::set_string`].
    unsafe fn set_blob_data(&self, lob: &mut LobHandle, data: &[u8]) -> i32;
    /// Sends the UTF-8 payload of an NCLOB parameter.
    ///
    /// # Safety
    ///
    /// Same contract as [`MimerApi::set_string`].
    unsafe fn set_nclob_data(&self, lob: &mut LobHandle, data: &CStr) -> i32;

    /// Describes the most recent error on `handle`. Writes the message into
    /// `buf`, the native error code into `code`, and returns the message
    /// length or a negative status if the lookup itself failed.
    fn get_error(&self, handle: NativeHandle, code: &mut i32, buf: &mut [u8]) -> i32;
}
