use super::api::StatementHandle;
use std::collections::HashMap;
use std::ffi::CStr;

/// Owns every buffer handed to the native library for a bound parameter.
///
/// The library keeps raw pointers into bound strings, binary values and LOB
/// chunks until the statement is executed again, re-prepared or ended, so each
/// buffer is filed under its statement handle and only freed by
/// [`BindArena::release`]. Buffers are boxed slices: moving the box into the
/// arena never moves the bytes the library points at.
#[derive(Debug, Default)]
pub struct BindArena {
    buffers: HashMap<StatementHandle, Vec<Box<[u8]>>>,
}

impl BindArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `bytes` into the arena and returns the pinned copy.
    pub fn keep(&mut self, statement: StatementHandle, bytes: Vec<u8>) -> &[u8] {
        let list = self.buffers.entry(statement).or_default();
        list.push(bytes.into_boxed_slice());
        list.last().map(|buffer| &**buffer).unwrap_or(&[])
    }

    /// Stores `text` NUL-terminated. Returns `None` when `text` contains an
    /// interior NUL and cannot be passed as a C string.
    pub fn keep_cstr(&mut self, statement: StatementHandle, text: &str) -> Option<&CStr> {
        if text.as_bytes().contains(&0) {
            return None;
        }
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        let kept = self.keep(statement, bytes);
        CStr::from_bytes_with_nul(kept).ok()
    }

    /// Frees every buffer filed under `statement`. Called exactly when the
    /// statement is ended or its handle is handed out again by a prepare.
    pub fn release(&mut self, statement: StatementHandle) -> usize {
        let released = self
            .buffers
            .remove(&statement)
            .map(|list| list.len())
            .unwrap_or(0);
        if released > 0 {
            log::trace!(
                "Released {} bind buffers of statement {:#x}",
                released,
                statement.as_raw()
            );
        }
        released
    }

    pub fn live_buffers(&self, statement: StatementHandle) -> usize {
        self.buffers.get(&statement).map(Vec::len).unwrap_or(0)
    }

    pub fn total_bytes(&self) -> usize {
        self.buffers
            .values()
            .flat_map(|list| list.iter())
            .map(|buffer| buffer.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
