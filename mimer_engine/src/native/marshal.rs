//! Conversion of values across the native boundary.
//!
//! Functions here return the native status as the error side of a
//! [`NativeResult`]; they never build taxonomy errors themselves.

use super::api::{LobHandle, MimerApi, NativeHandle, StatementHandle};
use super::arena::BindArena;
use super::types::Accessor;
use crate::error::codes::{DATA_CONVERSION, OUT_OF_MEMORY};
use crate::protocol::Value;

/// Result of a native call: the value, or the failing status code.
pub type NativeResult<T> = std::result::Result<T, i32>;

/// First buffer size tried by string and binary getters.
pub const PROBE_LEN: usize = 1024;
/// First buffer size tried for column, parameter and error names.
pub const NAME_PROBE_LEN: usize = 128;
/// Chunk size for streaming LOB payloads in either direction.
pub const LOB_CHUNK_SIZE: usize = 100_000;

pub fn check(rc: i32) -> NativeResult<i32> {
    if rc < 0 {
        Err(rc)
    } else {
        Ok(rc)
    }
}

fn len_of(rc: i32) -> usize {
    usize::try_from(rc).unwrap_or(0)
}

fn alloc(len: usize) -> NativeResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| OUT_OF_MEMORY)?;
    buf.resize(len, 0);
    Ok(buf)
}

fn utf8(bytes: Vec<u8>) -> NativeResult<String> {
    String::from_utf8(bytes).map_err(|_| DATA_CONVERSION)
}

/// Reads NUL-terminated text, retrying once with an exact buffer when the
/// reported length does not fit the probe.
pub fn read_text<F>(probe: usize, mut read: F) -> NativeResult<String>
where
    F: FnMut(&mut [u8]) -> i32,
{
    let mut buf = alloc(probe)?;
    let mut len = len_of(check(read(&mut buf))?);
    if len >= probe {
        buf = alloc(len + 1)?;
        len = len_of(check(read(&mut buf))?).min(buf.len() - 1);
    }
    buf.truncate(len);
    utf8(buf)
}

/// Reads raw bytes, retrying once when the value is longer than the probe.
pub fn read_bytes<F>(probe: usize, mut read: F) -> NativeResult<Vec<u8>>
where
    F: FnMut(&mut [u8]) -> i32,
{
    let mut buf = alloc(probe)?;
    let mut len = len_of(check(read(&mut buf))?);
    if len > probe {
        buf = alloc(len)?;
        len = len_of(check(read(&mut buf))?).min(buf.len());
    }
    buf.truncate(len);
    Ok(buf)
}

/// Message and native code of the last error on `handle`, if the library can
/// describe it.
pub fn read_error(api: &dyn MimerApi, handle: NativeHandle) -> Option<(i32, String)> {
    let mut code = 0;
    let message = read_text(NAME_PROBE_LEN, |buf| api.get_error(handle, &mut code, buf)).ok()?;
    Some((code, message))
}

fn read_blob(api: &dyn MimerApi, statement: StatementHandle, index: i16) -> NativeResult<Value> {
    let mut length = 0usize;
    let mut lob = LobHandle::default();
    check(api.get_lob(statement, index, &mut length, &mut lob))?;

    let mut payload = alloc(length)?;
    for chunk in payload.chunks_mut(LOB_CHUNK_SIZE) {
        check(api.get_blob_data(&mut lob, chunk))?;
    }
    Ok(Value::Bytes(payload))
}

fn read_nclob(api: &dyn MimerApi, statement: StatementHandle, index: i16) -> NativeResult<Value> {
    let mut chars = 0usize;
    let mut lob = LobHandle::default();
    check(api.get_lob(statement, index, &mut chars, &mut lob))?;

    // Length is in characters; four bytes each covers any UTF-8 payload.
    let need = chars.checked_mul(4).and_then(|n| n.checked_add(1)).ok_or(OUT_OF_MEMORY)?;
    let mut buf = alloc(need)?;
    check(api.get_nclob_data(&mut lob, &mut buf))?;
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    buf.truncate(end);
    utf8(buf).map(Value::Str)
}

/// Reads one column of the current row through `accessor`. A NULL is read
/// without one; a non-NULL value of an unmapped type is a conversion error.
pub fn get_value(
    api: &dyn MimerApi,
    statement: StatementHandle,
    index: i16,
    accessor: Option<Accessor>,
) -> NativeResult<Value> {
    if check(api.is_null(statement, index))? > 0 {
        return Ok(Value::Null);
    }

    match accessor.ok_or(DATA_CONVERSION)? {
        Accessor::Int32 => {
            let mut out = 0i32;
            check(api.get_int32(statement, index, &mut out))?;
            Ok(Value::Int(i128::from(out)))
        }
        Accessor::Int64 => {
            let mut out = 0i64;
            check(api.get_int64(statement, index, &mut out))?;
            Ok(Value::Int(i128::from(out)))
        }
        Accessor::Double => {
            let mut out = 0f64;
            check(api.get_double(statement, index, &mut out))?;
            Ok(Value::Double(out))
        }
        Accessor::Boolean => {
            let rc = check(api.get_boolean(statement, index))?;
            Ok(Value::Bool(rc != 0))
        }
        Accessor::Text => {
            read_text(PROBE_LEN, |buf| api.get_string(statement, index, buf)).map(Value::Str)
        }
        Accessor::Binary => {
            read_bytes(PROBE_LEN, |buf| api.get_binary(statement, index, buf)).map(Value::Bytes)
        }
        Accessor::Blob => read_blob(api, statement, index),
        Accessor::Nclob => read_nclob(api, statement, index),
    }
}

fn to_i32(value: &Value) -> NativeResult<i32> {
    match value {
        Value::Int(v) => i32::try_from(*v).map_err(|_| DATA_CONVERSION),
        Value::Bool(v) => Ok(i32::from(*v)),
        _ => Err(DATA_CONVERSION),
    }
}

fn to_i64(value: &Value) -> NativeResult<i64> {
    match value {
        Value::Int(v) => i64::try_from(*v).map_err(|_| DATA_CONVERSION),
        Value::Bool(v) => Ok(i64::from(*v)),
        _ => Err(DATA_CONVERSION),
    }
}

fn to_f64(value: &Value) -> NativeResult<f64> {
    match value {
        Value::Double(v) => Ok(*v),
        Value::Int(v) => i64::try_from(*v).map(|v| v as f64).map_err(|_| DATA_CONVERSION),
        _ => Err(DATA_CONVERSION),
    }
}

fn to_bool(value: &Value) -> NativeResult<bool> {
    match value {
        Value::Bool(v) => Ok(*v),
        Value::Int(v) => Ok(*v != 0),
        _ => Err(DATA_CONVERSION),
    }
}

fn write_blob(
    api: &dyn MimerApi,
    arena: &mut BindArena,
    statement: StatementHandle,
    index: i16,
    data: &[u8],
) -> NativeResult<i32> {
    let mut lob = LobHandle::default();
    let mut rc = check(api.set_lob(statement, index, data.len(), &mut lob))?;
    for chunk in data.chunks(LOB_CHUNK_SIZE) {
        let kept = arena.keep(statement, chunk.to_vec());
        // SAFETY: `kept` is owned by the arena under `statement` and is only
        // freed when that statement is ended or prepared again.
        rc = check(unsafe { api.set_blob_data(&mut lob, kept) })?;
    }
    Ok(rc)
}

fn write_nclob(
    api: &dyn MimerApi,
    arena: &mut BindArena,
    statement: StatementHandle,
    index: i16,
    text: &str,
) -> NativeResult<i32> {
    let mut lob = LobHandle::default();
    check(api.set_lob(statement, index, text.len(), &mut lob))?;
    let kept = arena.keep_cstr(statement, text).ok_or(DATA_CONVERSION)?;
    // SAFETY: see `write_blob`.
    check(unsafe { api.set_nclob_data(&mut lob, kept) })
}

/// Binds `value` to parameter `index` through `accessor`.
///
/// `Null` always goes through the set-null call, whatever the declared type.
/// Integers are range checked against the target width and rejected with the
/// conversion status instead of being truncated.
pub fn set_value(
    api: &dyn MimerApi,
    arena: &mut BindArena,
    statement: StatementHandle,
    index: i16,
    accessor: Option<Accessor>,
    value: &Value,
) -> NativeResult<i32> {
    if value.is_null() {
        return check(api.set_null(statement, index));
    }

    match accessor.ok_or(DATA_CONVERSION)? {
        Accessor::Int32 => check(api.set_int32(statement, index, to_i32(value)?)),
        Accessor::Int64 => check(api.set_int64(statement, index, to_i64(value)?)),
        Accessor::Double => check(api.set_double(statement, index, to_f64(value)?)),
        Accessor::Boolean => check(api.set_boolean(statement, index, to_bool(value)?)),
        Accessor::Text => {
            let text = value.as_str().ok_or(DATA_CONVERSION)?;
            let kept = arena.keep_cstr(statement, text).ok_or(DATA_CONVERSION)?;
            // SAFETY: see `write_blob`.
            check(unsafe { api.set_string(statement, index, kept) })
        }
        Accessor::Binary => {
            let bytes = value.as_bytes().ok_or(DATA_CONVERSION)?;
            let kept = arena.keep(statement, bytes.to_vec());
            // SAFETY: see `write_blob`.
            check(unsafe { api.set_binary(statement, index, kept) })
        }
        Accessor::Blob => {
            let bytes = value.as_bytes().ok_or(DATA_CONVERSION)?;
            write_blob(api, arena, statement, index, bytes)
        }
        Accessor::Nclob => {
            let text = value.as_str().ok_or(DATA_CONVERSION)?;
            write_nclob(api, arena, statement, index, text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_status() {
        assert_eq!(check(0), Ok(0));
        assert_eq!(check(100), Ok(100));
        assert_eq!(check(-24005), Err(-24005));
    }

    #[test]
    fn test_read_text_fits_probe() {
        let text = read_text(16, |buf| {
            buf[..3].copy_from_slice(b"bob");
            buf[3] = 0;
            3
        });
        assert_eq!(text, Ok("bob".to_string()));
    }

    #[test]
    fn test_read_text_retries_once_with_exact_buffer() {
        let value = "x".repeat(40);
        let mut calls = Vec::new();
        let text = read_text(16, |buf| {
            calls.push(buf.len());
            let n = value.len().min(buf.len() - 1);
            buf[..n].copy_from_slice(&value.as_bytes()[..n]);
            buf[n] = 0;
            value.len() as i32
        });
        assert_eq!(text, Ok(value.clone()));
        assert_eq!(calls, vec![16, 41]);
    }

    #[test]
    fn test_read_text_propagates_failure() {
        assert_eq!(read_text(16, |_| -12345), Err(-12345));
    }

    #[test]
    fn test_read_text_rejects_invalid_utf8() {
        let text = read_text(8, |buf| {
            buf[0] = 0xff;
            buf[1] = 0;
            1
        });
        assert_eq!(text, Err(DATA_CONVERSION));
    }

    #[test]
    fn test_read_bytes_retries_when_too_long() {
        let payload: Vec<u8> = (0..50u8).collect();
        let mut calls = 0;
        let bytes = read_bytes(10, |buf| {
            calls += 1;
            let n = payload.len().min(buf.len());
            buf[..n].copy_from_slice(&payload[..n]);
            payload.len() as i32
        });
        assert_eq!(bytes, Ok(payload.clone()));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_read_bytes_exact_probe_needs_no_retry() {
        let mut calls = 0;
        let bytes = read_bytes(4, |buf| {
            calls += 1;
            buf.copy_from_slice(&[1, 2, 3, 4]);
            4
        });
        assert_eq!(bytes, Ok(vec![1, 2, 3, 4]));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_integer_range_checks() {
        assert_eq!(to_i32(&Value::Int(i32::MAX as i128)), Ok(i32::MAX));
        assert_eq!(to_i32(&Value::Int(i32::MIN as i128)), Ok(i32::MIN));
        assert_eq!(to_i32(&Value::Int(i32::MAX as i128 + 1)), Err(DATA_CONVERSION));
        assert_eq!(to_i32(&Value::Int(i32::MIN as i128 - 1)), Err(DATA_CONVERSION));
        assert_eq!(to_i64(&Value::Int(i64::MAX as i128)), Ok(i64::MAX));
        assert_eq!(to_i64(&Value::Int(i64::MIN as i128)), Ok(i64::MIN));
        assert_eq!(to_i64(&Value::Int(i64::MAX as i128 + 1)), Err(DATA_CONVERSION));
        assert_eq!(to_i64(&Value::Int(1i128 << 100)), Err(DATA_CONVERSION));
        assert_eq!(to_i32(&Value::Double(3.14)), Err(DATA_CONVERSION));
        assert_eq!(to_i32(&Value::Bool(true)), Ok(1));
    }

    #[test]
    fn test_float_and_bool_conversion() {
        assert_eq!(to_f64(&Value::Int(3)), Ok(3.0));
        assert_eq!(to_f64(&Value::Double(0.5)), Ok(0.5));
        assert_eq!(to_f64(&Value::Str("1".to_string())), Err(DATA_CONVERSION));
        assert_eq!(to_bool(&Value::Int(0)), Ok(false));
        assert_eq!(to_bool(&Value::Int(-2)), Ok(true));
        assert_eq!(to_bool(&Value::Bytes(vec![])), Err(DATA_CONVERSION));
    }
}
