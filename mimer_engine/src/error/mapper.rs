use super::{codes, MimerError};
use crate::native::marshal::read_error;
use crate::native::{MimerApi, NativeHandle};

/// Turns a failing status into a taxonomy error.
///
/// Local codes never reach the library. Native codes take their text from the
/// library's error accessor on `handle`; when that lookup itself fails the
/// message is `Unknown error <code>`.
pub fn map_status(api: &dyn MimerApi, code: i32, handle: Option<NativeHandle>) -> MimerError {
    if codes::is_local(code) {
        return MimerError::local(code);
    }

    let message = handle
        .and_then(|h| read_error(api, h))
        .map(|(_, message)| message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("Unknown error {}", code));

    MimerError::Database {
        kind: codes::classify(code),
        code,
        message,
    }
}
