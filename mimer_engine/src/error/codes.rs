//! Status code tables: the adapter's own local codes and the classification of
//! Mimer API return codes into [`ErrorKind`].

use super::ErrorKind;

pub const UNSUPPORTED_METHOD: i32 = -25000;
pub const TPC_UNSUPPORTED: i32 = -25001;
pub const CONNECTION_NOT_OPEN: i32 = -25010;
pub const INVALID_PARAMETER_COUNT: i32 = -25011;
pub const MISSING_PARAMETER_KEY: i32 = -25012;
pub const INVALID_PARAMETER_FORMAT: i32 = -25013;
pub const NO_RESULT_SET: i32 = -25014;
pub const CURSOR_NOT_OPEN: i32 = -25015;
pub const ILLEGAL_SCROLL_MODE: i32 = -25016;
pub const DATA_CONVERSION: i32 = -25020;
pub const OUT_OF_MEMORY: i32 = -25030;
pub const LOGIN_FAILURE: i32 = -25031;
pub const API_VERSION_TOO_OLD: i32 = -25101;

const LOCAL_RANGE: std::ops::RangeInclusive<i32> = -25999..=-25000;

/// Codes the native library uses for write-write conflicts detected on commit.
pub const TRANSACTION_ABORTED: i32 = -10001;

/// Fixed message for a local code. `%s` is replaced by `arg` when present.
pub fn local_message(code: i32, arg: Option<&str>) -> Option<String> {
    let template = match code {
        UNSUPPORTED_METHOD => "Unsupported method",
        TPC_UNSUPPORTED => "TPC is unsupported",
        CONNECTION_NOT_OPEN => "Connection not open",
        INVALID_PARAMETER_COUNT => "Invalid number of parameters",
        MISSING_PARAMETER_KEY => "KeyError in parameters, key: %s does not exist in dictionary",
        INVALID_PARAMETER_FORMAT => "Invalid parameter format",
        NO_RESULT_SET => "Previous execute did not produce a result set",
        CURSOR_NOT_OPEN => "Cursor not open",
        ILLEGAL_SCROLL_MODE => "Illegal scroll mode",
        DATA_CONVERSION => "Data conversion error",
        OUT_OF_MEMORY => "Out of memory",
        LOGIN_FAILURE => "Login failure",
        API_VERSION_TOO_OLD => "Mimer API version too old, 11.0.5A or later is required",
        _ => return None,
    };
    Some(match arg {
        Some(value) => template.replace("%s", value),
        None => template.to_string(),
    })
}

pub fn is_local(code: i32) -> bool {
    LOCAL_RANGE.contains(&code)
}

fn exact_kind(magnitude: i32) -> Option<ErrorKind> {
    match magnitude {
        10001 | 10003 => Some(ErrorKind::TransactionAbortError),
        24010 | 24011 => Some(ErrorKind::DataError),
        _ => None,
    }
}

fn decade_kind(decade: i32) -> Option<ErrorKind> {
    match decade {
        2500 => Some(ErrorKind::NotSupportedError),
        2501 => Some(ErrorKind::ProgrammingError),
        2502 => Some(ErrorKind::DataError),
        2503 => Some(ErrorKind::OperationalError),
        2510 => Some(ErrorKind::NotSupportedError),
        _ => None,
    }
}

fn band_kind(band: i32) -> Option<ErrorKind> {
    match band {
        10 => Some(ErrorKind::DataError),
        11 => Some(ErrorKind::OperationalError),
        12 | 14 => Some(ErrorKind::ProgrammingError),
        16 => Some(ErrorKind::OperationalError),
        18 => Some(ErrorKind::DatabaseError),
        19 | 23 => Some(ErrorKind::InternalError),
        21 => Some(ErrorKind::IntegrityError),
        24 | 25 => Some(ErrorKind::ProgrammingError),
        26 => Some(ErrorKind::InterfaceError),
        27 => Some(ErrorKind::DataError),
        28 => Some(ErrorKind::NotSupportedError),
        _ => None,
    }
}

/// Classifies a negative status code. Exact codes win over the per-ten table,
/// which wins over the per-thousand band. Unknown codes are internal errors.
pub fn classify(code: i32) -> ErrorKind {
    let magnitude = code.unsigned_abs().min(i32::MAX as u32) as i32;
    exact_kind(magnitude)
        .or_else(|| decade_kind(magnitude / 10))
        .or_else(|| band_kind(magnitude / 1000))
        .unwrap_or(ErrorKind::InternalError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_codes_classification() {
        assert_eq!(classify(UNSUPPORTED_METHOD), ErrorKind::NotSupportedError);
        assert_eq!(classify(TPC_UNSUPPORTED), ErrorKind::NotSupportedError);
        assert_eq!(classify(CONNECTION_NOT_OPEN), ErrorKind::ProgrammingError);
        assert_eq!(classify(CURSOR_NOT_OPEN), ErrorKind::ProgrammingError);
        assert_eq!(classify(INVALID_PARAMETER_FORMAT), ErrorKind::ProgrammingError);
        assert_eq!(classify(ILLEGAL_SCROLL_MODE), ErrorKind::ProgrammingError);
        assert_eq!(classify(DATA_CONVERSION), ErrorKind::DataError);
        assert_eq!(classify(OUT_OF_MEMORY), ErrorKind::OperationalError);
        assert_eq!(classify(LOGIN_FAILURE), ErrorKind::OperationalError);
        assert_eq!(classify(API_VERSION_TOO_OLD), ErrorKind::NotSupportedError);
    }

    #[test]
    fn test_exact_codes_override_band() {
        assert_eq!(classify(-10001), ErrorKind::TransactionAbortError);
        assert_eq!(classify(-10003), ErrorKind::TransactionAbortError);
        assert_eq!(classify(-10002), ErrorKind::DataError);
        assert_eq!(classify(-24010), ErrorKind::DataError);
        assert_eq!(classify(-24011), ErrorKind::DataError);
        assert_eq!(classify(-24012), ErrorKind::ProgrammingError);
    }

    #[test]
    fn test_band_classification() {
        assert_eq!(classify(-11000), ErrorKind::OperationalError);
        assert_eq!(classify(-12200), ErrorKind::ProgrammingError);
        assert_eq!(classify(-14005), ErrorKind::ProgrammingError);
        assert_eq!(classify(-16001), ErrorKind::OperationalError);
        assert_eq!(classify(-18500), ErrorKind::DatabaseError);
        assert_eq!(classify(-19001), ErrorKind::InternalError);
        assert_eq!(classify(-21000), ErrorKind::IntegrityError);
        assert_eq!(classify(-23999), ErrorKind::InternalError);
        assert_eq!(classify(-26100), ErrorKind::InterfaceError);
        assert_eq!(classify(-27001), ErrorKind::DataError);
        assert_eq!(classify(-28001), ErrorKind::NotSupportedError);
    }

    #[test]
    fn test_unknown_codes_default_to_internal() {
        assert_eq!(classify(-1), ErrorKind::InternalError);
        assert_eq!(classify(-13000), ErrorKind::InternalError);
        assert_eq!(classify(-99999), ErrorKind::InternalError);
        assert_eq!(classify(i32::MIN), ErrorKind::InternalError);
    }

    #[test]
    fn test_local_message_substitution() {
        assert_eq!(
            local_message(MISSING_PARAMETER_KEY, Some("b")).as_deref(),
            Some("KeyError in parameters, key: b does not exist in dictionary")
        );
        assert_eq!(local_message(CURSOR_NOT_OPEN, None).as_deref(), Some("Cursor not open"));
        assert!(local_message(-12200, None).is_none());
    }

    #[test]
    fn test_local_range() {
        assert!(is_local(-25000));
        assert!(is_local(-25999));
        assert!(!is_local(-24999));
        assert!(!is_local(-26000));
    }
}
