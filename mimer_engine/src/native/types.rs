//! Mimer SQL type codes and the accessor dispatch table.

use std::collections::HashMap;

pub mod type_code {
    pub const CHARACTER: i32 = 1;
    pub const DECIMAL: i32 = 2;
    pub const NUMERIC: i32 = 3;
    pub const INTEGER_PRECISION: i32 = 6;
    pub const FLOAT: i32 = 10;
    pub const DATE: i32 = 11;
    pub const TIME: i32 = 12;
    pub const TIMESTAMP: i32 = 13;
    pub const INTERVAL: i32 = 14;
    pub const BINARY: i32 = 34;
    pub const BINARY_VARYING: i32 = 35;
    pub const NATIONAL_CHARACTER: i32 = 39;
    pub const CHARACTER_VARYING: i32 = 40;
    pub const BOOLEAN: i32 = 42;
    pub const SMALLINT: i32 = 48;
    pub const INTEGER: i32 = 50;
    pub const BIGINT: i32 = 52;
    pub const REAL: i32 = 54;
    pub const DOUBLE: i32 = 56;
    pub const BLOB: i32 = 57;
    pub const CLOB: i32 = 58;
    pub const NCLOB: i32 = 59;
    pub const NATIONAL_CHARACTER_VARYING: i32 = 63;
}

/// Typed get/set entry point family used for a column or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accessor {
    /// UTF-8 text; also carries decimal, datetime and interval values.
    Text,
    Int32,
    Int64,
    Double,
    Binary,
    Boolean,
    Blob,
    Nclob,
}

/// Maps native type codes to accessors. Built once per environment and
/// consulted by declared type, never by the host value's type.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    accessors: HashMap<i32, Accessor>,
}

impl DispatchTable {
    pub fn standard() -> Self {
        use type_code::*;

        let entries = [
            (CHARACTER, Accessor::Text),
            (DECIMAL, Accessor::Text),
            (NUMERIC, Accessor::Text),
            (INTEGER_PRECISION, Accessor::Int32),
            (FLOAT, Accessor::Double),
            (DATE, Accessor::Text),
            (TIME, Accessor::Text),
            (TIMESTAMP, Accessor::Text),
            (INTERVAL, Accessor::Text),
            (BINARY, Accessor::Binary),
            (BINARY_VARYING, Accessor::Binary),
            (NATIONAL_CHARACTER, Accessor::Text),
            (CHARACTER_VARYING, Accessor::Text),
            (BOOLEAN, Accessor::Boolean),
            (SMALLINT, Accessor::Int32),
            (INTEGER, Accessor::Int32),
            (BIGINT, Accessor::Int64),
            (REAL, Accessor::Double),
            (DOUBLE, Accessor::Double),
            (BLOB, Accessor::Blob),
            (CLOB, Accessor::Nclob),
            (NCLOB, Accessor::Nclob),
            (NATIONAL_CHARACTER_VARYING, Accessor::Text),
        ];

        Self {
            accessors: entries.into_iter().collect(),
        }
    }

    pub fn lookup(&self, type_code: i32) -> Option<Accessor> {
        self.accessors.get(&type_code).copied()
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::type_code::*;
    use super::*;

    #[test]
    fn test_standard_table_covers_every_code() {
        let table = DispatchTable::standard();
        assert_eq!(table.len(), 23);
        assert!(!table.is_empty());
    }

    #[test]
    fn test_integer_widths() {
        let table = DispatchTable::standard();
        assert_eq!(table.lookup(SMALLINT), Some(Accessor::Int32));
        assert_eq!(table.lookup(INTEGER), Some(Accessor::Int32));
        assert_eq!(table.lookup(INTEGER_PRECISION), Some(Accessor::Int32));
        assert_eq!(table.lookup(BIGINT), Some(Accessor::Int64));
    }

    #[test]
    fn test_text_family() {
        let table = DispatchTable::standard();
        for code in [CHARACTER, DECIMAL, NUMERIC, DATE, TIME, TIMESTAMP, INTERVAL, 39, 40, 63] {
            assert_eq!(table.lookup(code), Some(Accessor::Text), "code {}", code);
        }
    }

    #[test]
    fn test_lob_and_binary() {
        let table = DispatchTable::standard();
        assert_eq!(table.lookup(BINARY), Some(Accessor::Binary));
        assert_eq!(table.lookup(BINARY_VARYING), Some(Accessor::Binary));
        assert_eq!(table.lookup(BLOB), Some(Accessor::Blob));
        assert_eq!(table.lookup(CLOB), Some(Accessor::Nclob));
        assert_eq!(table.lookup(NCLOB), Some(Accessor::Nclob));
        assert_eq!(table.lookup(BOOLEAN), Some(Accessor::Boolean));
    }

    #[test]
    fn test_unknown_code() {
        let table = DispatchTable::standard();
        assert_eq!(table.lookup(501), None);
        assert_eq!(table.lookup(0), None);
    }
}
