use serde::Serialize;
use std::collections::HashMap;

/// A host value bound to a parameter or read from a column.
///
/// Integers are carried as `i128` so that values wider than the target column
/// reach the range checks in the marshaling layer instead of being truncated
/// on the way in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i128),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Short type label used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
        }
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i128::from(v))
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One fetched row. An empty row is the end-of-set sentinel.
pub type Row = Vec<Value>;

/// Parameters for one execution: none, by position, or by name.
///
/// A single scalar converts to a one-element positional list.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(HashMap<String, Value>),
}

impl Params {
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Params::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::Positional(values) => values.len(),
            Params::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::None
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl<V: Into<Value>, const N: usize> From<[V; N]> for Params {
    fn from(values: [V; N]) -> Self {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> From<HashMap<K, V>> for Params {
    fn from(values: HashMap<K, V>) -> Self {
        Params::named(values)
    }
}

macro_rules! params_from_scalar {
    ($($t:ty),*) => {
        $(impl From<$t> for Params {
            fn from(v: $t) -> Self {
                Params::Positional(vec![Value::from(v)])
            }
        })*
    };
}

params_from_scalar!(
    i8, i16, i32, i64, i128, u8, u16, u32, u64, f32, f64, bool, String, Vec<u8>, Value
);

impl From<&str> for Params {
    fn from(v: &str) -> Self {
        Params::Positional(vec![Value::from(v)])
    }
}

impl From<&[u8]> for Params {
    fn from(v: &[u8]) -> Self {
        Params::Positional(vec![Value::from(v)])
    }
}

impl<T: Into<Value>> From<Option<T>> for Params {
    fn from(v: Option<T>) -> Self {
        Params::Positional(vec![Value::from(v)])
    }
}

macro_rules! params_from_tuple {
    ($($name:ident $var:ident),+) => {
        impl<$($name: Into<Value>),+> From<($($name,)+)> for Params {
            fn from(($($var,)+): ($($name,)+)) -> Self {
                Params::Positional(vec![$($var.into()),+])
            }
        }
    };
}

params_from_tuple!(A a);
params_from_tuple!(A a, B b);
params_from_tuple!(A a, B b, C c);
params_from_tuple!(A a, B b, C c, D d);
params_from_tuple!(A a, B b, C c, D d, E e);
params_from_tuple!(A a, B b, C c, D d, E e, F f);
params_from_tuple!(A a, B b, C c, D d, E e, F f, G g);
params_from_tuple!(A a, B b, C c, D d, E e, F f, G g, H h);

/// Column metadata of a result set: `(name, type_code, None x 5)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescription {
    pub name: String,
    pub type_code: i32,
    pub display_size: Option<i32>,
    pub internal_size: Option<i32>,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
    pub null_ok: Option<bool>,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>, type_code: i32) -> Self {
        Self {
            name: name.into(),
            type_code,
            display_size: None,
            internal_size: None,
            precision: None,
            scale: None,
            null_ok: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_coerces_to_single_positional() {
        assert_eq!(Params::from(5), Params::Positional(vec![Value::Int(5)]));
        assert_eq!(
            Params::from("bob"),
            Params::Positional(vec![Value::Str("bob".to_string())])
        );
        assert_eq!(Params::from(None::<i32>), Params::Positional(vec![Value::Null]));
    }

    #[test]
    fn test_tuple_params() {
        let params = Params::from((3, "bob", None::<f64>));
        assert_eq!(
            params,
            Params::Positional(vec![Value::Int(3), Value::Str("bob".to_string()), Value::Null])
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_named_params() {
        let params = Params::named([("a", 1), ("b", 2)]);
        match params {
            Params::Named(map) => {
                assert_eq!(map.get("a"), Some(&Value::Int(1)));
                assert_eq!(map.get("b"), Some(&Value::Int(2)));
            }
            other => panic!("expected named params, got {:?}", other),
        }
    }

    #[test]
    fn test_unit_is_no_params() {
        assert_eq!(Params::from(()), Params::None);
        assert!(Params::None.is_empty());
    }

    #[test]
    fn test_wide_integers_are_preserved() {
        let big = Value::from(u64::MAX);
        assert_eq!(big, Value::Int(18_446_744_073_709_551_615));
        assert_eq!(big.as_i64(), None);
        assert_eq!(Value::from(-7i64).as_i64(), Some(-7));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::from(vec![1u8, 2]).as_bytes(), Some(&[1u8, 2][..]));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert!(Value::Null.is_null());
        assert_eq!(Value::Null.type_name(), "null");
    }

    #[test]
    fn test_row_serializes_to_json() {
        let row: Row = vec![Value::Int(3), Value::from("bob"), Value::Null, Value::Bool(true)];
        let json = serde_json::to_string(&row).expect("serialize row");
        assert_eq!(json, r#"[3,"bob",null,true]"#);
    }

    #[test]
    fn test_column_description_defaults() {
        let column = ColumnDescription::new("c1", 50);
        assert_eq!(column.name, "c1");
        assert_eq!(column.type_code, 50);
        assert!(column.display_size.is_none());
        assert!(column.null_ok.is_none());
    }
}
