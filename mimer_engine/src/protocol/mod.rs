pub mod value;

pub use value::{ColumnDescription, Params, Row, Value};
