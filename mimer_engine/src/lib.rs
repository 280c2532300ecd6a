//! Connection, cursor and pool layer over the Mimer SQL native client
//! library.
//!
//! A [`MimerEnvironment`] loads the library (or takes any other
//! [`native::MimerApi`] implementation), [`Connection`]s and [`Cursor`]s
//! follow the DB-API model with implicit transactions, and [`MimerPool`]
//! shares connections between threads.

pub mod engine;
pub mod error;
pub mod handles;
pub mod native;
pub mod observability;
pub mod pool;
pub mod protocol;
mod versioning;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use engine::{
    ConnectOptions, Connection, Cursor, EnvironmentConfig, ErrorHandler, ErrorSource,
    HandlerAction, MimerEnvironment, ScrollMode,
};
pub use error::{ErrorCategory, ErrorKind, MimerError, Result};
pub use pool::{MimerConnectionManager, MimerPool, PoolConfig, PoolOptions, PooledConnection};
pub use protocol::{ColumnDescription, Params, Row, Value};
pub use versioning::ApiVersion;
