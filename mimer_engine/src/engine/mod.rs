pub mod connection;
pub mod cursor;
pub mod environment;
pub mod options;
pub mod transaction;

pub use connection::Connection;
pub use cursor::{Cursor, ScrollMode};
pub use environment::MimerEnvironment;
pub use options::{ConnectOptions, EnvironmentConfig, ErrorHandler, ErrorSource, HandlerAction};
pub use transaction::TransactionEnd;
