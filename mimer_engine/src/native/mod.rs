//! Native call layer: the black-box library capability, its dynamic binding,
//! type dispatch, buffer ownership and value marshaling.

pub mod api;
pub mod arena;
pub mod layer;
pub mod library;
pub mod loader;
pub mod marshal;
pub mod types;

pub use api::{
    LobHandle, MimerApi, NativeHandle, SessionHandle, StatementHandle, DDL_STATEMENT, END_OF_SET,
    FORWARD_ONLY, SCROLLABLE, SUCCESS,
};
pub use arena::BindArena;
pub use layer::{NativeLayer, Prepared};
pub use library::MimerLibrary;
pub use marshal::NativeResult;
pub use types::{type_code, Accessor, DispatchTable};
