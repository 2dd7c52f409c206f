// Agora common library - main library exports

pub mod contract_calls;
pub mod entities;
pub mod hash;
pub mod math;
pub mod messages;
pub mod rest_helper;
pub mod store;
pub mod types;
pub mod urns;
pub mod voters;

// Flattened re-exports
pub use self::hash::*;
pub use self::types::*;
