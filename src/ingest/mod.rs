//! Provider payload intake: file discovery and adapters to [`ProfileRecord`].
//!
//! [`ProfileRecord`]: crate::profile::ProfileRecord

pub mod adapter;
pub mod walker;

pub use adapter::{AdapterRegistry, GenericJsonAdapter, NormalizedAdapter, ProfileAdapter};
pub use walker::{discover_payloads, PayloadFile};
