//! Food log core: entries, the flat row codec, durable backends, the
//! in-memory log store and per-user import/export.

pub mod backend;
pub mod codec;
pub mod gateway;
pub mod message;
pub mod models;
pub mod store;

pub use backend::{Backend, BackendError};
pub use codec::CaloriesPolicy;
pub use models::LogEntry;
pub use store::{LogStore, StoreError};
