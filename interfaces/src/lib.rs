pub mod defs;

pub use defs::{resolve_server_values, DocumentSnapshot, DocumentStore, RangeQuery, ServerValue, SnapshotStream, StoreError};
