//! Storage layer
//!
//! Generic key-value persistence on top of embedded SQLite. Every store owns one
//! table holding `(id, payload[, unique index column])`; tables are created lazily
//! the first time a store finds them missing.

pub mod codec;
pub mod db;
pub mod registry;
pub mod store;

pub use codec::{JsonCodec, PayloadCodec};
pub use db::Database;
pub use registry::StoreRegistry;
pub use store::{KeyKind, Store, StoreKey, UniqueIndex};
