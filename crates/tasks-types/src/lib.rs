//! Tasks Types - Pure type definitions
//!
//! This crate contains only plain data types with no async runtime or storage
//! dependencies, so it can be shared by the core library, the server and clients.

pub mod task;

pub use task::*;
