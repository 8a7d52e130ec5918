//! Storage layer
//!
//! One file holds every user's partition. Reads and writes are always scoped
//! to a single user; writes happen inside all-or-nothing transactions.

mod file_store;
mod tables;
mod traits;

pub use file_store::Store;
pub use tables::{Partition, UserTx};
pub use traits::{GraphRead, GraphStore};
