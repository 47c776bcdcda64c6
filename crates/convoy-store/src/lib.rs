//! Storage implementations for the Convoy coordination engine.
//!
//! [`InMemoryTowerStore`] keeps every table behind one mutex; that single
//! lock is the transactional primitive the queue and composite write paths
//! rely on. [`FileActivityLog`] appends audit records as JSONL under a
//! workspace root; [`MemoryActivityLog`] is the in-process equivalent.

mod activity;
mod memory;

pub use activity::{FileActivityLog, MemoryActivityLog};
pub use memory::InMemoryTowerStore;
