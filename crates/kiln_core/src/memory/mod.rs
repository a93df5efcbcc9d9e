//! # Memory Management
//!
//! Handle-addressed storage for per-instance records.
//!
//! ## Design Philosophy
//!
//! Values live in one dense array so they can be uploaded in a single copy,
//! while callers hold handles that survive compaction.

mod slot_pool;

pub use slot_pool::{Removed, SlotHandle, SlotPool};
