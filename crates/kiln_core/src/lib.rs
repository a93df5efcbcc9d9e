//! # KILN Core
//!
//! GPU-agnostic foundations for the instancing engine:
//! - Slot pools: dense per-instance storage addressed by stable handles
//! - Deferred render work: releases requested anywhere, run on the render thread
//!
//! ## Architecture Rules
//!
//! 1. **Handles never dangle** - every removal bumps a generation
//! 2. **Dense storage** - live values are contiguous and uploadable as-is
//! 3. **One GPU owner** - other threads enqueue, only the owner runs
//!
//! ## Example
//!
//! ```rust
//! use kiln_core::{RenderOwner, RenderWorkQueue, SlotPool};
//!
//! let mut pool = SlotPool::new();
//! let handle = pool.insert([0.0f32; 4]);
//! assert!(pool.contains(handle));
//!
//! let queue: RenderWorkQueue<u32> = RenderWorkQueue::new(RenderOwner::current());
//! queue.sender().enqueue(7);
//! assert_eq!(queue.run_all(|_| {}), 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod memory;
pub mod sync;

pub use memory::{Removed, SlotHandle, SlotPool};
pub use sync::{RenderOwner, RenderWorkQueue, RenderWorkSender};
