//! # Render Ownership and Deferred Work
//!
//! One thread owns the GPU. Everything else may only ask.
//!
//! ```text
//! Cache eviction (any thread) ──► RenderWorkSender ──┐
//! World reload   (any thread) ──► RenderWorkSender ──┼──► RenderWorkQueue
//!                                                    │        │
//!                                                    │        ▼ run_all (render thread, once per frame)
//!                                                    └──  GPU releases
//! ```
//!
//! `RenderOwner` records which thread that is and turns a cross-thread GPU
//! call into an assertion failure instead of undefined behavior.

mod render_owner;
mod render_work;

pub use render_owner::RenderOwner;
pub use render_work::{RenderWorkQueue, RenderWorkSender};
