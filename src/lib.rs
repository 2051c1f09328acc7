//! Producer/consumer plumbing for byte pipelines.
//!
//! Two small primitives carry the crate: [`AdaptiveRingBuffer`], a circular
//! byte store that can grow on demand before latching to a fixed capacity,
//! and [`ControllableWorker`], a single OS thread behind an explicit
//! start/stop/suspend/wake lifecycle. They share no internal state: a
//! producer (typically a capture callback) writes into the buffer, and a
//! worker's caller-supplied work unit reads from it, with all coupling done
//! in the closure handed to the worker.
//!
//! The buffer never blocks and never fails; overflow is resolved by growing
//! or by overwriting the oldest unread bytes. The worker's control surface is
//! callable from any thread, and illegal lifecycle requests come back as the
//! unchanged status rather than as errors.

pub mod buffer;
pub mod config;
pub mod thread;
pub mod worker;

pub use buffer::{AdaptiveRingBuffer, MAX_BUFFER_SIZE};
pub use thread::{StdThreads, ThreadControl, ThreadPriority};
pub use worker::{ControllableWorker, WorkerStatus};
