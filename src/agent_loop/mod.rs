//! Agent loop primitives (runs, approvals, checkpoints, threads).

pub mod approvals;
pub mod events;
pub mod runner;
pub mod thread;
pub mod types;

pub use approvals::*;
pub use events::{RunEvent, RunEventPayload, RunEventSink, RunLifecycle};
pub use runner::*;
pub use thread::Thread;
pub use types::*;
