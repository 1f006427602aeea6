//! Core types for abacus.

pub mod generation;
pub mod history;
pub mod message;
pub mod usage;

pub use generation::*;
pub use history::add_messages;
pub use message::*;
pub use usage::*;
