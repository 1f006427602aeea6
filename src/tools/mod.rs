//! Tool system for function calling.

pub mod arguments;
pub mod arithmetic;
pub mod registry;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use arithmetic::{ArithmeticTool, Operation};
pub use registry::ToolRegistry;
pub use tool::Tool;
pub use types::AgentToolParameters;
