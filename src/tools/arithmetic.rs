//! The arithmetic tools offered to the model: `add`, `multiply`, `divide`.
//!
//! Each takes two integer arguments `a` and `b`. `add` and `multiply` return
//! integers and fail on overflow; `divide` returns a float and fails when `b`
//! is zero.

use std::sync::Arc;

use async_trait::async_trait;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::error::AbacusError;
use crate::tools::arguments::ToolArguments;
use crate::tools::tool::Tool;
use crate::tools::types::AgentToolParameters;

/// A binary integer operation. The lowercase variant name is the tool name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Add,
    Multiply,
    Divide,
}

impl Operation {
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Add => "Adds a and b.",
            Self::Multiply => "Multiply a and b.",
            Self::Divide => "Divide a and b.",
        }
    }

    /// Apply the operation to already-validated operands.
    pub fn apply(self, a: i64, b: i64) -> Result<serde_json::Value, AbacusError> {
        match self {
            Self::Add => a
                .checked_add(b)
                .map(|sum| serde_json::json!(sum))
                .ok_or_else(|| AbacusError::tool(self.name(), format!("{a} + {b} overflows"))),
            Self::Multiply => a
                .checked_mul(b)
                .map(|product| serde_json::json!(product))
                .ok_or_else(|| AbacusError::tool(self.name(), format!("{a} * {b} overflows"))),
            Self::Divide if b == 0 => Err(AbacusError::tool(self.name(), "division by zero")),
            Self::Divide => Ok(serde_json::json!(a as f64 / b as f64)),
        }
    }
}

/// Tool exposing one [`Operation`] over integer arguments `a` and `b`.
#[derive(Debug, Clone)]
pub struct ArithmeticTool {
    operation: Operation,
    parameters: AgentToolParameters,
}

impl ArithmeticTool {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            parameters: AgentToolParameters::object()
                .integer("a", "first int", true)
                .integer("b", "second int", true)
                .build(),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }
}

#[async_trait]
impl Tool for ArithmeticTool {
    fn name(&self) -> &str {
        self.operation.name()
    }

    fn description(&self) -> &str {
        self.operation.description()
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: &ToolArguments) -> Result<serde_json::Value, AbacusError> {
        let (a, b) = (args.get_i64("a")?, args.get_i64("b")?);
        self.operation.apply(a, b)
    }
}

/// All arithmetic tools, in the order they are advertised to the model.
pub fn all_tools() -> Vec<Arc<dyn Tool>> {
    Operation::iter()
        .map(|operation| Arc::new(ArithmeticTool::new(operation)) as Arc<dyn Tool>)
        .collect()
}
