//! Typed access to tool call arguments.

use crate::error::AbacusError;

/// Arguments of one tool call.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    /// Wrap raw arguments. A JSON string holding an object is parsed first,
    /// since some providers send arguments as an encoded string.
    pub fn new(value: serde_json::Value) -> Self {
        let value = match value {
            serde_json::Value::String(raw) => {
                serde_json::from_str(raw.trim()).unwrap_or(serde_json::Value::String(raw))
            }
            other => other,
        };
        Self { value }
    }

    /// Get an integer argument.
    ///
    /// Floats with no fractional part (`3.0`) are accepted when they fit in
    /// an `i64`; anything else is rejected rather than truncated or saturated.
    pub fn get_i64(&self, key: &str) -> Result<i64, AbacusError> {
        let value = self
            .value
            .get(key)
            .ok_or_else(|| AbacusError::InvalidArgument(format!("Missing integer argument: {key}")))?;
        if let Some(n) = value.as_i64() {
            return Ok(n);
        }
        // i64::MAX as f64 rounds up to 2^63, which is already out of range.
        match value.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => Ok(f as i64),
            _ => Err(AbacusError::InvalidArgument(format!(
                "Argument '{key}' must be an integer, got {value}"
            ))),
        }
    }
}
