//! Model selection.

pub mod openai;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AbacusError;

pub use openai::OpenAiModel;

/// Model used by `abacus` when nothing else is configured.
pub const DEFAULT_MODEL: &str = "openai:gpt-4o";

/// A model, tagged by the provider that serves it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "provider", content = "model")]
pub enum LanguageModel {
    OpenAi(OpenAiModel),
    /// Any server speaking the OpenAI Chat Completions protocol.
    OpenAiCompatible(String),
}

impl LanguageModel {
    /// Get the model's API identifier string.
    pub fn model_id(&self) -> &str {
        match self {
            Self::OpenAi(m) => m.as_str(),
            Self::OpenAiCompatible(id) => id,
        }
    }

    /// Get the provider name.
    pub fn provider_name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai",
            Self::OpenAiCompatible(_) => "openai-compatible",
        }
    }
}

impl Default for LanguageModel {
    fn default() -> Self {
        Self::OpenAi(OpenAiModel::default())
    }
}

impl fmt::Display for LanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider_name(), self.model_id())
    }
}

impl FromStr for LanguageModel {
    type Err = AbacusError;

    /// Parse `provider:model_id`, e.g. `openai:gpt-4o` or `openai-compatible:llama3.1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, model_id) = s.split_once(':').ok_or_else(|| {
            AbacusError::InvalidArgument(format!(
                "Invalid model selector '{s}': expected 'provider:model_id'"
            ))
        })?;
        if model_id.is_empty() {
            return Err(AbacusError::InvalidArgument(format!(
                "Invalid model selector '{s}': empty model id"
            )));
        }
        match provider {
            "openai" => {
                let m = OpenAiModel::from_str(model_id)
                    .unwrap_or_else(|_| OpenAiModel::Custom(model_id.to_string()));
                Ok(Self::OpenAi(m))
            }
            "openai-compatible" | "openai_compatible" => Ok(Self::OpenAiCompatible(model_id.to_string())),
            other => Err(AbacusError::InvalidArgument(format!(
                "Unsupported provider '{other}'"
            ))),
        }
    }
}
