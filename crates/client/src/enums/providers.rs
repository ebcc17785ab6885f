use model_manager_common::{ModelManagerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upstream model vendor addressed through the Model Manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAi,
    Anthropic,
    Google,
    DeepSeek,
    Perplexity,
}

impl ProviderType {
    /// Every supported provider
    pub const ALL: [ProviderType; 5] = [
        ProviderType::OpenAi,
        ProviderType::Anthropic,
        ProviderType::Google,
        ProviderType::DeepSeek,
        ProviderType::Perplexity,
    ];

    /// Wire name of the provider
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAi => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Google => "google",
            ProviderType::DeepSeek => "deepseek",
            ProviderType::Perplexity => "perplexity",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = ModelManagerError;

    fn from_str(s: &str) -> Result<Self> {
        ProviderType::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                ModelManagerError::validation(format!(
                    "unknown provider '{}', expected one of: openai, anthropic, google, deepseek, perplexity",
                    s
                ))
            })
    }
}
