//! Bridge configuration

use serde::{Deserialize, Serialize};

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Name recorded on the tracing span of every bridged call
    #[serde(default = "default_name")]
    pub name: String,

    /// Upper bound on the wrapped service's response body, in bytes
    /// No limit when unset
    #[serde(default)]
    pub max_response_body: Option<usize>,
}

fn default_name() -> String {
    "bridge".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_response_body: None,
        }
    }
}

impl BridgeConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the span name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Limit the wrapped service's response body
    #[must_use]
    pub fn with_max_response_body(mut self, limit: usize) -> Self {
        self.max_response_body = Some(limit);
        self
    }
}
