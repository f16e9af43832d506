//! Batch request configuration.

use crate::{BatchError, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Environment variable overriding the `OData-Version` header.
pub const ENV_ODATA_VERSION: &str = "ODATA_BATCH_VERSION";

/// Environment variable overriding the `Accept` header.
pub const ENV_ACCEPT: &str = "ODATA_BATCH_ACCEPT";

const SUPPORTED_VERSIONS: [&str; 2] = ["4.0", "4.01"];

/// Settings applied to the outer `$batch` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Value of the `OData-Version` header.
    pub odata_version: String,
    /// Value of the `Accept` header.
    pub accept: String,
    /// Extra headers appended after the protocol headers.
    pub default_headers: Vec<(String, String)>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            odata_version: "4.0".to_string(),
            accept: "multipart/mixed".to_string(),
            default_headers: Vec::new(),
        }
    }
}

impl BatchConfig {
    /// Create a new configuration builder.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder::default()
    }

    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from any variable source, falling back to defaults.
    ///
    /// `lookup` is called with [`ENV_ODATA_VERSION`] and [`ENV_ACCEPT`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(version) = lookup(ENV_ODATA_VERSION) {
            config.odata_version = version.trim().to_string();
        }
        if let Some(accept) = lookup(ENV_ACCEPT) {
            config.accept = accept.trim().to_string();
        }

        config.validate().inspect_err(|e| {
            tracing::error!(error = %e, "Invalid batch configuration in environment");
        })?;
        Ok(config)
    }

    /// Check that the configured protocol version is one this crate speaks.
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.odata_version.as_str()) {
            return Err(BatchError::Config(format!(
                "unsupported OData-Version \"{}\"",
                self.odata_version
            )));
        }
        if self.accept.is_empty() {
            return Err(BatchError::Config("Accept header must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for batch configuration.
#[derive(Debug, Default)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    /// Set the `OData-Version` header value.
    pub fn odata_version(mut self, version: impl Into<String>) -> Self {
        self.config.odata_version = version.into();
        self
    }

    /// Set the `Accept` header value.
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.config.accept = accept.into();
        self
    }

    /// Add a header sent with every batch request.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((name.into(), value.into()));
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<BatchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
