//! Deep copy configuration

use serde::{Deserialize, Serialize};

use crate::error::{CopyError, Result};

/// Configuration for a [`super::Copier`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyConfig {
    /// Label attached to log events
    pub name: String,
    /// Upper bound on registered regions per copy
    pub max_regions: Option<usize>,
    /// Duplicate reference-free arrays in one step instead of element-wise
    pub bulk_copy_plain_arrays: bool,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            name: crate::defaults::COPIER_NAME.to_string(),
            max_regions: None,
            bulk_copy_plain_arrays: true,
        }
    }
}

impl CopyConfig {
    /// Create a new configuration with custom name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the region limit
    pub fn with_max_regions(mut self, limit: Option<usize>) -> Self {
        self.max_regions = limit;
        self
    }

    /// Enable or disable the flat array copy
    pub fn with_bulk_copy(mut self, enable: bool) -> Self {
        self.bulk_copy_plain_arrays = enable;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CopyError::invalid_parameter("name", "Name cannot be empty"));
        }

        if self.max_regions == Some(0) {
            return Err(CopyError::invalid_parameter(
                "max_regions",
                "Region limit must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Builder pattern for copy configuration
pub struct CopyConfigBuilder {
    config: CopyConfig,
}

impl CopyConfigBuilder {
    /// Create a new builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: CopyConfig::new(name),
        }
    }

    /// Limit the number of registered regions
    pub fn max_regions(mut self, limit: usize) -> Self {
        self.config.max_regions = Some(limit);
        self
    }

    /// Remove the region limit
    pub fn unlimited(mut self) -> Self {
        self.config.max_regions = None;
        self
    }

    /// Enable or disable the flat array copy
    pub fn bulk_copy(mut self, enable: bool) -> Self {
        self.config.bulk_copy_plain_arrays = enable;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<CopyConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
