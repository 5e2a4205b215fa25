//! Configuration management for sensorthings services.
//!
//! A service only needs to know where it is rooted so that created entities
//! can be given their canonical self links. Configuration is read from YAML:
//!
//! ```yaml
//! service_root: https://sensors.example.org
//! api_version: v1.1
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ServiceRootLinker;
use crate::document::is_valid_uri;

/// Default address of a locally running service.
pub const DEFAULT_SERVICE_ROOT: &str = "http://localhost:8080";

/// Default API version path segment.
pub const DEFAULT_API_VERSION: &str = "v1.1";

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Absolute URL the service is reachable at, without the version segment.
    pub service_root: String,
    /// Version path segment appended to the service root.
    pub api_version: String,
}

impl ServiceConfig {
    /// Creates a new ServiceConfig.
    ///
    /// # Arguments
    /// * `service_root` - Absolute URL of the service
    /// * `api_version` - Version path segment, e.g. `v1.1`
    pub fn new(service_root: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            service_root: service_root.into(),
            api_version: api_version.into(),
        }
    }

    /// Parses and validates a YAML configuration.
    ///
    /// Missing keys take their default values.
    ///
    /// # Returns
    /// * `Ok(ServiceConfig)` - The parsed configuration
    /// * `Err(String)` - If the YAML is malformed or the service root is not a URL
    pub fn from_yaml_str(yaml: &str) -> Result<Self, String> {
        let config: ServiceConfig =
            serde_yml::from_str(yaml).map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Serializes the configuration back to YAML.
    pub fn to_yaml(&self) -> Result<String, String> {
        serde_yml::to_string(self).map_err(|e| format!("Failed to serialize config: {}", e))
    }

    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_uri(&self.service_root) {
            return Err(format!(
                "service_root {:?} is not an absolute URL",
                self.service_root
            ));
        }
        if self.api_version.is_empty() || self.api_version.contains('/') {
            return Err(format!(
                "api_version {:?} must be a single path segment",
                self.api_version
            ));
        }
        Ok(())
    }

    /// The versioned base address, e.g. `http://localhost:8080/v1.1`.
    pub fn base_url(&self) -> String {
        format!(
            "{}/{}",
            self.service_root.trim_end_matches('/'),
            self.api_version
        )
    }

    /// A linker rooted at [`ServiceConfig::base_url`].
    pub fn linker(&self) -> ServiceRootLinker {
        ServiceRootLinker::new(self.base_url())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_ROOT, DEFAULT_API_VERSION)
    }
}
