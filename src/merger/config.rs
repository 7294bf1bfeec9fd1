use std::{fs, net::IpAddr, path::Path};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, resolver::DEFAULT_WORKERS, site::SiteConfig};

/// The top-level sources document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Subscription endpoints, in merge priority order.
    #[serde(default)]
    pub sources: Vec<SiteConfig>,
    /// Nameservers to query directly; the system resolver is used when empty.
    #[serde(default)]
    pub nameservers: Vec<IpAddr>,
    /// Number of concurrent blocking lookups against the system resolver.
    #[serde(default = "default_workers")]
    pub resolve_workers: usize,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

impl SourcesConfig {
    /// Reads and validates a sources document.
    ///
    /// # Arguments
    ///
    /// * `path`: Location of the YAML document.
    ///
    /// # Returns
    ///
    /// The parsed configuration, or a `ConfigError` that should abort the run.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolve_workers == 0 {
            return Err(ConfigError::Invalid(
                "resolve_workers must be at least 1".to_owned(),
            ));
        }
        if let Some(index) = self.sources.iter().position(|s| s.url.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "source #{} has an empty url",
                index + 1
            )));
        }
        Ok(())
    }
}
