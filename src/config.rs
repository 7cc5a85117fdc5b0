use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matcher::SearchLimits;
use crate::rewrite::SitePolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Settings for one enumeration run. Every field has a default, so a
/// config file only needs the keys it changes:
///
/// ```json
/// { "limits": { "timeout_ms": 500 }, "site_policy": "all_sites" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumerationConfig {
    pub limits: SearchLimits,
    pub site_policy: SitePolicy,
    /// Evaluate rules on the rayon pool. Needs the `parallel` feature;
    /// ignored otherwise.
    pub parallel: bool,
}

impl EnumerationConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<EnumerationConfig, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults() {
        let config = EnumerationConfig::default();
        assert_eq!(config.limits.max_steps, 1_000_000);
        assert_eq!(config.limits.timeout, Duration::from_millis(2000));
        assert!(config.limits.uniquify);
        assert_eq!(config.limits.max_matches, None);
        assert_eq!(config.site_policy, SitePolicy::FirstMatch);
        assert!(!config.parallel);
    }

    #[test]
    fn partial_json() {
        let config: EnumerationConfig =
            serde_json::from_str(r#"{"limits": {"timeout_ms": 500}, "site_policy": "all_sites"}"#).unwrap();
        assert_eq!(config.limits.timeout, Duration::from_millis(500));
        assert_eq!(config.limits.max_steps, 1_000_000);
        assert_eq!(config.site_policy, SitePolicy::AllSites);
    }

    #[test]
    fn file_errors() {
        let missing = EnumerationConfig::from_json_file("/nonexistent/isostere.json");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let path = std::env::temp_dir().join(format!("isostere-config-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        let bad = EnumerationConfig::from_json_file(&path);
        fs::remove_file(&path).unwrap();
        assert!(matches!(bad, Err(ConfigError::Json { .. })));
    }
}
