//! Compiler configuration.
//!
//! TOML-based, with built-in defaults. The row limits feed LIMIT assembly
//! and the timezone feeds the dialect's timezone-conversion hook.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrataConfig {
    pub query: QueryLimits,
    /// Timezone all time dimensions are converted to before truncation and
    /// range comparison.
    pub timezone: String,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            query: QueryLimits::default(),
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Row limit applied when a query carries none (0 disables).
    pub default_row_limit: u64,
    /// Hard cap on any requested limit (0 = uncapped).
    pub max_row_limit: u64,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_row_limit: 10_000,
            max_row_limit: 50_000,
        }
    }
}

impl QueryLimits {
    /// Resolve the limit actually rendered: the requested one, else the
    /// default, clamped to the cap.
    pub fn effective_limit(&self, requested: Option<u64>) -> Option<u64> {
        let limit = match requested {
            Some(limit) => Some(limit),
            None if self.default_row_limit > 0 => Some(self.default_row_limit),
            None => None,
        };
        match limit {
            Some(limit) if self.max_row_limit > 0 && limit > self.max_row_limit => {
                Some(self.max_row_limit)
            }
            other => other,
        }
    }
}

impl StrataConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| StrataError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| StrataError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations, falling back to built-in defaults.
    ///
    /// Search order:
    /// 1. `STRATA_CONFIG` environment variable
    /// 2. `./strata.toml` (current directory)
    /// 3. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("STRATA_CONFIG") {
            if let Ok(cfg) = Self::from_file(&path) {
                tracing::info!(path = %path, "loaded config from STRATA_CONFIG");
                return cfg;
            }
        }

        if let Ok(cfg) = Self::from_file("strata.toml") {
            tracing::info!("loaded config from ./strata.toml");
            return cfg;
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = StrataConfig::default();
        assert_eq!(cfg.query.default_row_limit, 10_000);
        assert_eq!(cfg.query.max_row_limit, 50_000);
        assert_eq!(cfg.timezone, "UTC");
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
timezone = "America/Los_Angeles"

[query]
default_row_limit = 500
max_row_limit = 2000
"#;
        let cfg = StrataConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.timezone, "America/Los_Angeles");
        assert_eq!(cfg.query.default_row_limit, 500);
        assert_eq!(cfg.query.max_row_limit, 2000);
    }

    #[test]
    fn test_effective_limit() {
        let limits = QueryLimits {
            default_row_limit: 100,
            max_row_limit: 1000,
        };
        assert_eq!(limits.effective_limit(None), Some(100));
        assert_eq!(limits.effective_limit(Some(50)), Some(50));
        assert_eq!(limits.effective_limit(Some(5000)), Some(1000));

        let unbounded = QueryLimits {
            default_row_limit: 0,
            max_row_limit: 0,
        };
        assert_eq!(unbounded.effective_limit(None), None);
        assert_eq!(unbounded.effective_limit(Some(5000)), Some(5000));
    }
}
