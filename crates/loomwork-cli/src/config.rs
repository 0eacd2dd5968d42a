//! CLI configuration: an optional `loomwork.toml`, falling back to
//! `Default`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_pipeline_name")]
    pub pipeline_name: String,
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"info"` or
    /// `"loomwork_runtime=debug"`.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            pipeline_name: default_pipeline_name(),
            log_filter: default_log_filter(),
        }
    }
}

fn default_pipeline_name() -> String {
    "demo".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl CliConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("no config directory"))?;
        Ok(dir.join("loomwork").join("loomwork.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_fallbacks() {
        let config = CliConfig::default();
        assert_eq!(config.pipeline_name, "demo");
        assert_eq!(config.log_filter, "info");
    }
}
