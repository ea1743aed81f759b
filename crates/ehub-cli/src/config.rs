//! `ehub.toml` configuration
//!
//! ```toml
//! [model]
//! big_m = 1e6
//! allow_unimplemented_archetypes = false
//!
//! [solver]
//! backend = "clarabel"
//! relax_integrality = false
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{Context, Result};
use ehub_model::{BuildOptions, SolverOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EhubConfig {
    #[serde(default)]
    pub model: BuildOptions,
    #[serde(default)]
    pub solver: SolverOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    pub fn level(&self) -> Result<tracing::Level> {
        self.level
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid log level '{}' in [logging]", self.level))
    }
}

/// Load the configuration at `path`; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<EhubConfig> {
    if !path.exists() {
        return Ok(EhubConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: EhubConfig =
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}
