//! TOML configuration loading.
//!
//! Resolution order: explicit path, then the `TCANVAS_CONFIG` environment
//! variable, then built-in defaults. Every table and key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tc_core::{Bounds, CoreError, LifecycleConfig, positive_finite};

use crate::error::Result;

pub const CONFIG_ENV: &str = "TCANVAS_CONFIG";

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_CANVAS_WIDTH: f64 = 1280.0;
const DEFAULT_CANVAS_HEIGHT: f64 = 800.0;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub lifecycle: LifecycleConfig,
    pub service: ServiceConfig,
    pub canvas: CanvasConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Generation backend. Unset means the offline generator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

impl CanvasConfig {
    pub fn bounds(&self) -> Bounds {
        Bounds::from_rect(0.0, 0.0, self.width, self.height)
    }

    pub fn validate(&self) -> Result<()> {
        if !(positive_finite(self.width) && positive_finite(self.height)) {
            return Err(CoreError::InvalidConfig(format!(
                "canvas size must be positive and finite, got {}x{}",
                self.width, self.height
            ))
            .into());
        }
        Ok(())
    }
}

/// Load from `path`, or from `$TCANVAS_CONFIG`, or fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    let Some(path) = path else {
        tracing::debug!("no config file, using defaults");
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(&path)?;
    let config = parse_config(&text)?;
    tracing::info!("loaded config from {}", path.display());
    Ok(config)
}

pub fn parse_config(text: &str) -> Result<EngineConfig> {
    let config: EngineConfig = toml::from_str(text)?;
    config.lifecycle.validate()?;
    config.canvas.validate()?;
    Ok(config)
}

pub fn to_toml(config: &EngineConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
