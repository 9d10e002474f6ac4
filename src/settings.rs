//! Layered application settings: built-in defaults, then an optional file,
//! then `LOOPBOX_*` environment variables.

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use lb_master::{RenderConfig, SchedulerConfig};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub render: RenderConfig,
    pub scheduler: SchedulerConfig,
    /// Initial step length in milliseconds.
    pub tempo_ms: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            scheduler: SchedulerConfig::default(),
            tempo_ms: lb_master::DEFAULT_STEP_MILLIS,
        }
    }
}

impl AppConfig {
    /// Nested keys use a double underscore, e.g.
    /// `LOOPBOX_SCHEDULER__LOOKAHEAD_MS=150`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(
                Environment::with_prefix("LOOPBOX")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
