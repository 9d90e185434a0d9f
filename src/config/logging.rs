//! `[logging]` section

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

/// Crate modules that accept a per-component level.
pub const COMPONENTS: &[&str] = &[
    "cache",
    "cli",
    "controller",
    "display",
    "hardware",
    "imaging",
    "metrics",
    "network",
    "policy",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable, for an operator at the line
    #[default]
    Pretty,
    /// One JSON object per event, for log shipping
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base filter; may itself be a full `EnvFilter` directive string
    pub level: String,
    pub format: LogFormat,
    /// Level per crate module, e.g. `network = "debug"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_levels: Option<HashMap<String, String>>,
    /// Log every prediction returned by the inference service
    #[serde(default)]
    pub log_predictions: bool,
}

impl LoggingConfig {
    /// First component entry that names an unknown module or level.
    ///
    /// Returns `(component, reason)`.
    pub fn invalid_component(&self) -> Option<(String, String)> {
        let levels = self.component_levels.as_ref()?;
        let mut entries: Vec<_> = levels.iter().collect();
        entries.sort();

        entries.into_iter().find_map(|(component, level)| {
            if !COMPONENTS.contains(&component.as_str()) {
                Some((
                    component.clone(),
                    format!("unknown component (expected one of {})", COMPONENTS.join(", ")),
                ))
            } else if level.parse::<LevelFilter>().is_err() {
                Some((component.clone(), format!("invalid level '{}'", level)))
            } else {
                None
            }
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            component_levels: None,
            log_predictions: false,
        }
    }
}
