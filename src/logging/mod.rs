//! Structured logging helpers
//!
//! The subscriber itself is installed by the CLI; this module turns the
//! `[logging]` configuration into an `EnvFilter` directive string.

use crate::config::LoggingConfig;

/// Build filter directives string from LoggingConfig
///
/// Produces the base level followed by one `inspector::<component>=<level>`
/// directive per configured component, sorted by component name.
///
/// # Examples
///
/// ```
/// use inspector::config::{LogFormat, LoggingConfig};
/// use inspector::logging::build_filter_directives;
/// use std::collections::HashMap;
///
/// let mut component_levels = HashMap::new();
/// component_levels.insert("network".to_string(), "debug".to_string());
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Pretty,
///     component_levels: Some(component_levels),
///     log_predictions: false,
/// };
///
/// assert_eq!(build_filter_directives(&config), "info,inspector::network=debug");
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    if let Some(component_levels) = &config.component_levels {
        let mut components: Vec<_> = component_levels.iter().collect();
        components.sort();
        for (component, level) in components {
            filter_str.push_str(&format!(",inspector::{}={}", component, level));
        }
    }

    filter_str
}
