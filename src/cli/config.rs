//! `inspector config init`

use crate::cli::ConfigInitArgs;
use crate::config::InspectorConfig;
use std::fs;

/// Annotated defaults shipped inside the binary.
const EXAMPLE_CONFIG: &str = include_str!("../../inspector.example.toml");

/// Write the annotated defaults to `args.output`.
///
/// An existing file is only replaced with `--force`. Missing parent
/// directories are created.
pub fn handle_config_init(args: &ConfigInitArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.output.exists() && !args.force {
        return Err(format!(
            "File already exists: {}. Use --force to overwrite.",
            args.output.display()
        )
        .into());
    }

    let defaults: InspectorConfig = toml::from_str(EXAMPLE_CONFIG)?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.output, EXAMPLE_CONFIG)?;

    let hw = &defaults.hardware;
    println!("✓ Configuration file created: {}", args.output.display());
    println!(
        "  Pins: sensor1={} sensor2={} solenoid={} ejector={} ai_toggle={}",
        hw.sensor1_pin,
        hw.sensor2_pin,
        hw.solenoid_pin,
        hw.ejector_pin,
        hw.ai_toggle_pin
            .map_or_else(|| "none".to_string(), |p| p.to_string())
    );
    println!("  Set endpoints.image_url and endpoints.inference_url for your line.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init(output: std::path::PathBuf, force: bool) -> Result<(), Box<dyn std::error::Error>> {
        handle_config_init(&ConfigInitArgs { output, force })
    }

    #[test]
    fn test_config_init_creates_loadable_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("inspector.toml");

        init(output_path.clone(), false).unwrap();

        let config = InspectorConfig::load(Some(&output_path)).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.timing.start_delay_ms, 300);
        assert!(config.ejection.fail_safe_eject);
    }

    #[test]
    fn test_config_init_creates_parent_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("line-3").join("inspector.toml");

        init(output_path.clone(), false).unwrap();
        assert!(output_path.exists());
    }

    #[test]
    fn test_config_init_keeps_existing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("inspector.toml");
        fs::write(&output_path, "[timing]\nejection_time_ms = 750\n").unwrap();

        let err = init(output_path.clone(), false).unwrap_err();
        assert!(err.to_string().contains("--force"));

        let config = InspectorConfig::load(Some(&output_path)).unwrap();
        assert_eq!(config.timing.ejection_time_ms, 750);
    }

    #[test]
    fn test_config_init_force_restores_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output_path = temp_dir.path().join("inspector.toml");
        fs::write(&output_path, "[timing]\nejection_time_ms = 750\n").unwrap();

        init(output_path.clone(), true).unwrap();

        let config = InspectorConfig::load(Some(&output_path)).unwrap();
        assert_eq!(config.timing.ejection_time_ms, 500);
    }
}
