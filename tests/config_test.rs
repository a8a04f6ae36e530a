// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use plc_monitor::config::Config;
use std::fs;
use std::path::Path;
use std::sync::Once;
use tempfile::tempdir;

static INIT: Once = Once::new();

fn setup() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

#[test]
fn test_missing_file_is_created_with_defaults() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let config = Config::from_file(&config_path)?;
    assert!(config_path.exists());
    assert_eq!(config.plc.port, 502);
    assert_eq!(config.acquisition.window_capacity, 900);

    // The generated file loads back to the same values
    let reloaded = Config::from_file(&config_path)?;
    assert_eq!(reloaded.plc, config.plc);
    assert_eq!(reloaded.acquisition, config.acquisition);
    assert_eq!(reloaded.data_log, config.data_log);
    Ok(())
}

#[test]
fn test_full_config_with_inline_and_csv_parameters() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(
        temp_dir.path().join("parameters.csv"),
        "Parameter,Address,Range\nPressure,%MW102,0-10\nOffset,%MW104,-10--5\n",
    )?;
    fs::write(
        &config_path,
        r#"
plc:
  address: 192.168.1.20
  port: 1502
  unit_id: 2
  reconnect_interval_secs: 10
acquisition:
  interval_ms: 500
  window_capacity: 1800
data_log:
  enabled: false
parameters:
  file: parameters.csv
  list:
    - name: Temperature
      address: 100
      min_value: 0
      max_value: 150
"#,
    )?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.plc.address, "192.168.1.20");
    assert_eq!(config.plc.port, 1502);
    assert_eq!(config.plc.unit_id, 2);
    assert_eq!(config.plc.read_timeout_ms, 1000);
    assert_eq!(config.acquisition.interval_ms, 500);
    assert!(!config.data_log.enabled);

    let parameters = config.load_parameters()?;
    let names: Vec<&str> = parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Temperature", "Pressure", "Offset"]);
    assert_eq!(parameters[2].address, 104);
    assert_eq!(parameters[2].min_value, -10.0);
    assert_eq!(parameters[2].max_value, -5.0);
    Ok(())
}

#[test]
fn test_schema_violation_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, "plc:\n  port: 99999\n")?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err(), "Config loading should have failed");

    let sample_path = config_path.with_extension("sample.yaml");
    assert!(Path::new(&sample_path).exists(), "Sample config file was not created");
    let sample = Config::from_file(&sample_path)?;
    assert_eq!(sample.plc.port, 502);
    Ok(())
}

#[test]
fn test_duplicate_inline_names_are_rejected() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(
        &config_path,
        r#"
parameters:
  list:
    - { name: Level, address: 0, min_value: 0, max_value: 1 }
    - { name: Level, address: 2, min_value: 0, max_value: 1 }
"#,
    )?;

    let err = Config::from_file(&config_path).unwrap_err();
    assert!(format!("{:#}", err).contains("Level"));
    assert!(config_path.with_extension("sample.yaml").exists());
    Ok(())
}

#[test]
fn test_duplicate_between_inline_and_csv_is_rejected() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(
        temp_dir.path().join("more.csv"),
        "Parameter,Address,Range\nLevel,%MW10,0-1\n",
    )?;
    fs::write(
        &config_path,
        "parameters:\n  file: more.csv\n  list:\n    - { name: Level, address: 0, min_value: 0, max_value: 1 }\n",
    )?;

    let config = Config::from_file(&config_path)?;
    assert!(config.load_parameters().is_err());
    Ok(())
}

#[test]
fn test_wrong_type_is_rejected() {
    setup();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, "acquisition:\n  interval_ms: fast\n").unwrap();
    assert!(Config::from_file(&config_path).is_err());
}
