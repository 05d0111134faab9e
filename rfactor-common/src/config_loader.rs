//! Modular configuration loader.
//!
//! Supports loading configuration from multiple files:
//! - `config.json` - Core configuration (network, observability, scanner)
//! - `scanner.json` - Scanner section only, merged over `config.json`
//!
//! Files are loaded from `~/.rfactor/` with proper merging.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::config_dir;

/// Configuration file names
pub const CONFIG_FILES: &[&str] = &["config.json", "scanner.json"];

/// Read one JSON file; `None` when it is absent.
fn load_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(Some(value))
}

/// Deep merge `overlay` into `base`. Objects merge key by key; any other
/// overlay value replaces the base value.
fn merge_json(base: &mut Value, overlay: Value) {
    let Value::Object(overlay_map) = overlay else {
        *base = overlay;
        return;
    };

    if let Value::Object(base_map) = base {
        for (key, value) in overlay_map {
            merge_json(base_map.entry(key).or_insert(Value::Null), value);
        }
    } else {
        *base = Value::Object(overlay_map);
    }
}

/// Load modular configuration from the config directory.
///
/// Priority (lowest to highest):
/// 1. `config.json`
/// 2. `scanner.json` (merged into the `scanner` section)
/// 3. Environment variables (applied separately)
pub fn load_modular_config(dir: Option<PathBuf>) -> Result<Value> {
    let cfg_dir = dir.unwrap_or_else(config_dir);

    let config_path = cfg_dir.join("config.json");
    let mut config = load_json_file(&config_path)?.unwrap_or(Value::Object(Default::default()));

    tracing::debug!("Loading modular config from {}", cfg_dir.display());

    if let Some(scanner) = load_json_file(&cfg_dir.join("scanner.json"))? {
        if let Some(config_obj) = config.as_object_mut() {
            match config_obj.get_mut("scanner") {
                Some(existing) => merge_json(existing, scanner),
                None => {
                    config_obj.insert("scanner".to_string(), scanner);
                }
            }
        }
        tracing::debug!("Loaded scanner.json");
    }

    Ok(config)
}

/// Check which modular config files exist.
pub fn check_modular_files(dir: Option<PathBuf>) -> Vec<(String, bool)> {
    let cfg_dir = dir.unwrap_or_else(config_dir);

    CONFIG_FILES
        .iter()
        .map(|file| {
            let path = cfg_dir.join(file);
            (file.to_string(), path.exists())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_untouched_sections() {
        let mut base = json!({
            "network": { "bind": "0.0.0.0" },
            "scanner": { "port": 4440, "market_suffix": ".NS" }
        });
        let overlay = json!({
            "scanner": { "port": 4600, "min_bars": 10 }
        });

        merge_json(&mut base, overlay);

        assert_eq!(base["network"]["bind"], "0.0.0.0");
        assert_eq!(base["scanner"]["port"], 4600);
        assert_eq!(base["scanner"]["market_suffix"], ".NS");
        assert_eq!(base["scanner"]["min_bars"], 10);
    }

    #[test]
    fn test_merge_replaces_lists_wholesale() {
        let mut base = json!({ "universe": ["TCS", "INFY", "WIPRO"] });
        merge_json(&mut base, json!({ "universe": ["SBIN"] }));
        assert_eq!(base["universe"], json!(["SBIN"]));

        let mut scalar = json!(null);
        merge_json(&mut scalar, json!({ "port": 1 }));
        assert_eq!(scalar["port"], 1);
    }

    #[test]
    fn test_scanner_file_overrides_config_section() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{ "scanner": { "port": 4500, "cache_ttl_secs": 90 } }"#,
        )
        .unwrap();
        fs::write(dir.path().join("scanner.json"), r#"{ "cache_ttl_secs": 30 }"#).unwrap();

        let value = load_modular_config(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(value["scanner"]["port"], 4500);
        assert_eq!(value["scanner"]["cache_ttl_secs"], 30);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "{ not json").unwrap();

        assert!(load_modular_config(Some(dir.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_check_modular_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("scanner.json"), "{}").unwrap();

        let files = check_modular_files(Some(dir.path().to_path_buf()));
        assert_eq!(
            files,
            vec![("config.json".to_string(), false), ("scanner.json".to_string(), true)]
        );
    }
}
