//! Helpers for reading user configuration. Every failure here is the user's to fix, so all of
//! them surface as [`CheckError::Configuration`] (a `FAILED` verdict, not a crash).

use std::{fs, path::Path};

use serde::de::DeserializeOwned;

use crate::CheckError;

/// Reads a JSON (`.json`) or TOML (`.toml`) file into `T`.
pub fn load_config_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, CheckError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|err| {
        CheckError::configuration(format!(
            "Could not read configuration file {}: {err}",
            path.display()
        ))
    })?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("json") => serde_json::from_str(&raw).map_err(|err| invalid(path, err)),
        Some("toml") => toml::from_str(&raw).map_err(|err| invalid(path, err)),
        _ => Err(CheckError::configuration(format!(
            "Unsupported configuration file format: {} (expected .json or .toml)",
            path.display()
        ))),
    }
}

fn invalid(path: &Path, err: impl std::fmt::Display) -> CheckError {
    CheckError::configuration(format!(
        "Invalid configuration file {}: {err}",
        path.display()
    ))
}

/// Value of a mandatory environment variable.
pub fn require_env(name: &str) -> Result<String, CheckError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) => Err(CheckError::configuration(format!(
            "Environment variable {name} is empty"
        ))),
        Err(_) => Err(CheckError::configuration(format!(
            "Environment variable {name} is not set"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use tempfile::TempDir;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Rules {
        max_age_days: u32,
        #[serde(default)]
        allowed: Vec<String>,
    }

    #[test]
    fn reads_json_and_toml() {
        let dir = TempDir::new().expect("temp dir");
        let json = dir.path().join("rules.json");
        fs::write(&json, r#"{"max_age_days": 30, "allowed": ["a"]}"#).unwrap();
        let toml_path = dir.path().join("rules.toml");
        fs::write(&toml_path, "max_age_days = 7\n").unwrap();

        assert_eq!(
            load_config_file::<Rules>(&json).unwrap(),
            Rules {
                max_age_days: 30,
                allowed: vec!["a".into()]
            }
        );
        assert_eq!(load_config_file::<Rules>(&toml_path).unwrap().max_age_days, 7);
    }

    #[test]
    fn failures_are_configuration_errors() {
        let dir = TempDir::new().expect("temp dir");
        let broken = dir.path().join("rules.json");
        fs::write(&broken, "{").unwrap();
        let yaml = dir.path().join("rules.yaml");
        fs::write(&yaml, "max_age_days: 1").unwrap();

        for path in [broken, yaml, dir.path().join("missing.toml")] {
            let err = load_config_file::<Rules>(&path).unwrap_err();
            assert!(matches!(err, CheckError::Configuration(_)), "{err:?}");
            assert!(err.to_string().contains(&path.display().to_string()));
        }
    }

    #[test]
    fn missing_env_is_configuration_error() {
        let err = require_env("AUTOPILOT_TEST_SURELY_UNSET_VARIABLE").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment variable AUTOPILOT_TEST_SURELY_UNSET_VARIABLE is not set"
        );
    }
}
