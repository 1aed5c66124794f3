use std::path::PathBuf;

use thiserror::Error;

use crate::env::get_env_var_opt;

/// Environment variable consulted when no config path is passed on the command line.
pub const CONFIG_PATH_ENV: &str = "SPREADS_CONFIG";

/// Errors related to locating application configuration.
#[derive(Debug, Error)]
pub enum ConfigPathError {
    /// Neither a CLI flag nor the environment named a config file.
    #[error("No config file given: pass --config or set {CONFIG_PATH_ENV}")]
    Unspecified,

    /// The resolved path does not point at a readable file.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Picks the config file path: an explicit CLI value wins over `SPREADS_CONFIG`.
pub fn resolve_config_path(cli_value: Option<&str>) -> Result<PathBuf, ConfigPathError> {
    let raw = match cli_value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => get_env_var_opt(CONFIG_PATH_ENV).ok_or(ConfigPathError::Unspecified)?,
    };
    let path = PathBuf::from(raw);
    if !path.is_file() {
        return Err(ConfigPathError::NotFound(path));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn cli_value_wins_and_must_exist() {
        let err = resolve_config_path(Some("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigPathError::NotFound(_)));

        let this_file = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");
        let path = resolve_config_path(Some(this_file)).unwrap();
        assert!(path.ends_with("Cargo.toml"));
    }

    #[test]
    #[serial]
    fn unspecified_without_env() {
        unsafe { std::env::remove_var(CONFIG_PATH_ENV) };
        assert!(matches!(
            resolve_config_path(None),
            Err(ConfigPathError::Unspecified)
        ));
    }
}
