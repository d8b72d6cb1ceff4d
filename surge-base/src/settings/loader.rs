use std::{
    env,
    path::{Path, PathBuf},
};

use config::{Config, Environment, File, FileFormat};
use eyre::{eyre, Context, Result};
use itertools::Itertools;

use super::{RawSettings, Settings};

const ENV_PREFIX: &str = "SURGE";
const DEFAULT_CONFIG_DIR: &str = "./config";

/// Load the settings from `./config`, `CONFIG_FILES`, the extra `files` and
/// the `SURGE_` environment.
pub fn load_settings(files: &[PathBuf]) -> Result<Settings> {
    // a missing .env file is not an error
    let _ = dotenvy::dotenv();

    let mut all_files: Vec<PathBuf> = env::var("CONFIG_FILES")
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default();
    all_files.extend(files.iter().cloned());

    load_settings_from(Path::new(DEFAULT_CONFIG_DIR), &all_files)
}

/// Load the settings with an explicit config directory. Files in `config_dir`
/// are optional, every path in `files` must exist.
pub fn load_settings_from(config_dir: &Path, files: &[PathBuf]) -> Result<Settings> {
    let mut builder = Config::builder();

    for path in default_config_files(config_dir)? {
        builder = builder.add_source(File::from(path).format(FileFormat::Json));
    }

    for path in files {
        if !path.exists() {
            return Err(eyre!("Provided config path does not exist ({path:?})"));
        }
        if !path.is_file() {
            return Err(eyre!("Provided config path is not a file ({path:?})"));
        }
        if path.extension() != Some("json".as_ref()) {
            return Err(eyre!(
                "Provided config path is of an unsupported type ({path:?})"
            ));
        }
        builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Json));
    }

    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .context("Failed to load config sources")?;

    let raw: RawSettings = config
        .try_deserialize()
        .context("Config deserialization error")?;

    Settings::try_from(raw)
}

fn default_config_files(config_dir: &Path) -> Result<Vec<PathBuf>> {
    if !config_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in config_dir
        .read_dir()
        .context("Failed to open config directory")?
    {
        let path = entry.context("Failed to read config directory entry")?.path();
        if path.is_file() && path.extension() == Some("json".as_ref()) {
            files.push(path);
        }
    }
    Ok(files.into_iter().sorted().collect())
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use super::*;

    #[test]
    fn later_files_override_earlier_ones() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("config");
        fs::create_dir(&config_dir).unwrap();
        fs::write(
            config_dir.join("base.json"),
            r#"{"wallet_count": 3, "tx_per_wallet": 4}"#,
        )
        .unwrap();

        let extra = dir.path().join("extra.json");
        fs::write(
            &extra,
            r#"{"tx_per_wallet": 7, "receipt_timeout_secs": 5, "tracing": {"level": "debug"}}"#,
        )
        .unwrap();

        let settings = load_settings_from(&config_dir, &[extra]).unwrap();
        assert_eq!(settings.wallet_count, 3);
        assert_eq!(settings.tx_per_wallet, 7);
        assert_eq!(settings.receipt_timeout, Duration::from_secs(5));
        assert_eq!(settings.tracing.level(), super::super::Level::Debug);
    }

    #[test]
    fn missing_config_dir_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("nope"), &[]).unwrap();
        assert_eq!(settings.receipt_workers, 10);
    }

    #[test]
    fn missing_or_unsupported_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(load_settings_from(dir.path(), &[missing]).is_err());

        let toml = dir.path().join("settings.toml");
        fs::write(&toml, "wallet_count = 2").unwrap();
        let err = load_settings_from(dir.path(), &[toml]).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }
}
