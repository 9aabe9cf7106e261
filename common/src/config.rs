// common/src/config.rs
use config::{Config as ConfigFile, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Central configuration for the gateway.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// Packaged browser client settings.
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    /// Explicit path to the client package archive. When unset the
    /// platform-specific Steam install location is tried.
    #[serde(default)]
    pub package: Option<PathBuf>,
}

impl ClientConfig {
    /// Resolve the archive path, falling back to the platform default.
    pub fn package_path(&self) -> Option<PathBuf> {
        self.package.clone().or_else(default_package_path)
    }
}

/// Default Steam install location of the client package.
///
/// Only Windows and macOS ship the packaged client; other platforms must
/// configure the path explicitly.
pub fn default_package_path() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        Some(PathBuf::from(
            "C:\\Program Files (x86)\\Steam\\steamapps\\common\\Screeps\\package.nw",
        ))
    } else if cfg!(target_os = "macos") {
        let home = env::var_os("HOME")?;
        let mut path = PathBuf::from(home);
        path.push("Library/Application Support/Steam/steamapps/common/Screeps/package.nw");
        Some(path)
    } else {
        None
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from environment variables directly, falling back to defaults
    /// when no config files are present.
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                Self {
                    client: ClientConfig {
                        package: env::var("CLIENT_PACKAGE_PATH").ok().map(PathBuf::from),
                    },
                }
            }
        }
    }
}
