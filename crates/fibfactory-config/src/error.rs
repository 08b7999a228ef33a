use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error("Cache directory not found; set pulumi.work_dir or FIBFACTORY_WORK_DIR")]
    CacheDirNotFound,

    #[error("Settings file not found: {}", .0.display())]
    SettingsFileNotFound(PathBuf),

    #[error("Failed to parse settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid settings: {0}")]
    Invalid(String),

    #[error("Invalid settings in {}: {message}", path.display())]
    InvalidFile { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
