pub mod error;

pub use error::*;

use fibfactory_core::{LifecycleError, ProjectName};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "fibfactory.yaml";
pub const SETTINGS_DIR: &str = ".fibfactory";

pub const CONFIG_PATH_ENV: &str = "FIBFACTORY_CONFIG";
pub const PULUMI_BINARY_ENV: &str = "FIBFACTORY_PULUMI_BINARY";
pub const WORK_DIR_ENV: &str = "FIBFACTORY_WORK_DIR";
pub const BACKEND_URL_ENV: &str = "PULUMI_BACKEND_URL";

/// fibfactory settings
///
/// Every field has a default, so an empty file (or no file at all) yields
/// the stock `fibfactory` project deploying to App Runner in us-west-2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Project name; every stack is named `{project}-{env}`
    pub project: String,

    /// Port the demo service listens on inside the container
    pub container_port: u16,

    pub region: String,

    /// Repository the service image is pushed to, tagged with the app name
    pub image_repository: String,

    pub registry_server: String,

    /// Docker build context, relative to the directory fibfactory runs in
    pub build_context: PathBuf,

    pub platform: String,

    pub instance: InstanceSettings,

    pub pulumi: PulumiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project: "fibfactory".to_string(),
            container_port: 8080,
            region: "us-west-2".to_string(),
            image_repository: "public.ecr.aws/o2l3o3x9/adamgordonbell".to_string(),
            registry_server: "public.ecr.aws".to_string(),
            build_context: PathBuf::from("."),
            platform: "linux/amd64".to_string(),
            instance: InstanceSettings::default(),
            pulumi: PulumiSettings::default(),
        }
    }
}

/// App Runner instance size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstanceSettings {
    pub cpu: String,
    pub memory: String,
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            cpu: "1024".to_string(),
            memory: "2048".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PulumiSettings {
    pub binary: PathBuf,

    /// Directory the program is written to and run from
    pub work_dir: Option<PathBuf>,

    /// State backend; the pulumi login default is used when unset
    pub backend_url: Option<String>,
}

impl Default for PulumiSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("pulumi"),
            work_dir: None,
            backend_url: None,
        }
    }
}

impl Settings {
    /// Parse a settings file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `FIBFACTORY_PULUMI_BINARY`, `FIBFACTORY_WORK_DIR` and `PULUMI_BACKEND_URL`
    pub fn apply_env_overrides(&mut self) {
        if let Some(binary) = non_empty_env(PULUMI_BINARY_ENV) {
            self.pulumi.binary = PathBuf::from(binary);
        }
        if let Some(work_dir) = non_empty_env(WORK_DIR_ENV) {
            self.pulumi.work_dir = Some(PathBuf::from(work_dir));
        }
        if let Some(url) = non_empty_env(BACKEND_URL_ENV) {
            self.pulumi.backend_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(ConfigError::Invalid("project must not be empty".to_string()));
        }
        if let Err(e) = ProjectName::new(&self.project) {
            let message = match e {
                LifecycleError::InvalidInput(message) => message,
                other => other.to_string(),
            };
            return Err(ConfigError::Invalid(message));
        }
        if self.container_port == 0 {
            return Err(ConfigError::Invalid(
                "container_port must be between 1 and 65535".to_string(),
            ));
        }
        for (field, value) in [
            ("region", &self.region),
            ("image_repository", &self.image_repository),
            ("registry_server", &self.registry_server),
            ("platform", &self.platform),
            ("instance.cpu", &self.instance.cpu),
            ("instance.memory", &self.instance.memory),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }

    /// Directory the infrastructure program is materialized in
    pub fn work_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.pulumi.work_dir {
            return Ok(dir.clone());
        }
        let cache = dirs::cache_dir().ok_or(ConfigError::CacheDirNotFound)?;
        Ok(cache.join("fibfactory").join("program"))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Global settings directory (~/.config/fibfactory)
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("fibfactory");
    Ok(config_dir)
}

/// Find the settings file, searching from `base_dir`
///
/// Priority:
/// 1. `explicit` path (`--config`)
/// 2. `FIBFACTORY_CONFIG`
/// 3. `base_dir/fibfactory.yaml`
/// 4. `base_dir/.fibfactory/fibfactory.yaml`
/// 5. `~/.config/fibfactory/fibfactory.yaml`
///
/// An explicitly requested file that does not exist is an error; finding
/// nothing through discovery is not.
pub fn find_settings_file_in(base_dir: &Path, explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(ConfigError::SettingsFileNotFound(path.to_path_buf()));
    }

    if let Some(path) = non_empty_env(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::SettingsFileNotFound(path));
    }

    let candidates = [
        base_dir.join(SETTINGS_FILE),
        base_dir.join(SETTINGS_DIR).join(SETTINGS_FILE),
    ];
    if let Some(path) = candidates.into_iter().find(|p| p.exists()) {
        return Ok(Some(path));
    }

    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join(SETTINGS_FILE);
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}

/// Find the settings file from the current directory
pub fn find_settings_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    let current_dir = std::env::current_dir()?;
    find_settings_file_in(&current_dir, explicit)
}

/// Load, override from the environment and validate settings
///
/// Returns the settings together with the file they came from, if any.
pub fn load_settings(explicit: Option<&Path>) -> Result<(Settings, Option<PathBuf>)> {
    let path = find_settings_file(explicit)?;
    let mut settings = match &path {
        Some(path) => {
            tracing::debug!("Loading settings from {}", path.display());
            Settings::load(path)?
        }
        None => {
            tracing::debug!("No settings file found, using defaults");
            Settings::default()
        }
    };
    settings.apply_env_overrides();
    settings.validate().map_err(|e| match (e, &path) {
        (ConfigError::Invalid(message), Some(path)) => ConfigError::InvalidFile {
            path: path.clone(),
            message,
        },
        (e, _) => e,
    })?;
    Ok((settings, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    /// Runs `f` with no settings-related environment and an empty global config dir
    fn isolated<R>(f: impl FnOnce() -> R) -> R {
        let home = tempfile::tempdir().unwrap();
        temp_env::with_vars(
            [
                (CONFIG_PATH_ENV, None),
                (PULUMI_BINARY_ENV, None),
                (WORK_DIR_ENV, None),
                (BACKEND_URL_ENV, None),
                ("XDG_CONFIG_HOME", Some(home.path().to_str().unwrap())),
            ],
            f,
        )
    }

    #[test]
    fn test_defaults_match_stock_project() {
        let settings = Settings::default();
        assert_eq!(settings.project, "fibfactory");
        assert_eq!(settings.container_port, 8080);
        assert_eq!(settings.region, "us-west-2");
        assert_eq!(settings.instance.cpu, "1024");
        assert_eq!(settings.instance.memory, "2048");
        assert_eq!(settings.pulumi.binary, PathBuf::from("pulumi"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(
            &path,
            "project: fibdemo\ncontainer_port: 9000\ninstance:\n  memory: \"4096\"\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.project, "fibdemo");
        assert_eq!(settings.container_port, 9000);
        assert_eq!(settings.instance.memory, "4096");
        assert_eq!(settings.instance.cpu, "1024");
        assert_eq!(settings.region, "us-west-2");
    }

    #[test]
    fn test_load_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "\n").unwrap();

        assert_eq!(Settings::load(&path).unwrap(), Settings::default());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "projct: typo\n").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let settings = Settings {
            container_port: 0,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_project_charset() {
        let settings = Settings {
            project: "web shop".to_string(),
            ..Default::default()
        };
        match settings.validate() {
            Err(ConfigError::Invalid(message)) => assert!(message.contains("'web shop'")),
            other => panic!("unexpected result: {:?}", other),
        }

        let settings = Settings {
            project: "p".repeat(80),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    #[serial]
    fn test_invalid_settings_name_their_file() {
        isolated(|| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join(SETTINGS_FILE);
            fs::write(&path, "project: web shop\n").unwrap();

            let err = load_settings(Some(path.as_path())).unwrap_err();
            match &err {
                ConfigError::InvalidFile { path: reported, .. } => assert_eq!(reported, &path),
                other => panic!("unexpected error: {:?}", other),
            }
            assert!(err.to_string().contains(SETTINGS_FILE));
        });
    }

    #[test]
    #[serial]
    fn test_find_in_base_dir() {
        isolated(|| {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join(SETTINGS_FILE), "project: a\n").unwrap();

            let found = find_settings_file_in(dir.path(), None).unwrap();
            assert_eq!(found, Some(dir.path().join(SETTINGS_FILE)));
        });
    }

    #[test]
    #[serial]
    fn test_find_in_settings_dir() {
        isolated(|| {
            let dir = tempfile::tempdir().unwrap();
            let settings_dir = dir.path().join(SETTINGS_DIR);
            fs::create_dir(&settings_dir).unwrap();
            fs::write(settings_dir.join(SETTINGS_FILE), "project: a\n").unwrap();

            let found = find_settings_file_in(dir.path(), None).unwrap().unwrap();
            assert!(found.ends_with(".fibfactory/fibfactory.yaml"));
        });
    }

    #[test]
    #[serial]
    fn test_find_nothing() {
        isolated(|| {
            let dir = tempfile::tempdir().unwrap();
            assert_eq!(find_settings_file_in(dir.path(), None).unwrap(), None);
        });
    }

    #[test]
    #[serial]
    fn test_explicit_path_wins() {
        isolated(|| {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join(SETTINGS_FILE), "project: a\n").unwrap();
            let custom = dir.path().join("custom.yaml");
            fs::write(&custom, "project: b\n").unwrap();

            let found = find_settings_file_in(dir.path(), Some(&custom)).unwrap();
            assert_eq!(found, Some(custom));
        });
    }

    #[test]
    #[serial]
    fn test_missing_explicit_path_is_error() {
        isolated(|| {
            let dir = tempfile::tempdir().unwrap();
            let missing = dir.path().join("missing.yaml");

            let err = find_settings_file_in(dir.path(), Some(&missing)).unwrap_err();
            assert!(matches!(err, ConfigError::SettingsFileNotFound(p) if p == missing));
        });
    }

    #[test]
    #[serial]
    fn test_env_path() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("env.yaml");
        fs::write(&custom, "project: c\n").unwrap();

        isolated(|| {
            temp_env::with_var(CONFIG_PATH_ENV, Some(custom.to_str().unwrap()), || {
                let found = find_settings_file_in(dir.path(), None).unwrap();
                assert_eq!(found, Some(custom.clone()));
            });
        });
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        isolated(|| {
            temp_env::with_vars(
                [
                    (PULUMI_BINARY_ENV, Some("/opt/pulumi/bin/pulumi")),
                    (WORK_DIR_ENV, Some("/tmp/fib-work")),
                    (BACKEND_URL_ENV, Some("file:///tmp/state")),
                ],
                || {
                    let mut settings = Settings::default();
                    settings.apply_env_overrides();

                    assert_eq!(
                        settings.pulumi.binary,
                        PathBuf::from("/opt/pulumi/bin/pulumi")
                    );
                    assert_eq!(settings.work_dir().unwrap(), PathBuf::from("/tmp/fib-work"));
                    assert_eq!(
                        settings.pulumi.backend_url.as_deref(),
                        Some("file:///tmp/state")
                    );
                },
            );
        });
    }

    #[test]
    fn test_get_config_dir() {
        if let Ok(dir) = get_config_dir() {
            assert!(dir.ends_with("fibfactory"));
        }
    }
}
