use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read config file: {0}")]
    ReadFailed(#[source] std::io::Error),
    #[error("Failed to write config file: {0}")]
    WriteFailed(#[source] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("No config directory available")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub probe: ProbeConfig,
    pub server: ServerConfig,
    pub trigger: TriggerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between ticks of the in-process timer
    pub tick_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Shared secret for the external tick trigger; unset disables it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron_secret: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "pingboard.db".into(), max_connections: 16 }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_seconds: 30 }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { user_agent: format!("pingboard/{}", env!("CARGO_PKG_VERSION")) }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 8080 }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/pingboard/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("pingboard/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;
        write_1(f, "Max Connections", &self.database.max_connections)?;
        write_title_1(f, "Scheduler")?;
        write_1(f, "Tick Seconds", &self.scheduler.tick_seconds)?;
        write_title_1(f, "Probe")?;
        write_1(f, "User Agent", &self.probe.user_agent)?;
        write_title_1(f, "Server")?;
        write_1(f, "Bind Address", &self.server.bind)?;
        write_1(f, "Port", &self.server.port)?;
        write_title_1(f, "Trigger")?;
        let secret = if self.trigger.cron_secret.is_some() { "set" } else { "unset" };
        write_1(f, "Cron Secret", &secret)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/pingboard/config.toml
    ///  or the specified path, with the name config.toml if one does not exist.
    /// Environment overrides are applied afterwards and never written back.
    ///
    /// ```rust,no_run
    /// # use std::path;
    /// # use pingboard_service::config;
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// # Ok::<(), config::Error>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let mut config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(Error::ReadFailed)?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.apply_env_overrides(|name| env::var(name).ok());
        Ok(config)
    }

    /// Override file values with `CRON_SECRET` and `PINGBOARD_DATABASE_PATH`
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup("CRON_SECRET").filter(|s| !s.is_empty()) {
            self.trigger.cron_secret = Some(secret);
        }
        if let Some(path) = lookup("PINGBOARD_DATABASE_PATH").filter(|s| !s.is_empty()) {
            self.database.path = path;
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::WriteFailed)?;
        }

        std::fs::write(path, config_str).map_err(Error::WriteFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/config.toml");

        let config = Config::from_config(Some(&path))?;

        assert!(path.exists());
        assert_eq!(config.scheduler.tick_seconds, 30);
        assert_eq!(config.server.port, 8080);
        assert_eq!(toml::from_str::<Config>(&fs::read_to_string(&path)?)?.database, config.database);
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scheduler]\ntick_seconds = 10\n\n[trigger]\ncron_secret = \"hunter2\"\n")?;

        let config = Config::from_config(Some(&path))?;

        assert_eq!(config.scheduler.tick_seconds, 10);
        assert_eq!(config.database.path, "pingboard.db");
        // CRON_SECRET in the test environment would override this
        if env::var("CRON_SECRET").is_err() {
            assert_eq!(config.trigger.cron_secret.as_deref(), Some("hunter2"));
        }
        Ok(())
    }

    #[test]
    fn test_extension_is_normalized() {
        assert_eq!(normalize_toml_path(path::Path::new("/tmp/pingboard")), path::PathBuf::from("/tmp/pingboard.toml"));
        assert_eq!(normalize_toml_path(path::Path::new("/tmp/a.toml")), path::PathBuf::from("/tmp/a.toml"));
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scheduler\n")?;

        assert!(matches!(Config::from_config(Some(&path)), Err(Error::ParseFailed(_))));
        Ok(())
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(|name| match name {
            "CRON_SECRET" => Some("s3cret".into()),
            "PINGBOARD_DATABASE_PATH" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.trigger.cron_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.database.path, "pingboard.db");
    }
}
