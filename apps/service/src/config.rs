use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::IntervalLimits;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },
    #[error("Failed to write config file {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },
    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("Invalid value for {name}: {value}")]
    InvalidOverride { name: &'static str, value: String },
    #[error("Neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub monitoring: MonitoringConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub probe_timeout_seconds: u64,
    pub default_interval_seconds: u64,
    pub min_interval_seconds: u64,
    pub max_interval_seconds: u64,
    /// How often the target set is reloaded while running, 0 disables
    pub reload_interval_seconds: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Log,
    Webhook,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Log => write!(f, "log"),
            TransportKind::Webhook => write!(f, "webhook"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub transport: TransportKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub timeout_seconds: u64,
    pub signature: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "watchdog.db".into(), max_connections: 8 }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            probe_timeout_seconds: 10,
            default_interval_seconds: 300,
            min_interval_seconds: 30,
            max_interval_seconds: 86_400,
            reload_interval_seconds: 30,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Log,
            webhook_url: None,
            timeout_seconds: 10,
            signature: "Watchdog Service Monitor".into(),
        }
    }
}

impl MonitoringConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds.max(1))
    }

    pub fn interval_limits(&self) -> IntervalLimits {
        IntervalLimits {
            min_seconds: self.min_interval_seconds,
            max_seconds: self.max_interval_seconds,
        }
    }

    pub fn reload_interval(&self) -> Option<Duration> {
        (self.reload_interval_seconds > 0).then(|| Duration::from_secs(self.reload_interval_seconds))
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

/// Get default config path ($XDG_CONFIG_HOME/watchdog/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("watchdog/config.toml"))
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

        writeln!(f, "Current Configuration:")?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;
        write_1(f, "Max Connections", &self.database.max_connections)?;

        let monitoring = &self.monitoring;
        write_title_1(f, "Monitoring")?;
        write_1(f, "Probe Timeout (s)", &monitoring.probe_timeout_seconds)?;
        write_1(f, "Default Interval (s)", &monitoring.default_interval_seconds)?;
        write_1(
            f,
            "Interval Range (s)",
            &format!("{}-{}", monitoring.min_interval_seconds, monitoring.max_interval_seconds),
        )?;
        write_1(f, "Reload Interval (s)", &monitoring.reload_interval_seconds)?;

        let notifications = &self.notifications;
        write_title_1(f, "Notifications")?;
        write_1(f, "Transport", &notifications.transport)?;
        // Webhook URLs often embed tokens; only show the host
        let webhook = notifications
            .webhook_url
            .as_deref()
            .and_then(|raw| url::Url::parse(raw).ok())
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "(not set)".into());
        write_1(f, "Webhook Host", &webhook)?;
        write_1(f, "Timeout (s)", &notifications.timeout_seconds)?;
        write_1(f, "Signature", &notifications.signature)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/watchdog/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```no_run
    /// # use std::path;
    /// use watchdog_service::config::Config;
    /// let cfg = Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// # Ok::<(), watchdog_service::config::ConfigError>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())
                .map_err(|source| ConfigError::ParseFailed { path: config_path, source })
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Load from file, then apply `WATCHDOG_*` environment overrides
    pub fn load(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let mut config = Self::from_config(optional_path)?;
        config.apply_overrides(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = lookup("WATCHDOG_DATABASE_PATH") {
            self.database.path = path;
        }

        if let Some(url) = lookup("WATCHDOG_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(url);
            self.notifications.transport = TransportKind::Webhook;
        }

        if let Some(value) = lookup("WATCHDOG_PROBE_TIMEOUT") {
            self.monitoring.probe_timeout_seconds = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { name: "WATCHDOG_PROBE_TIMEOUT", value })?;
        }

        Ok(())
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let requested = dir.path().join("nested/watchdog");

        let config = Config::from_config(Some(&requested)).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("nested/watchdog.toml").exists());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[monitoring]\nprobe_timeout_seconds = 3\n\n[notifications]\ntransport = \"webhook\"\nwebhook_url = \"https://hooks.example.com/t/secret\"\n",
        )
        .unwrap();

        let config = Config::from_config(Some(&path)).unwrap();
        assert_eq!(config.monitoring.probe_timeout(), Duration::from_secs(3));
        assert_eq!(config.monitoring.default_interval_seconds, 300);
        assert_eq!(config.notifications.transport, TransportKind::Webhook);
        assert_eq!(config.database.path, "watchdog.db");

        let rendered = config.to_string();
        assert!(rendered.contains("hooks.example.com"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[monitoring\n").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(ConfigError::ParseFailed { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("WATCHDOG_DATABASE_PATH", "/var/lib/watchdog.db"),
            ("WATCHDOG_WEBHOOK_URL", "http://localhost:9000/hook"),
            ("WATCHDOG_PROBE_TIMEOUT", "5"),
        ]);

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(config.database.path, "/var/lib/watchdog.db");
        assert_eq!(config.notifications.transport, TransportKind::Webhook);
        assert_eq!(config.monitoring.probe_timeout_seconds, 5);

        let result = config.apply_overrides(|name| {
            (name == "WATCHDOG_PROBE_TIMEOUT").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidOverride { .. })));
    }
}
