//! User configuration and well-known file locations.
//!
//! # Responsibility
//! - Resolve per-user paths once from the home directory.
//! - Load, validate and save the flat YAML configuration blob.
//!
//! # Invariants
//! - No process-global state: paths and config are passed explicitly.
//! - `$TLI_CONF` takes precedence; the home default is the fallback.
//! - Saved config files are readable by the owner only.

use crate::delivery::smtp::SmtpSettings;
use crate::delivery::{MailIdentity, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::split::DEFAULT_MAX_SEGMENT_SIZE;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the config file path.
pub const CONFIG_ENV_VAR: &str = "TLI_CONF";
const CONFIG_FILE_NAME: &str = ".tli_config";
const HISTORY_FILE_NAME: &str = ".tli_history";
const LOG_DIR: &str = ".tli/logs";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    /// Home directory could not be determined.
    NoHomeDir,
    /// No config file at any candidate path.
    NotFound(Vec<PathBuf>),
    Io { path: PathBuf, source: io::Error },
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    Encode(serde_yaml::Error),
    /// A field is missing or malformed.
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoHomeDir => write!(f, "cannot find home directory"),
            Self::NotFound(paths) => {
                let tried: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                write!(f, "cannot find tli config (tried {})", tried.join(", "))
            }
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "cannot parse tli config {}: {source}", path.display())
            }
            Self::Encode(err) => write!(f, "cannot encode tli config: {err}"),
            Self::Invalid(message) => write!(f, "invalid tli config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Encode(err) => Some(err),
            Self::NoHomeDir | Self::NotFound(_) | Self::Invalid(_) => None,
        }
    }
}

/// Per-user file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub home: PathBuf,
    /// Default config path, used when `$TLI_CONF` is unset or unreadable.
    pub config: PathBuf,
    pub history: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    /// Resolves paths from the current user's home directory.
    pub fn from_home_dir() -> ConfigResult<Self> {
        let home = dirs::home_dir()
            .filter(|home| !home.as_os_str().is_empty())
            .ok_or(ConfigError::NoHomeDir)?;
        Ok(Self::with_home(home))
    }

    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            config: home.join(CONFIG_FILE_NAME),
            history: home.join(HISTORY_FILE_NAME),
            log_dir: home.join(LOG_DIR),
            home,
        }
    }

    /// Config candidates in lookup order.
    pub fn config_candidates(&self, env_override: Option<PathBuf>) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(2);
        if let Some(path) = env_override.filter(|p| !p.as_os_str().is_empty()) {
            candidates.push(path);
        }
        candidates.push(self.config.clone());
        candidates
    }
}

/// Flat key-value configuration for SMTP delivery into the Things inbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TliConfig {
    #[serde(default)]
    pub smtp_host: String,
    /// Kept as text for compatibility with hand-written files.
    #[serde(default)]
    pub smtp_port: String,
    /// Sender display name.
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub email_addr: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Things "mail to inbox" address.
    #[serde(default)]
    pub things_addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_segment_size: Option<usize>,
}

impl TliConfig {
    /// Loads the first readable candidate path.
    ///
    /// An unreadable `$TLI_CONF` falls back to the home default, but a file
    /// that exists and fails to parse is an error.
    pub fn load(paths: &AppPaths, env_override: Option<PathBuf>) -> ConfigResult<Self> {
        let candidates = paths.config_candidates(env_override);
        for path in &candidates {
            let data = match std::fs::read_to_string(path) {
                Ok(data) => data,
                Err(err) => {
                    warn!(
                        "event=config_load module=config status=skip path={} error={err}",
                        path.display()
                    );
                    continue;
                }
            };
            let config = Self::from_yaml(&data).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
            config.validate()?;
            info!(
                "event=config_load module=config status=ok path={}",
                path.display()
            );
            return Ok(config);
        }
        Err(ConfigError::NotFound(candidates))
    }

    /// Loads using `$TLI_CONF` from the process environment.
    pub fn load_from_env(paths: &AppPaths) -> ConfigResult<Self> {
        Self::load(paths, std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
    }

    pub fn from_yaml(data: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(data)
    }

    /// Checks the fields delivery cannot work without.
    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            ("smtp_host", &self.smtp_host),
            ("smtp_port", &self.smtp_port),
            ("email_addr", &self.email_addr),
            ("things_addr", &self.things_addr),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("`{name}` is empty")));
        }
        self.port()?;
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Invalid("`max_attempts` must be positive".into()));
        }
        if self.max_segment_size == Some(0) {
            return Err(ConfigError::Invalid(
                "`max_segment_size` must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Writes the config to `path` with owner-only permissions.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let yaml = serde_yaml::to_string(self).map_err(ConfigError::Encode)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(io_err)?;
        file.write_all(format!("---\n{yaml}").as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(io_err)?;

        info!(
            "event=config_save module=config status=ok path={}",
            path.display()
        );
        Ok(())
    }

    pub fn port(&self) -> ConfigResult<u16> {
        self.smtp_port.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!("`smtp_port` is not a port: `{}`", self.smtp_port))
        })
    }

    pub fn smtp_settings(&self) -> ConfigResult<SmtpSettings> {
        Ok(SmtpSettings {
            host: self.smtp_host.trim().to_string(),
            port: self.port()?,
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }

    pub fn mail_identity(&self) -> MailIdentity {
        MailIdentity {
            from_display: self.avatar.clone(),
            from_address: self.email_addr.trim().to_string(),
            to_address: self.things_addr.trim().to_string(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self
                .max_attempts
                .and_then(NonZeroU32::new)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            delay: Duration::from_millis(self.retry_delay_ms.unwrap_or(0)),
        }
    }

    pub fn max_segment_size(&self) -> NonZeroUsize {
        self.max_segment_size
            .and_then(NonZeroUsize::new)
            .unwrap_or(DEFAULT_MAX_SEGMENT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::{AppPaths, ConfigError, TliConfig};
    use std::path::PathBuf;
    use std::time::Duration;

    fn sample() -> TliConfig {
        TliConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: "587".to_string(),
            avatar: "Ada".to_string(),
            email_addr: "ada@example.com".to_string(),
            username: "ada".to_string(),
            password: "secret".to_string(),
            things_addr: "add-to-things-abc@things.email".to_string(),
            ..TliConfig::default()
        }
    }

    #[test]
    fn paths_are_rooted_at_home() {
        let paths = AppPaths::with_home("/home/ada");
        assert_eq!(paths.config, PathBuf::from("/home/ada/.tli_config"));
        assert_eq!(paths.history, PathBuf::from("/home/ada/.tli_history"));
        assert_eq!(paths.log_dir, PathBuf::from("/home/ada/.tli/logs"));
    }

    #[test]
    fn env_override_is_tried_first_and_blank_override_is_ignored() {
        let paths = AppPaths::with_home("/home/ada");
        let candidates = paths.config_candidates(Some(PathBuf::from("/etc/tli.yaml")));
        assert_eq!(
            candidates,
            vec![PathBuf::from("/etc/tli.yaml"), paths.config.clone()]
        );
        assert_eq!(
            paths.config_candidates(Some(PathBuf::new())),
            vec![paths.config.clone()]
        );
    }

    #[test]
    fn parses_flat_yaml_with_string_port() {
        let config = TliConfig::from_yaml(
            "---\nsmtp_host: smtp.example.com\nsmtp_port: \"587\"\navatar: Ada\n\
             email_addr: ada@example.com\nusername: ada\npassword: secret\n\
             things_addr: add-to-things-abc@things.email\n",
        )
        .unwrap();
        assert_eq!(config, sample());
        assert_eq!(config.port().unwrap(), 587);
    }

    #[test]
    fn validate_rejects_missing_recipient_and_bad_port() {
        let mut config = sample();
        config.things_addr.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("things_addr")
        ));

        let mut config = sample();
        config.smtp_port = "smtp".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn optional_tuning_falls_back_to_defaults() {
        let config = sample();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts.get(), 5);
        assert_eq!(policy.delay, Duration::ZERO);
        assert_eq!(config.max_segment_size().get(), 2000);

        let tuned = TliConfig {
            max_attempts: Some(3),
            retry_delay_ms: Some(250),
            max_segment_size: Some(500),
            ..sample()
        };
        assert_eq!(tuned.retry_policy().max_attempts.get(), 3);
        assert_eq!(tuned.retry_policy().delay, Duration::from_millis(250));
        assert_eq!(tuned.max_segment_size().get(), 500);
    }

    #[test]
    fn unset_tuning_fields_are_not_written() {
        let yaml = serde_yaml::to_string(&sample()).unwrap();
        assert!(!yaml.contains("max_attempts"));
        assert!(yaml.contains("smtp_port: '587'") || yaml.contains("smtp_port: \"587\""));
    }
}
