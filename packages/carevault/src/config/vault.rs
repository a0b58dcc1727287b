use super::{LogConfig, CV_PREFIX, DEFAULT_CONFIG_FILE_PATH};
use crate::error::{ConfigError, Error};
use chrono::Duration;
use config::{Config, Environment};
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;

/// Config defaults to a file called `carevault.toml` in the current
/// directory. Supports TOML, JSON, YAML.
///
/// ENV vars can be used to override file settings.
///
/// ENV vars must be prefixed with `CV_`.
///
#[derive(Clone, Debug, Default, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuditConfig {
    /// Cap on the number of entries returned by trail queries.
    #[serde(default = "AuditConfig::default_page_size")]
    pub page_size: usize,

    /// Write an `access_denied` entry for authorization denials.
    #[serde(default = "AuditConfig::default_record_denials")]
    pub record_denials: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AccessConfig {
    /// Hours an approved access request stays valid. Unset means approval
    /// is permanent.
    #[serde(default)]
    pub approval_ttl_hours: Option<u32>,
}

impl VaultConfig {
    pub fn default_path() -> String {
        DEFAULT_CONFIG_FILE_PATH.to_string()
    }

    pub fn load(path: &str) -> Result<VaultConfig, Error> {
        // Log a warning to user that config file is missing
        if !PathBuf::from(path).exists() {
            println!("Configuration file was not found: {}", path);
            println!("Loading config values from environment variables.");
        }
        VaultConfig::build(path)
    }

    pub fn build(path: &str) -> Result<Self, Error> {
        // For parsing top-level values such as CV_AUDIT__PAGE_SIZE
        // and nested env values such as CV_LOG__LEVEL, CV_LOG__FORMAT
        let cv_env_source = Environment::with_prefix(CV_PREFIX)
            .try_parsing(true)
            .separator("__")
            .prefix_separator("_");

        let config: Self = Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(cv_env_source)
            .build()?
            .try_deserialize()
            .map_err(|err| match err {
                config::ConfigError::Message(ref s) => match s {
                    s if s.contains("missing field") => {
                        let name = extract_field_name(s).map_or("unknown".to_string(), |s| s);
                        ConfigError::MissingParameter { name }
                    }
                    s if s.contains("does not have variant constructor") => {
                        let (name, value) = extract_invalid_field(s);
                        ConfigError::InvalidParameter { name, value }
                    }
                    _ => err.into(),
                },
                _ => err.into(),
            })?;

        Ok(config)
    }

    pub fn audit_page_size(&self) -> usize {
        self.audit.page_size
    }

    pub fn record_denials(&self) -> bool {
        self.audit.record_denials
    }

    /// Approval time box, if configured.
    pub fn approval_ttl(&self) -> Option<Duration> {
        self.access
            .approval_ttl_hours
            .map(|hours| Duration::hours(hours as i64))
    }

    pub fn use_structured_logging(&self) -> bool {
        matches!(self.log.format, super::LogFormat::Structured)
    }
}

impl AuditConfig {
    pub const fn default_page_size() -> usize {
        500
    }

    pub const fn default_record_denials() -> bool {
        true
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        AuditConfig {
            page_size: AuditConfig::default_page_size(),
            record_denials: AuditConfig::default_record_denials(),
        }
    }
}

///
/// Extracts a field name (if present) from a config::ConfigError::Message
/// This is called in `build` if a ConfigError message contains the string `missing field`
///
fn extract_field_name(input: &str) -> Option<String> {
    let re = Regex::new(r"`(\w+)`").unwrap();
    re.captures(input)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().to_string()))
}

///
/// Extracts a field name (if present) from a config::ConfigError::Message
/// This is called in `build` if a ConfigError message contains the string `does not have variant constructor`
///
/// Error string is `enum {name} does not have variant constructor {value}`
///
fn extract_invalid_field(input: &str) -> (String, String) {
    let words = input.split(" ").collect::<Vec<_>>();

    let default_name = "unknown".to_string();
    let default_val = "".to_string();

    if !input.starts_with("enum") {
        return (default_name, default_val);
    }

    let name = words
        .get(1)
        .map_or(default_name.to_owned(), |w| w.to_string());

    let value = words
        .last()
        .map_or(default_val.to_owned(), |w| w.to_string());

    (name, value)
}

#[cfg(test)]
mod tests {
    use crate::config::VaultConfig;
    use crate::test_helpers::with_no_cv_vars;

    #[test]
    fn defaults_from_fixture() {
        with_no_cv_vars(|| {
            let config = VaultConfig::build("tests/config/carevault-test.toml").unwrap();
            assert_eq!(config.audit_page_size(), 500);
            assert!(config.record_denials());
            assert!(config.approval_ttl().is_none());
        });
    }

    #[test]
    fn env_overrides_file() {
        with_no_cv_vars(|| {
            temp_env::with_vars([("CV_AUDIT__PAGE_SIZE", Some("50"))], || {
                let config = VaultConfig::build("tests/config/carevault-test.toml").unwrap();
                assert_eq!(config.audit_page_size(), 50);
            });

            temp_env::with_vars([("CV_AUDIT__RECORD_DENIALS", Some("false"))], || {
                let config = VaultConfig::build("tests/config/carevault-test.toml").unwrap();
                assert!(!config.record_denials());
            });

            temp_env::with_vars([("CV_ACCESS__APPROVAL_TTL_HOURS", Some("72"))], || {
                let config = VaultConfig::build("tests/config/carevault-test.toml").unwrap();
                assert_eq!(config.approval_ttl(), Some(chrono::Duration::hours(72)));
            });
        });
    }

    #[test]
    fn approval_ttl_from_file() {
        with_no_cv_vars(|| {
            let config = VaultConfig::build("tests/config/carevault-ttl.toml").unwrap();
            assert_eq!(config.approval_ttl(), Some(chrono::Duration::hours(24)));
            assert_eq!(config.audit_page_size(), 100);
        });
    }
}
