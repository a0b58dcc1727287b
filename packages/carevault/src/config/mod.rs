mod log;
mod vault;

pub use log::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use vault::{AccessConfig, AuditConfig, VaultConfig};

pub const CV_PREFIX: &str = "CV";
pub const DEFAULT_CONFIG_FILE_PATH: &str = "carevault.toml";
