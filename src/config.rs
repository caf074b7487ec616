//! TOML configuration of the ABI profile and logging.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::abi::{AbiProfile, Packing, UlongWidth};
use crate::error::{MarshalError, MarshalResult};

/// Configuration loaded from a TOML file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub abi: AbiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Overrides for the host ABI profile.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbiConfig {
    /// `CK_ULONG` width in bytes (4 or 8).
    pub ulong_width: Option<usize>,
    pub packing: Option<Packing>,
}

/// Logging settings for the CLI.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive (e.g. "info" or "ck_marshal=trace").
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read(path.to_path_buf(), source))?;
        Self::from_str(&text)
    }

    pub fn from_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Toml(Box::new(e)))
    }

    /// The configured profile; unset fields fall back to the host.
    pub fn profile(&self) -> MarshalResult<AbiProfile> {
        self.abi.profile()
    }
}

impl AbiConfig {
    pub fn profile(&self) -> MarshalResult<AbiProfile> {
        let host = AbiProfile::host();
        let ulong = match self.ulong_width {
            None => host.ulong,
            Some(bytes) => UlongWidth::from_bytes(bytes).ok_or_else(|| {
                MarshalError::unsupported_abi(host, format!("{bytes}-byte CK_ULONG"))
            })?,
        };
        Ok(AbiProfile::new(ulong, self.packing.unwrap_or(host.packing)))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read(PathBuf, std::io::Error),
    Toml(Box<toml::de::Error>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(path, e) => write!(f, "Cannot read {}: {}", path.display(), e),
            ConfigError::Toml(e) => write!(f, "Invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read(_, e) => Some(e),
            ConfigError::Toml(e) => Some(e.as_ref()),
        }
    }
}
