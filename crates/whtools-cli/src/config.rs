//! Client configuration file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use whtools_core::error::ConnectError;
use whtools_core::inbound::ProcessorSettings;
use whtools_core::{Credentials, DepositEncoding, ServiceUrl};
use whtools_file::DepositSettings;
use whtools_net::TlsSettings;

/// Config file used when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "config/whconfig.json";

/// Response directory used when the config leaves it empty.
pub const DEFAULT_RESPONSE_DIR: &str = "responses";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("configuration errors: {}", .problems.join(", "))]
    Deposit { problems: Vec<String> },
}

/// Settings loaded from the JSON config file.
///
/// Keys keep the names used by existing `whconfig.json` files.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseConfig {
    /// WebSocket address of the warehouse session.
    #[serde(rename = "warehouseURL")]
    pub warehouse_url: ServiceUrl,

    /// HTTP address CAS issues the service ticket for. Derived from
    /// `warehouseURL` when absent.
    #[serde(rename = "httpWarehouseURL", default)]
    pub http_warehouse_url: Option<ServiceUrl>,

    /// PEM trust bundle for the CAS server and the warehouse.
    #[serde(default)]
    pub keystore_file: Option<PathBuf>,

    /// Accepted for compatibility; PEM bundles are not encrypted.
    #[serde(default)]
    pub keystore_password: Option<String>,

    #[serde(rename = "casURL")]
    pub cas_url: ServiceUrl,
    pub cas_user_name: String,
    pub cas_password: String,

    pub request_dir: PathBuf,

    #[serde(default)]
    pub log_messages: bool,
    #[serde(default)]
    pub write_to_disk: bool,
    #[serde(default)]
    pub binary_files: bool,
    #[serde(default)]
    pub response_dir: Option<PathBuf>,

    #[serde(default)]
    pub system_deposit_name: Option<String>,
    #[serde(default)]
    pub encode_type: Option<String>,
    #[serde(default)]
    pub deposit_file_dir: Option<PathBuf>,
    /// Milliseconds to wait after each deposit message.
    #[serde(default)]
    pub deposit_delay: u64,
}

impl WarehouseConfig {
    /// Read and check a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_str(text)?;
        if config
            .response_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            config.response_dir = None;
        }
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.warehouse_url.is_websocket() {
            return Err(ConfigError::Invalid {
                key: "warehouseURL",
                message: format!("expected a ws:// or wss:// URL, got {}", self.warehouse_url),
            });
        }
        if self.cas_url.is_websocket() {
            return Err(ConfigError::Invalid {
                key: "casURL",
                message: format!("expected an http:// or https:// URL, got {}", self.cas_url),
            });
        }
        Ok(())
    }

    /// The service URL the CAS ticket is issued for.
    pub fn http_warehouse_url(&self) -> Result<ServiceUrl, ConfigError> {
        match &self.http_warehouse_url {
            Some(url) => Ok(url.clone()),
            None => self.warehouse_url.to_http().map_err(|e| ConfigError::Invalid {
                key: "warehouseURL",
                message: e.to_string(),
            }),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.cas_user_name, &self.cas_password)
    }

    pub fn response_dir(&self) -> &Path {
        self.response_dir
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_RESPONSE_DIR))
    }

    pub fn processor_settings(&self) -> ProcessorSettings {
        ProcessorSettings {
            write_to_disk: self.write_to_disk,
            binary_files: self.binary_files,
            log_messages: self.log_messages,
        }
    }

    /// Trust settings from `keystoreFile`, or the bundled roots.
    pub fn tls_settings(&self) -> Result<TlsSettings, ConnectError> {
        match &self.keystore_file {
            Some(path) => TlsSettings::from_trust_bundle(path),
            None => Ok(TlsSettings::system_default()),
        }
    }

    /// The deposit directory and settings.
    ///
    /// Every missing or invalid deposit key is reported in one error.
    pub fn deposit_settings(&self) -> Result<(PathBuf, DepositSettings), ConfigError> {
        let mut problems = Vec::new();

        if self.system_deposit_name.is_none() {
            problems.push("systemDepositName is required".to_string());
        }
        let encoding = match self.encode_type.as_deref() {
            None => {
                problems.push("encodeType is required".to_string());
                None
            }
            Some(value) => match value.parse::<DepositEncoding>() {
                Ok(encoding) => Some(encoding),
                Err(e) => {
                    problems.push(e.to_string());
                    None
                }
            },
        };
        if self.deposit_file_dir.is_none() {
            problems.push("depositFileDir is required".to_string());
        }

        match (&self.system_deposit_name, encoding, &self.deposit_file_dir) {
            (Some(name), Some(encoding), Some(dir)) if problems.is_empty() => Ok((
                dir.clone(),
                DepositSettings {
                    system_deposit_name: name.clone(),
                    encoding,
                    delay: Duration::from_millis(self.deposit_delay),
                },
            )),
            _ => Err(ConfigError::Deposit { problems }),
        }
    }
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("warehouse_url", &self.warehouse_url.as_str())
            .field(
                "http_warehouse_url",
                &self.http_warehouse_url.as_ref().map(ServiceUrl::as_str),
            )
            .field("keystore_file", &self.keystore_file)
            .field(
                "keystore_password",
                &self.keystore_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("cas_url", &self.cas_url.as_str())
            .field("cas_user_name", &self.cas_user_name)
            .field("cas_password", &"[REDACTED]")
            .field("request_dir", &self.request_dir)
            .field("log_messages", &self.log_messages)
            .field("write_to_disk", &self.write_to_disk)
            .field("binary_files", &self.binary_files)
            .field("response_dir", &self.response_dir())
            .field("system_deposit_name", &self.system_deposit_name)
            .field("encode_type", &self.encode_type)
            .field("deposit_file_dir", &self.deposit_file_dir)
            .field("deposit_delay", &self.deposit_delay)
            .finish()
    }
}
