use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use blake3::Hasher as Blake3;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{SdkError, SdkResult};
use crate::pending::ConfirmOptions;
use crate::storage::keystore::{create_atomic_file, finalize_atomic_file};

const CONFIG_VERSION: u16 = 1;

const ENV_RPC_URL: &str = "CFX_RPC_URL";
const ENV_RPC_TIMEOUT_MS: &str = "CFX_RPC_TIMEOUT_MS";
const ENV_POLL_INTERVAL_MS: &str = "CFX_POLL_INTERVAL_MS";
const ENV_POLL_TIMEOUT_MS: &str = "CFX_POLL_TIMEOUT_MS";
const ENV_RISK_THRESHOLD: &str = "CFX_RISK_THRESHOLD";
const ENV_ENVIRONMENT: &str = "CFX_ENVIRONMENT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub endpoint: String,
    pub request_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:12537".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Defaults for confirmation polling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollingConfig {
    pub delay_ms: u64,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub threshold: f64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            interval_ms: 1_000,
            timeout_ms: 30_000,
            threshold: 0.01,
        }
    }
}

impl PollingConfig {
    pub fn confirm_options(&self) -> ConfirmOptions {
        ConfirmOptions {
            delay: Duration::from_millis(self.delay_ms),
            interval: Duration::from_millis(self.interval_ms),
            timeout: Duration::from_millis(self.timeout_ms),
            threshold: self.threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionDefaults {
    /// Gas limit used when a transaction does not set one.
    pub gas: u64,
}

impl Default for TransactionDefaults {
    fn default() -> Self {
        Self { gas: 21_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub network: NetworkConfig,
    pub polling: PollingConfig,
    pub transaction: TransactionDefaults,
    pub environment: String,
    pub last_updated: DateTime<Utc>,
    pub version: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("development")
    }
}

impl ClientConfig {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            network: NetworkConfig::default(),
            polling: PollingConfig::default(),
            transaction: TransactionDefaults::default(),
            environment: environment.into(),
            last_updated: Utc::now(),
            version: CONFIG_VERSION,
        }
    }

    /// Defaults overridden by `CFX_*` environment variables.
    pub fn from_env() -> SdkResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `CFX_*` key.
    pub fn from_lookup<F>(lookup: F) -> SdkResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| -> Option<String> {
            let value = lookup(key)?;
            if value.trim().is_empty() {
                log::warn!("Environment variable {} is empty", key);
                return None;
            }
            log::debug!("Loaded configuration from environment variable {}", key);
            Some(value.trim().to_string())
        };

        let mut config = Self::new(read(ENV_ENVIRONMENT).unwrap_or_else(|| "development".into()));
        if let Some(endpoint) = read(ENV_RPC_URL) {
            config.network.endpoint = endpoint;
        }
        if let Some(value) = read(ENV_RPC_TIMEOUT_MS) {
            config.network.request_timeout_ms = parse_u64_value(&value, ENV_RPC_TIMEOUT_MS)?;
        }
        if let Some(value) = read(ENV_POLL_INTERVAL_MS) {
            config.polling.interval_ms = parse_u64_value(&value, ENV_POLL_INTERVAL_MS)?;
        }
        if let Some(value) = read(ENV_POLL_TIMEOUT_MS) {
            config.polling.timeout_ms = parse_u64_value(&value, ENV_POLL_TIMEOUT_MS)?;
        }
        if let Some(value) = read(ENV_RISK_THRESHOLD) {
            config.polling.threshold = value.parse::<f64>().map_err(|_| {
                SdkError::format(&value, format!("invalid number for {}", ENV_RISK_THRESHOLD))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SdkResult<()> {
        self.polling.confirm_options().validate()?;
        if self.network.endpoint.is_empty() {
            return Err(SdkError::FormatError(
                "Network endpoint cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

fn parse_u64_value(value: &str, key: &str) -> SdkResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| SdkError::format(value, format!("invalid numeric value for {}", key)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u16,
    checksum: [u8; 32],
    payload: ClientConfig,
    modified_at_unix: i64,
}

/// Handles persistence of client configuration with integrity checks.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load_or_default(&self, environment: impl Into<String>) -> SdkResult<ClientConfig> {
        if !self.path.exists() {
            let config = ClientConfig::new(environment);
            self.save(&config)?;
            return Ok(config);
        }

        let bytes = fs::read(&self.path)?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != CONFIG_VERSION {
            return Err(SdkError::StorageError(format!(
                "Unsupported config version {}",
                envelope.version
            )));
        }

        let checksum = checksum(&envelope.payload)?;
        if checksum != envelope.checksum {
            return Err(SdkError::StorageError(
                "Config integrity verification failed".to_string(),
            ));
        }

        Ok(envelope.payload)
    }

    pub fn save(&self, config: &ClientConfig) -> SdkResult<()> {
        let mut payload = config.clone();
        payload.touch();

        let envelope = ConfigEnvelope {
            version: CONFIG_VERSION,
            checksum: checksum(&payload)?,
            modified_at_unix: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map_err(|e| SdkError::StorageError(e.to_string()))?
                .as_secs() as i64,
            payload,
        };

        let serialized = serde_json::to_vec_pretty(&envelope)?;
        let mut file = create_atomic_file(&self.path)?;
        file.write_all(&serialized)?;
        file.sync_all()?;
        finalize_atomic_file(file, &self.path)?;
        Ok(())
    }

    pub fn update<F>(&self, environment: impl Into<String>, updater: F) -> SdkResult<ClientConfig>
    where
        F: FnOnce(&mut ClientConfig) -> SdkResult<()>,
    {
        let mut config = self.load_or_default(environment)?;
        updater(&mut config)?;
        config.validate()?;
        config.touch();
        self.save(&config)?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn checksum(config: &ClientConfig) -> SdkResult<[u8; 32]> {
    let mut hasher = Blake3::new();
    let encoded = serde_json::to_vec(config)?;
    hasher.update(&encoded);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_bytes());
    Ok(output)
}
