//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Sealing configuration
    pub sealing: SealingConfig,

    /// Submission validation
    pub validation: ValidationConfig,

    /// Certificate issuance
    pub certificate: CertificateConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/attest"),
            service_name: "attest-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            rocksdb: RocksDBConfig::default(),
            sealing: SealingConfig::default(),
            validation: ValidationConfig::default(),
            certificate: CertificateConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 16,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// When pending records get sealed into a block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SealingConfig {
    /// Seal periodically while records are pending
    pub auto_seal: bool,

    /// Period of the sealing timer (milliseconds)
    pub seal_interval_ms: u64,

    /// Seal as soon as this many records are pending (0 disables)
    pub max_pending_records: usize,

    /// Seal right after every accepted submission
    pub seal_on_submit: bool,

    /// Seal leftover records during shutdown
    pub seal_on_shutdown: bool,

    /// Writer mailbox capacity
    pub mailbox_capacity: usize,
}

impl Default for SealingConfig {
    fn default() -> Self {
        Self {
            auto_seal: true,
            seal_interval_ms: 1_000,
            max_pending_records: 100,
            seal_on_submit: false,
            seal_on_shutdown: true,
            mailbox_capacity: 1_000,
        }
    }
}

/// Submission validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Also reject content hashes that are not 64 lowercase hex characters
    pub require_hex_content_hash: bool,
}

/// Certificate issuance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateConfig {
    /// Base URL verification links are built on
    pub base_url: String,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            base_url: "https://educhain.cc".to_string(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("ATTEST_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(interval) = std::env::var("ATTEST_SEAL_INTERVAL_MS") {
            config.sealing.seal_interval_ms = interval.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid ATTEST_SEAL_INTERVAL_MS: {}", e))
            })?;
        }

        if let Ok(flag) = std::env::var("ATTEST_SEAL_ON_SUBMIT") {
            config.sealing.seal_on_submit = flag.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid ATTEST_SEAL_ON_SUBMIT: {}", e))
            })?;
        }

        if let Ok(url) = std::env::var("ATTEST_CERTIFICATE_BASE_URL") {
            config.certificate.base_url = url;
        }

        config.check()?;
        Ok(config)
    }

    /// Reject settings the ledger cannot run with
    pub fn check(&self) -> crate::Result<()> {
        if self.sealing.auto_seal && self.sealing.seal_interval_ms == 0 {
            return Err(crate::Error::Config(
                "sealing.seal_interval_ms must be positive when auto_seal is enabled".to_string(),
            ));
        }
        if self.sealing.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "sealing.mailbox_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "attest-ledger");
        assert!(config.sealing.auto_seal);
        assert!(!config.sealing.seal_on_submit);
        assert!(!config.validation.require_hex_content_hash);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            data_dir = "/var/lib/attest"

            [sealing]
            seal_on_submit = true
            seal_interval_ms = 250

            [certificate]
            base_url = "https://example.org"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/attest"));
        assert!(config.sealing.seal_on_submit);
        assert_eq!(config.sealing.seal_interval_ms, 250);
        assert_eq!(config.sealing.max_pending_records, 100);
        assert_eq!(config.certificate.base_url, "https://example.org");
        assert_eq!(config.rocksdb.max_background_jobs, 2);
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_toml("sealing = 5");
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_check_rejects_zero_interval() {
        let mut config = Config::default();
        config.sealing.seal_interval_ms = 0;
        assert!(config.check().is_err());

        config.sealing.auto_seal = false;
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attest.toml");
        std::fs::write(&path, "[validation]\nrequire_hex_content_hash = true\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.validation.require_hex_content_hash);
    }
}
