use crate::constants::{
    CHECK_PREDECESSOR_INTERVAL_MS, DEFAULT_PORT, DEFAULT_REPLICAS, DEFAULT_SUCCESSORS,
    DEFAULT_TRANSFER_PORT, FIX_FINGERS_INTERVAL_MS, LOCALHOST, MAX_INTERVAL_MS, MAX_SUCCESSORS,
    MIN_INTERVAL_MS, RPC_TIMEOUT_MS, STABILIZE_INTERVAL_MS,
};
use crate::error::{ChordError, Result};
use chordfs_proto::hash;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Startup configuration of a node. Loadable from a JSON file; command line
/// flags are applied on top by the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RPC address, both bound and advertised to peers.
    pub address: String,
    /// Bulk-transfer address, bound and advertised.
    pub transfer_address: String,
    /// Introducer to join through; a new ring is created when absent.
    pub join: Option<String>,
    pub stabilize_interval_ms: u64,
    pub fix_fingers_interval_ms: u64,
    pub check_predecessor_interval_ms: u64,
    /// Successor-list length (R).
    pub successors: usize,
    /// Independent storage placements per key (R').
    pub replicas: usize,
    pub storage_dir: Option<PathBuf>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub rpc_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: format!("{}:{}", LOCALHOST, DEFAULT_PORT),
            transfer_address: format!("{}:{}", LOCALHOST, DEFAULT_TRANSFER_PORT),
            join: None,
            stabilize_interval_ms: STABILIZE_INTERVAL_MS,
            fix_fingers_interval_ms: FIX_FINGERS_INTERVAL_MS,
            check_predecessor_interval_ms: CHECK_PREDECESSOR_INTERVAL_MS,
            successors: DEFAULT_SUCCESSORS,
            replicas: DEFAULT_REPLICAS,
            storage_dir: None,
            tls_cert: None,
            tls_key: None,
            rpc_timeout_ms: RPC_TIMEOUT_MS,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ChordError::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn validate(&self) -> Result<()> {
        check_host_port("address", &self.address)?;
        check_host_port("transfer_address", &self.transfer_address)?;
        if let Some(join) = &self.join {
            check_host_port("join", join)?;
        }
        for (name, ms) in [
            ("stabilize_interval_ms", self.stabilize_interval_ms),
            ("fix_fingers_interval_ms", self.fix_fingers_interval_ms),
            ("check_predecessor_interval_ms", self.check_predecessor_interval_ms),
        ] {
            if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&ms) {
                return Err(ChordError::Config(format!(
                    "{} must be between {} and {}, got {}",
                    name, MIN_INTERVAL_MS, MAX_INTERVAL_MS, ms
                )));
            }
        }
        if !(1..=MAX_SUCCESSORS).contains(&self.successors) {
            return Err(ChordError::Config(format!(
                "successors must be between 1 and {}, got {}",
                MAX_SUCCESSORS, self.successors
            )));
        }
        if self.replicas == 0 {
            return Err(ChordError::Config("replicas must be at least 1".into()));
        }
        if self.tls_cert.is_some() != self.tls_key.is_some() {
            return Err(ChordError::Config(
                "tls_cert and tls_key must be given together".into(),
            ));
        }
        if self.rpc_timeout_ms == 0 {
            return Err(ChordError::Config("rpc_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Defaults to `storage-<node id>` in the working directory.
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("storage-{}", hash(&self.address))))
    }

    pub fn stabilize_interval(&self) -> Duration {
        Duration::from_millis(self.stabilize_interval_ms)
    }

    pub fn fix_fingers_interval(&self) -> Duration {
        Duration::from_millis(self.fix_fingers_interval_ms)
    }

    pub fn check_predecessor_interval(&self) -> Duration {
        Duration::from_millis(self.check_predecessor_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

/// Accepts any dialable `host:port`, including names such as `localhost:4000`
/// and bracketed IPv6 literals.
fn check_host_port(name: &str, addr: &str) -> Result<()> {
    let invalid = |why: &str| ChordError::Config(format!("{} {:?}: {}", name, addr, why));
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(invalid("missing host"));
    }
    port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = Config {
            stabilize_interval_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.stabilize_interval_ms = 60_001;
        assert!(config.validate().is_err());

        config = Config {
            successors: 33,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config = Config {
            tls_cert: Some("cert.pem".into()),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config = Config {
            address: "not-an-address".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_accepts_host_names() {
        let config = Config {
            address: "localhost:4000".into(),
            transfer_address: "[::1]:5000".into(),
            join: Some("node-a.internal:4000".into()),
            ..Config::default()
        };
        config.validate().unwrap();

        for bad in ["localhost", ":4000", "localhost:http", "localhost:70000"] {
            let config = Config {
                address: bad.into(),
                ..Config::default()
            };
            assert!(config.validate().is_err(), "{} accepted", bad);
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"address": "10.0.0.5:4100", "successors": 5}"#).unwrap();
        assert_eq!(config.address, "10.0.0.5:4100");
        assert_eq!(config.successors, 5);
        assert_eq!(config.replicas, DEFAULT_REPLICAS);
        assert_eq!(
            config.storage_dir(),
            PathBuf::from(format!("storage-{}", hash("10.0.0.5:4100")))
        );
    }
}
