//! Node configuration loaded from TOML.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PdpError, Result};
use crate::keys::Domain;
use crate::round::RoundConfig;
use crate::verifier::{CallPolicy, TransportSecurity, transport_security};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NodeConfig {
    /// Root of fragment, tag and record storage.
    pub workspace: PathBuf,

    /// Proof scheme the node's key material belongs to.
    pub scheme: Domain,

    /// Budget for proving one file, in seconds.
    pub per_file_timeout_secs: u64,

    pub verifier: VerifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VerifierConfig {
    /// Address of the TEE verifier, e.g. "https://tee.example:443".
    pub endpoint: String,

    /// Certificate presented on secured endpoints.
    pub tls_cert: Option<PathBuf>,

    pub call_timeout_secs: u64,
    pub timeout_step_secs: u64,
    pub max_attempts: u32,
    pub retry_backoff_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            workspace: PathBuf::from("./workspace"),
            scheme: Domain::Pairing,
            per_file_timeout_secs: 60,
            verifier: VerifierConfig::default(),
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        VerifierConfig {
            endpoint: "127.0.0.1:8081".to_string(),
            tls_cert: None,
            call_timeout_secs: 600,
            timeout_step_secs: 600,
            max_attempts: 3,
            retry_backoff_secs: 60,
        }
    }
}

impl NodeConfig {
    /// Load config from a TOML file path. Missing keys take their defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<NodeConfig> {
        let s = fs::read_to_string(path.as_ref())?;
        let cfg: NodeConfig = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.per_file_timeout_secs == 0 {
            return Err(PdpError::Config("per_file_timeout_secs must be > 0".into()));
        }
        if self.verifier.call_timeout_secs == 0 {
            return Err(PdpError::Config("verifier.call_timeout_secs must be > 0".into()));
        }
        if self.verifier.max_attempts == 0 {
            return Err(PdpError::Config("verifier.max_attempts must be > 0".into()));
        }
        self.transport_security()?;
        Ok(())
    }

    pub fn transport_security(&self) -> Result<TransportSecurity> {
        transport_security(&self.verifier.endpoint, self.verifier.tls_cert.as_deref())
    }

    pub fn fragment_dir(&self) -> PathBuf {
        self.workspace.join("fragments")
    }

    pub fn tag_dir(&self) -> PathBuf {
        self.workspace.join("tags")
    }

    pub fn record_path(&self) -> PathBuf {
        self.workspace.join("service_proof.json")
    }

    pub fn round_config(&self) -> RoundConfig {
        RoundConfig {
            per_file_timeout: Duration::from_secs(self.per_file_timeout_secs),
            verifier: CallPolicy {
                call_timeout: Duration::from_secs(self.verifier.call_timeout_secs),
                timeout_step: Duration::from_secs(self.verifier.timeout_step_secs),
                max_attempts: self.verifier.max_attempts,
                retry_backoff: Duration::from_secs(self.verifier.retry_backoff_secs),
            },
        }
    }
}
