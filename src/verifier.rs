//! Boundary to the external TEE verifier.
//!
//! The engine only needs "send aggregate proof + challenge, get a verdict".
//! [`VerifierClient`] abstracts the RPC transport; [`LocalVerifier`] runs the
//! same batch check in-process with the issuer's public key.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::AggregateProof;
use crate::challenge::ChallengeSet;
use crate::error::{PdpError, Result};
use crate::scheme::ProofScheme;

/// Payload of one batch verification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchVerifyRequest {
    pub proof: AggregateProof,
    pub challenge: ChallengeSet,
    #[serde(with = "hex")]
    pub prover_identity: Vec<u8>,
}

/// Transport to the verifier.
///
/// Implementations return [`PdpError::Transport`] when the verifier cannot be
/// reached and must not retry internally.
#[async_trait]
pub trait VerifierClient: Send + Sync {
    async fn batch_verify(&self, request: &BatchVerifyRequest) -> Result<bool>;
}

/// In-process verifier holding public key material.
pub struct LocalVerifier {
    scheme: Arc<dyn ProofScheme>,
}

impl LocalVerifier {
    pub fn new(scheme: Arc<dyn ProofScheme>) -> Self {
        Self { scheme }
    }
}

#[async_trait]
impl VerifierClient for LocalVerifier {
    async fn batch_verify(&self, request: &BatchVerifyRequest) -> Result<bool> {
        self.scheme
            .verify_aggregate(&request.challenge, &request.proof)
    }
}

/// Timeouts and retries around one verifier submission.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    /// Budget of the first call.
    pub call_timeout: Duration,
    /// Added to the budget after each timed-out call.
    pub timeout_step: Duration,
    pub max_attempts: u32,
    /// Pause after a timed-out call.
    pub retry_backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(600),
            timeout_step: Duration::from_secs(600),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(60),
        }
    }
}

/// Submit a request, retrying only calls that time out.
pub async fn submit(
    client: &dyn VerifierClient,
    request: &BatchVerifyRequest,
    policy: &CallPolicy,
) -> Result<bool> {
    let mut budget = policy.call_timeout;
    for attempt in 1..=policy.max_attempts {
        match tokio::time::timeout(budget, client.batch_verify(request)).await {
            Ok(verdict) => return verdict,
            Err(_) => {
                warn!(
                    "verifier call {}/{} timed out after {:?}",
                    attempt, policy.max_attempts, budget
                );
                budget += policy.timeout_step;
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.retry_backoff).await;
                }
            }
        }
    }
    Err(PdpError::Transport(format!(
        "verifier did not answer after {} attempts",
        policy.max_attempts
    )))
}

/// Channel security used to reach the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSecurity {
    Insecure,
    Tls { certificate: PathBuf },
}

/// Pick channel security from the endpoint: `https://` or port 443 needs a
/// certificate, anything else goes over an insecure channel.
pub fn transport_security(endpoint: &str, certificate: Option<&Path>) -> Result<TransportSecurity> {
    let secured = endpoint.starts_with("https://") || endpoint.trim_end_matches('/').ends_with(":443");
    if !secured {
        return Ok(TransportSecurity::Insecure);
    }
    match certificate {
        Some(path) => {
            info!("verifier {} uses TLS with {}", endpoint, path.display());
            Ok(TransportSecurity::Tls {
                certificate: path.to_path_buf(),
            })
        }
        None => Err(PdpError::Config(format!(
            "verifier endpoint {} is secured but no certificate is configured",
            endpoint
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::PairingKeys;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Stalled {
        calls: AtomicU32,
    }

    #[async_trait]
    impl VerifierClient for Stalled {
        async fn batch_verify(&self, _request: &BatchVerifyRequest) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(true)
        }
    }

    struct Unreachable;

    #[async_trait]
    impl VerifierClient for Unreachable {
        async fn batch_verify(&self, _request: &BatchVerifyRequest) -> Result<bool> {
            Err(PdpError::Transport("connection refused".into()))
        }
    }

    fn request() -> BatchVerifyRequest {
        let keys = PairingKeys::generate();
        BatchVerifyRequest {
            proof: AggregateProof::new(&keys),
            challenge: ChallengeSet::default(),
            prover_identity: vec![1, 2, 3],
        }
    }

    fn fast_policy() -> CallPolicy {
        CallPolicy {
            call_timeout: Duration::from_millis(20),
            timeout_step: Duration::from_millis(10),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_on_timeout_then_fails() {
        let client = Stalled {
            calls: AtomicU32::new(0),
        };
        let err = submit(&client, &request(), &fast_policy()).await.unwrap_err();
        assert!(matches!(err, PdpError::Transport(_)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transport_error_not_retried() {
        let err = submit(&Unreachable, &request(), &fast_policy()).await.unwrap_err();
        assert!(matches!(err, PdpError::Transport(_)));
    }

    #[tokio::test]
    async fn test_local_verifier_accepts_empty_round() {
        let keys = PairingKeys::generate();
        let verifier = LocalVerifier::new(Arc::new(keys.clone()));
        let req = BatchVerifyRequest {
            proof: AggregateProof::new(&keys),
            challenge: ChallengeSet::random(10, 3),
            prover_identity: Vec::new(),
        };
        assert!(submit(&verifier, &req, &fast_policy()).await.expect("verdict"));
    }

    #[test]
    fn test_transport_security() {
        assert_eq!(
            transport_security("http://10.0.0.1:8080", None).expect("insecure"),
            TransportSecurity::Insecure
        );
        assert!(transport_security("https://tee.example", None).is_err());
        assert!(transport_security("10.0.0.1:443", None).is_err());
        let cert = Path::new("/etc/pdp/tee.pem");
        assert_eq!(
            transport_security("https://tee.example", Some(cert)).expect("tls"),
            TransportSecurity::Tls {
                certificate: cert.to_path_buf()
            }
        );
    }

    #[test]
    fn test_request_json() {
        let json = serde_json::to_string(&request()).expect("encode");
        assert!(json.contains("\"010203\""));
        let back: BatchVerifyRequest = serde_json::from_str(&json).expect("decode");
        assert_eq!(back.prover_identity, vec![1, 2, 3]);
    }
}
