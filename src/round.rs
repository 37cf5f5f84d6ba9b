//! Challenge rounds: prove every eligible fragment against one challenge,
//! fold the proofs together and hand the aggregate to the verifier.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::aggregate::AggregateProof;
use crate::challenge::ChallengeSet;
use crate::error::{PdpError, Result};
use crate::partition::{Policy, partition};
use crate::prover::{FileProof, StatusCode, spawn_worker};
use crate::scheme::ProofScheme;
use crate::store::{FragmentStore, RecordSink};
use crate::tag::Tag;
use crate::verifier::{self, BatchVerifyRequest, CallPolicy, VerifierClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundKind {
    Idle,
    Service,
}

impl fmt::Display for RoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundKind::Idle => write!(f, "idle"),
            RoundKind::Service => write!(f, "service"),
        }
    }
}

#[derive(Debug, Default)]
struct Flags {
    idle: bool,
    service: bool,
    last_challenge: u32,
}

impl Flags {
    fn slot(&mut self, kind: RoundKind) -> &mut bool {
        match kind {
            RoundKind::Idle => &mut self.idle,
            RoundKind::Service => &mut self.service,
        }
    }
}

/// Which round kinds are running. Shared by everything that may start a round.
#[derive(Debug, Default)]
pub struct ChallengeRoundState {
    flags: Mutex<Flags>,
}

impl ChallengeRoundState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark a round of `kind` active. `None` if one is already running.
    pub fn try_begin(self: &Arc<Self>, kind: RoundKind) -> Option<RoundGuard> {
        let mut flags = self.flags.lock();
        let slot = flags.slot(kind);
        if *slot {
            return None;
        }
        *slot = true;
        Some(RoundGuard {
            state: Arc::clone(self),
            kind,
        })
    }

    pub fn is_active(&self, kind: RoundKind) -> bool {
        *self.flags.lock().slot(kind)
    }

    /// Chain height of the most recently started round.
    pub fn last_challenge(&self) -> u32 {
        self.flags.lock().last_challenge
    }

    pub fn set_last_challenge(&self, height: u32) {
        self.flags.lock().last_challenge = height;
    }
}

/// Clears the round's active flag when dropped, however the round ends.
#[derive(Debug)]
pub struct RoundGuard {
    state: Arc<ChallengeRoundState>,
    kind: RoundKind,
}

impl RoundGuard {
    pub fn kind(&self) -> RoundKind {
        self.kind
    }
}

impl Drop for RoundGuard {
    fn drop(&mut self) {
        *self.state.flags.lock().slot(self.kind) = false;
    }
}

#[derive(Debug, Clone)]
pub struct RoundConfig {
    /// Budget of a single file's proof, restarted for every file.
    pub per_file_timeout: Duration,
    pub verifier: CallPolicy,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            per_file_timeout: Duration::from_secs(60),
            verifier: CallPolicy::default(),
        }
    }
}

/// A challenge as published for one round.
#[derive(Debug, Clone)]
pub struct ChallengeRound {
    pub kind: RoundKind,
    /// Chain height the challenge was issued at.
    pub start: u32,
    pub challenge: ChallengeSet,
}

/// Inputs and outputs of a round, enough to resubmit it after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub kind: RoundKind,
    pub start: u32,
    pub challenge: ChallengeSet,
    pub proof: AggregateProof,
    /// Verifier verdict, unset until the verifier answered.
    pub result: Option<bool>,
}

impl RoundRecord {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A file skipped during a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub file: String,
    pub status: StatusCode,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct RoundReport {
    pub record: RoundRecord,
    pub failures: Vec<FileFailure>,
}

impl RoundReport {
    pub fn verified(&self) -> bool {
        self.record.result == Some(true)
    }
}

pub struct ChallengeRoundCoordinator {
    scheme: Arc<dyn ProofScheme>,
    store: Arc<dyn FragmentStore>,
    verifier: Arc<dyn VerifierClient>,
    state: Arc<ChallengeRoundState>,
    sink: Option<Arc<dyn RecordSink>>,
    config: RoundConfig,
    prover_identity: Vec<u8>,
}

impl ChallengeRoundCoordinator {
    pub fn new(
        scheme: Arc<dyn ProofScheme>,
        store: Arc<dyn FragmentStore>,
        verifier: Arc<dyn VerifierClient>,
        state: Arc<ChallengeRoundState>,
        config: RoundConfig,
    ) -> Self {
        Self {
            scheme,
            store,
            verifier,
            state,
            sink: None,
            config,
            prover_identity: Vec::new(),
        }
    }

    pub fn with_record_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_prover_identity(mut self, identity: Vec<u8>) -> Self {
        self.prover_identity = identity;
        self
    }

    pub fn state(&self) -> &Arc<ChallengeRoundState> {
        &self.state
    }

    /// Run one round end to end.
    ///
    /// Files that fail on their own are skipped and listed in the report.
    /// Mixed key domains and verifier transport failures end the round with
    /// an error.
    pub async fn run_round(&self, round: ChallengeRound) -> Result<RoundReport> {
        let _guard = self
            .state
            .try_begin(round.kind)
            .ok_or(PdpError::RoundActive(round.kind))?;
        self.state.set_last_challenge(round.start);
        info!(
            "{} challenge at {} started with {} spot checks",
            round.kind,
            round.start,
            round.challenge.len()
        );

        let (proof, failures) = match self.prove_all(&round).await {
            Ok(v) => v,
            Err(e) => {
                error!("{} challenge at {} aborted: {}", round.kind, round.start, e);
                return Err(e);
            }
        };

        let record = RoundRecord {
            kind: round.kind,
            start: round.start,
            challenge: round.challenge,
            proof,
            result: None,
        };
        self.persist(&record);
        self.submit(record, failures).await
    }

    /// Resubmit a proved round whose verdict was never recorded.
    pub async fn resume_round(&self, record: RoundRecord) -> Result<RoundReport> {
        let _guard = self
            .state
            .try_begin(record.kind)
            .ok_or(PdpError::RoundActive(record.kind))?;
        if record.result.is_some() {
            debug!("{} challenge at {} already has a verdict", record.kind, record.start);
            return Ok(RoundReport {
                record,
                failures: Vec::new(),
            });
        }
        info!("resuming {} challenge at {}", record.kind, record.start);
        self.submit(record, Vec::new()).await
    }

    async fn prove_all(&self, round: &ChallengeRound) -> Result<(AggregateProof, Vec<FileFailure>)> {
        let files = self.store.eligible_files(round.kind, round.start)?;
        let challenge = Arc::new(round.challenge.clone());
        let mut proof = AggregateProof::new(self.scheme.as_ref());
        let mut failures = Vec::new();

        for file in files {
            match self.prove_file(&file, &challenge).await {
                Ok((tag, file_proof)) => {
                    proof.append(self.scheme.as_ref(), &tag, file_proof)?;
                    debug!("proved {}", file);
                }
                Err(e) if e.is_file_local() => {
                    warn!("skipping {}: {}", file, e);
                    failures.push(FileFailure {
                        file,
                        status: e.status(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok((proof, failures))
    }

    async fn prove_file(&self, file: &str, challenge: &Arc<ChallengeSet>) -> Result<(Tag, FileProof)> {
        let scheme = Arc::clone(&self.scheme);
        let store = Arc::clone(&self.store);
        let challenge = Arc::clone(challenge);
        let id = file.to_string();
        let rx = spawn_worker(move || prove_stored(scheme.as_ref(), store.as_ref(), &id, &challenge));

        // the budget covers storage reads as well as the proof itself
        match tokio::time::timeout(self.config.per_file_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(PdpError::Internal(format!(
                "proof worker for {} exited without a result",
                file
            ))),
            Err(_) => Err(PdpError::Timeout(self.config.per_file_timeout)),
        }
    }

    async fn submit(&self, mut record: RoundRecord, failures: Vec<FileFailure>) -> Result<RoundReport> {
        let request = BatchVerifyRequest {
            proof: record.proof.clone(),
            challenge: record.challenge.clone(),
            prover_identity: self.prover_identity.clone(),
        };
        match verifier::submit(self.verifier.as_ref(), &request, &self.config.verifier).await {
            Ok(verified) => {
                record.result = Some(verified);
                self.persist(&record);
                info!(
                    "{} challenge at {} finished: {} files proved, {} skipped, verified={}",
                    record.kind,
                    record.start,
                    record.proof.len(),
                    failures.len(),
                    verified
                );
                Ok(RoundReport { record, failures })
            }
            Err(e) => {
                error!(
                    "{} challenge at {} not submitted: {}",
                    record.kind, record.start, e
                );
                Err(e)
            }
        }
    }

    fn persist(&self, record: &RoundRecord) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.save(record) {
                warn!("cannot save {} challenge record: {}", record.kind, e);
            }
        }
    }
}

// Load, split and prove one stored fragment.
fn prove_stored(
    scheme: &dyn ProofScheme,
    store: &dyn FragmentStore,
    file: &str,
    challenge: &ChallengeSet,
) -> Result<(Tag, FileProof)> {
    let tag = store.load_tag(file)?;
    if tag.name() != file {
        return Err(PdpError::TagVerificationFailed(format!(
            "tag of {} stored for {}",
            tag.name(),
            file
        )));
    }
    let data = store.read_fragment(file)?;
    let matrix = partition(&data, Policy::ExactCount(tag.block_count()))?;
    let proof = scheme.generate_proof(challenge, &tag, &matrix)?;
    Ok((tag, proof))
}
