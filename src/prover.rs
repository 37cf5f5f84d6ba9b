use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::oneshot;

use crate::challenge::ChallengeSet;
use crate::error::{PdpError, Result};
use crate::keys::{Mu, Sigma};
use crate::scheme::{Backend, ProofScheme};
use crate::tag::{self, Tag};

/// Outcome code of a proof computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    /// Timed out before a result arrived.
    NoProgress = 0,
    Success = 200,
    /// Tag, index or size rejected.
    ErrorParam = 202,
    /// Encoding or arithmetic failure.
    ErrorInternal = 204,
}

impl StatusCode {
    pub fn of<T>(result: &Result<T>) -> StatusCode {
        match result {
            Ok(_) => StatusCode::Success,
            Err(e) => e.status(),
        }
    }
}

/// Proof that one file still holds the challenged blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct FileProof {
    /// Sum of coefficient * block.
    pub mu: Mu,
    /// Product of authenticator^coefficient.
    pub sigma: Sigma,
    /// SHA-256 of each challenged block, pairing scheme only.
    pub block_hashes: Vec<[u8; 32]>,
}

pub(crate) fn prove<B: Backend + ?Sized>(
    b: &B,
    challenge: &ChallengeSet,
    tag: &Tag,
    matrix: &[Vec<u8>],
) -> Result<FileProof> {
    tag::verify(b, tag)?;

    let mut mu = b.msg_zero();
    let mut sigma = b.auth_identity();
    let mut block_hashes = Vec::new();
    for e in challenge.iter() {
        let block = matrix.get(e.index).ok_or(PdpError::IndexOutOfRange {
            index: e.index,
            len: matrix.len(),
        })?;
        let phi = tag::decode_phi(b, tag, e.index)?;
        let v = b.coefficient(&e.coefficient);

        mu = b.msg_mul_add(&mu, &b.message(block), &v);
        sigma = b.auth_mul(&sigma, &b.auth_pow(&phi, &v));
        if b.emits_block_hashes() {
            let mut h = [0u8; 32];
            h.copy_from_slice(&Sha256::digest(block));
            block_hashes.push(h);
        }
    }

    Ok(FileProof {
        mu: b.wrap_mu(mu),
        sigma: b.wrap_sigma(sigma),
        block_hashes,
    })
}

/// Run `job` on the blocking pool.
///
/// The result lands in a single-slot channel; if the receiver has given up
/// the send fails and the result is dropped.
pub fn spawn_worker<T, F>(job: F) -> oneshot::Receiver<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        let _ = tx.send(job());
    });
    rx
}

// Compute a file proof on the blocking pool
pub fn spawn_proof(
    scheme: Arc<dyn ProofScheme>,
    challenge: Arc<ChallengeSet>,
    tag: Tag,
    matrix: Vec<Vec<u8>>,
) -> oneshot::Receiver<Result<FileProof>> {
    spawn_worker(move || scheme.generate_proof(&challenge, &tag, &matrix))
}
