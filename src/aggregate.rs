use serde::{Deserialize, Serialize};

use crate::challenge::ChallengeSet;
use crate::error::{PdpError, Result};
use crate::keys::{Mu, Sigma};
use crate::prover::FileProof;
use crate::scheme::{Backend, ProofScheme, index_hash};
use crate::tag::{self, Tag};

/// Round-wide proof: one combined sigma plus per-file entries in the order
/// files were proved. The verifier reads the lists positionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateProof {
    pub names: Vec<String>,
    pub us: Vec<String>,
    pub mus: Vec<Mu>,
    pub sigma: Sigma,
    /// Owner signatures, reserved.
    pub usig: Vec<String>,
}

impl AggregateProof {
    pub fn new(scheme: &dyn ProofScheme) -> Self {
        Self {
            names: Vec::new(),
            us: Vec::new(),
            mus: Vec::new(),
            sigma: scheme.identity_sigma(),
            usig: Vec::new(),
        }
    }

    /// Fold one file's proof in. On error the aggregate is left untouched.
    pub fn append(&mut self, scheme: &dyn ProofScheme, tag: &Tag, proof: FileProof) -> Result<()> {
        if proof.mu.domain() != proof.sigma.domain() {
            return Err(PdpError::DomainMismatch {
                expected: proof.sigma.domain(),
                found: proof.mu.domain(),
            });
        }
        self.sigma = scheme.aggregate_append(&self.sigma, &proof.sigma)?;
        self.names.push(tag.body.name.clone());
        self.us.push(tag.body.u.clone());
        self.mus.push(proof.mu);
        self.usig.push(tag.usig.clone());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub(crate) fn append<B: Backend + ?Sized>(b: &B, acc: &Sigma, next: &Sigma) -> Result<Sigma> {
    let acc = b.unwrap_sigma(acc)?;
    let next = b.unwrap_sigma(next)?;
    Ok(b.wrap_sigma(b.auth_mul(&acc, &next)))
}

pub(crate) fn across_files<B: Backend + ?Sized>(
    b: &B,
    challenge: &ChallengeSet,
    tags: &[Tag],
) -> Result<Sigma> {
    let mut sigma = b.auth_identity();
    for t in tags {
        for e in challenge.iter() {
            let phi = tag::decode_phi(b, t, e.index)?;
            sigma = b.auth_mul(&sigma, &b.auth_pow(&phi, &b.coefficient(&e.coefficient)));
        }
    }
    Ok(b.wrap_sigma(sigma))
}

// check(sigma, prod_f (prod_i H(name_f, i)^v_i * u_f^mu_f))
pub(crate) fn verify<B: Backend + ?Sized>(
    b: &B,
    challenge: &ChallengeSet,
    proof: &AggregateProof,
) -> Result<bool> {
    if proof.names.len() != proof.us.len() || proof.names.len() != proof.mus.len() {
        return Err(PdpError::Encoding(format!(
            "aggregate lists disagree: {} names, {} us, {} mus",
            proof.names.len(),
            proof.us.len(),
            proof.mus.len()
        )));
    }
    let sigma = b.unwrap_sigma(&proof.sigma)?;
    let coefficients: Vec<B::Coeff> = challenge
        .iter()
        .map(|e| b.coefficient(&e.coefficient))
        .collect();

    let mut expected = b.auth_identity();
    for ((name, u), mu) in proof.names.iter().zip(&proof.us).zip(&proof.mus) {
        let u = b.decode_auth(&hex::decode(u)?)?;
        let mu = b.unwrap_mu(mu)?;
        for (e, v) in challenge.iter().zip(&coefficients) {
            expected = b.auth_mul(&expected, &b.auth_pow(&index_hash(b, name, e.index), v));
        }
        expected = b.auth_mul(&expected, &b.auth_pow_msg(&u, &mu));
    }
    Ok(b.check(&sigma, &expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Domain;
    use crate::pairing::PairingKeys;
    use bls12_381::G1Projective;
    use num_bigint::BigUint;

    #[test]
    fn test_mixed_domains_rejected() {
        let keys = PairingKeys::generate();
        let pairing = Sigma::Pairing(G1Projective::generator());
        let modular = Sigma::Modular(BigUint::from(5u32));
        let err = keys.aggregate_append(&pairing, &modular).unwrap_err();
        assert!(matches!(
            err,
            PdpError::DomainMismatch {
                expected: Domain::Pairing,
                found: Domain::Modular
            }
        ));
        assert!(!err.is_file_local());
    }

    #[test]
    fn test_append_keeps_state_on_error() {
        let keys = PairingKeys::generate();
        let mut agg = AggregateProof::new(&keys);
        let m: Vec<Vec<u8>> = vec![vec![1u8; 8]; 2];
        let tag = keys.issue_tag("f", &m).expect("issue");
        let bad = FileProof {
            mu: Mu::Modular(BigUint::from(1u32)),
            sigma: Sigma::Modular(BigUint::from(1u32)),
            block_hashes: Vec::new(),
        };
        assert!(agg.append(&keys, &tag, bad).is_err());
        assert!(agg.is_empty());
        assert_eq!(agg.sigma, keys.identity_sigma());
    }

    #[test]
    fn test_list_length_mismatch_rejected() {
        let keys = PairingKeys::generate();
        let mut agg = AggregateProof::new(&keys);
        agg.names.push("ghost".into());
        assert!(keys.verify_aggregate(&ChallengeSet::default(), &agg).is_err());
    }

    #[test]
    fn test_empty_aggregate_verifies() {
        let keys = PairingKeys::generate();
        let agg = AggregateProof::new(&keys);
        assert!(keys
            .verify_aggregate(&ChallengeSet::random(4, 2), &agg)
            .expect("verify"));
    }
}
