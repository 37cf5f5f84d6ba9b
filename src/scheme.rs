use std::fmt;

use crate::aggregate::{self, AggregateProof};
use crate::challenge::ChallengeSet;
use crate::error::Result;
use crate::keys::{Domain, Mu, Sigma};
use crate::prover::{self, FileProof};
use crate::tag::{self, Tag};

/// Which hash-to-group map a message goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashLabel {
    /// H(name, i) used in every block authenticator.
    BlockIndex,
    /// Digest of the tag fields signed by the issuer.
    Attestation,
}

/// Group algebra of one authenticator domain.
///
/// Written multiplicatively: for the pairing backend `auth_mul` is point
/// addition and `auth_pow` is scalar multiplication.
pub trait Backend: fmt::Debug + Send + Sync + 'static {
    /// Challenge coefficient in the domain.
    type Coeff;
    /// Block message and `mu` accumulator.
    type Msg: Clone;
    /// Authenticator and `sigma` accumulator.
    type Auth: Clone + PartialEq;

    const DOMAIN: Domain;

    fn coefficient(&self, raw: &[u8]) -> Self::Coeff;
    fn message(&self, block: &[u8]) -> Self::Msg;
    fn msg_zero(&self) -> Self::Msg;
    /// `acc + v * m`
    fn msg_mul_add(&self, acc: &Self::Msg, m: &Self::Msg, v: &Self::Coeff) -> Self::Msg;

    fn auth_identity(&self) -> Self::Auth;
    fn auth_mul(&self, a: &Self::Auth, b: &Self::Auth) -> Self::Auth;
    fn auth_pow(&self, a: &Self::Auth, v: &Self::Coeff) -> Self::Auth;
    fn auth_pow_msg(&self, a: &Self::Auth, m: &Self::Msg) -> Self::Auth;
    fn hash_to_auth(&self, label: HashLabel, msg: &[u8]) -> Self::Auth;
    fn random_commitment(&self) -> Self::Auth;

    /// Raise to the secret exponent. Fails without the secret key.
    fn secret_exp(&self, a: &Self::Auth) -> Result<Self::Auth>;
    /// Whether `signed` is `expected` raised to the secret exponent.
    fn check(&self, signed: &Self::Auth, expected: &Self::Auth) -> bool;

    fn encode_auth(&self, a: &Self::Auth) -> Vec<u8>;
    fn decode_auth(&self, bytes: &[u8]) -> Result<Self::Auth>;

    fn wrap_sigma(&self, a: Self::Auth) -> Sigma;
    fn unwrap_sigma(&self, s: &Sigma) -> Result<Self::Auth>;
    fn wrap_mu(&self, m: Self::Msg) -> Mu;
    fn unwrap_mu(&self, m: &Mu) -> Result<Self::Msg>;

    /// Whether proofs carry a hash of every challenged block.
    fn emits_block_hashes(&self) -> bool {
        false
    }
}

/// H(name, i): the per-block base every authenticator commits to.
pub(crate) fn index_hash<B: Backend + ?Sized>(b: &B, name: &str, index: usize) -> B::Auth {
    let mut msg = Vec::with_capacity(name.len() + 16);
    msg.extend_from_slice(&(name.len() as u64).to_be_bytes());
    msg.extend_from_slice(name.as_bytes());
    msg.extend_from_slice(&(index as u64).to_be_bytes());
    b.hash_to_auth(HashLabel::BlockIndex, &msg)
}

/// The proof contract shared by both schemes.
pub trait ProofScheme: Send + Sync {
    fn domain(&self) -> Domain;

    /// Empty aggregate: group identity or 1 mod N.
    fn identity_sigma(&self) -> Sigma;

    /// Issue the tag for a file matrix. Needs the secret key.
    fn issue_tag(&self, name: &str, matrix: &[Vec<u8>]) -> Result<Tag>;

    /// Check the tag's phi hash and issuer attestation.
    fn verify_tag(&self, tag: &Tag) -> Result<()>;

    fn generate_proof(
        &self,
        challenge: &ChallengeSet,
        tag: &Tag,
        matrix: &[Vec<u8>],
    ) -> Result<FileProof>;

    fn aggregate_append(&self, acc: &Sigma, next: &Sigma) -> Result<Sigma>;

    fn aggregate_across_files(&self, challenge: &ChallengeSet, tags: &[Tag]) -> Result<Sigma>;

    fn verify_aggregate(&self, challenge: &ChallengeSet, proof: &AggregateProof) -> Result<bool>;
}

impl<B: Backend> ProofScheme for B {
    fn domain(&self) -> Domain {
        B::DOMAIN
    }

    fn identity_sigma(&self) -> Sigma {
        self.wrap_sigma(self.auth_identity())
    }

    fn issue_tag(&self, name: &str, matrix: &[Vec<u8>]) -> Result<Tag> {
        tag::issue(self, name, matrix)
    }

    fn verify_tag(&self, tag: &Tag) -> Result<()> {
        tag::verify(self, tag)
    }

    fn generate_proof(
        &self,
        challenge: &ChallengeSet,
        tag: &Tag,
        matrix: &[Vec<u8>],
    ) -> Result<FileProof> {
        prover::prove(self, challenge, tag, matrix)
    }

    fn aggregate_append(&self, acc: &Sigma, next: &Sigma) -> Result<Sigma> {
        aggregate::append(self, acc, next)
    }

    fn aggregate_across_files(&self, challenge: &ChallengeSet, tags: &[Tag]) -> Result<Sigma> {
        aggregate::across_files(self, challenge, tags)
    }

    fn verify_aggregate(&self, challenge: &ChallengeSet, proof: &AggregateProof) -> Result<bool> {
        aggregate::verify(self, challenge, proof)
    }
}
