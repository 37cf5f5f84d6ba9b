//! Provable data possession for a storage miner.
//!
//! Files are split into blocks, each block carries a homomorphic
//! authenticator issued by the tag issuer, and a challenge round folds the
//! spot-checked blocks of every stored file into one aggregate proof that a
//! verifier checks without reading the data. Two interchangeable schemes are
//! provided: BLS12-381 pairings and RSA-style modular arithmetic.

pub mod aggregate;
pub mod challenge;
pub mod config;
pub mod error;
pub mod keys;
pub mod modular;
pub mod pairing;
pub mod partition;
pub mod prover;
pub mod round;
pub mod scheme;
pub mod store;
pub mod tag;
pub mod verifier;

pub use aggregate::AggregateProof;
pub use challenge::{ChallengeElement, ChallengeSet};
pub use config::NodeConfig;
pub use error::{PdpError, Result};
pub use keys::{Domain, KeyMaterial, Mu, Sigma};
pub use modular::ModularKeys;
pub use pairing::PairingKeys;
pub use partition::{Matrix, Policy, partition, partition_file};
pub use prover::{FileProof, StatusCode, spawn_proof};
pub use round::{
    ChallengeRound, ChallengeRoundCoordinator, ChallengeRoundState, RoundConfig, RoundKind,
    RoundRecord, RoundReport,
};
pub use scheme::ProofScheme;
pub use store::{DirFragmentStore, FragmentStore, JsonRecordFile, RecordSink};
pub use tag::Tag;
pub use verifier::{BatchVerifyRequest, LocalVerifier, VerifierClient};
