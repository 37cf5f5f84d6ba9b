use std::fmt;
use std::sync::Arc;

use bls12_381::{G1Projective, Scalar};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::{PdpError, Result};
use crate::modular::ModularKeys;
use crate::pairing::{self, PairingKeys};
use crate::scheme::ProofScheme;

/// Algebraic domain a proof value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Pairing,
    Modular,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Pairing => write!(f, "pairing"),
            Domain::Modular => write!(f, "modular"),
        }
    }
}

// Passed explicitly to whoever needs it, never held globally
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    Pairing(PairingKeys),
    Modular(ModularKeys),
}

impl KeyMaterial {
    pub fn domain(&self) -> Domain {
        match self {
            KeyMaterial::Pairing(_) => Domain::Pairing,
            KeyMaterial::Modular(_) => Domain::Modular,
        }
    }

    pub fn public_only(&self) -> KeyMaterial {
        match self {
            KeyMaterial::Pairing(k) => KeyMaterial::Pairing(k.public_only()),
            KeyMaterial::Modular(k) => KeyMaterial::Modular(k.public_only()),
        }
    }

    pub fn into_scheme(self) -> Arc<dyn ProofScheme> {
        match self {
            KeyMaterial::Pairing(k) => Arc::new(k),
            KeyMaterial::Modular(k) => Arc::new(k),
        }
    }
}

/// Aggregated authenticator value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Encoded", try_from = "Encoded")]
pub enum Sigma {
    Pairing(G1Projective),
    Modular(BigUint),
}

/// Aggregated coefficient value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Encoded", try_from = "Encoded")]
pub enum Mu {
    Pairing(Scalar),
    Modular(BigUint),
}

impl Sigma {
    pub fn domain(&self) -> Domain {
        match self {
            Sigma::Pairing(_) => Domain::Pairing,
            Sigma::Modular(_) => Domain::Modular,
        }
    }

    /// Canonical bytes: compressed G1 point or big-endian integer.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Sigma::Pairing(p) => pairing::encode_point(p),
            Sigma::Modular(n) => n.to_bytes_be(),
        }
    }

    pub fn from_bytes(domain: Domain, bytes: &[u8]) -> Result<Self> {
        match domain {
            Domain::Pairing => Ok(Sigma::Pairing(pairing::decode_point(bytes)?)),
            Domain::Modular => Ok(Sigma::Modular(BigUint::from_bytes_be(bytes))),
        }
    }
}

impl Mu {
    pub fn domain(&self) -> Domain {
        match self {
            Mu::Pairing(_) => Domain::Pairing,
            Mu::Modular(_) => Domain::Modular,
        }
    }

    /// Canonical bytes: little-endian scalar or big-endian integer.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Mu::Pairing(s) => s.to_bytes().to_vec(),
            Mu::Modular(n) => n.to_bytes_be(),
        }
    }

    pub fn from_bytes(domain: Domain, bytes: &[u8]) -> Result<Self> {
        match domain {
            Domain::Pairing => Ok(Mu::Pairing(pairing::decode_scalar(bytes)?)),
            Domain::Modular => Ok(Mu::Modular(BigUint::from_bytes_be(bytes))),
        }
    }
}

// Wire form shared by `Sigma` and `Mu`.
#[derive(Serialize, Deserialize)]
struct Encoded {
    domain: Domain,
    hex: String,
}

impl From<Sigma> for Encoded {
    fn from(s: Sigma) -> Self {
        Encoded {
            domain: s.domain(),
            hex: hex::encode(s.to_bytes()),
        }
    }
}

impl TryFrom<Encoded> for Sigma {
    type Error = PdpError;

    fn try_from(e: Encoded) -> Result<Self> {
        Sigma::from_bytes(e.domain, &hex::decode(e.hex)?)
    }
}

impl From<Mu> for Encoded {
    fn from(m: Mu) -> Self {
        Encoded {
            domain: m.domain(),
            hex: hex::encode(m.to_bytes()),
        }
    }
}

impl TryFrom<Encoded> for Mu {
    type Error = PdpError;

    fn try_from(e: Encoded) -> Result<Self> {
        Mu::from_bytes(e.domain, &hex::decode(e.hex)?)
    }
}
