use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PdpError, Result};
use crate::scheme::{Backend, HashLabel, index_hash};

/// Per-file authenticator tag as stored next to the fragment.
///
/// `phi[i]` authenticates block `i` of the file matrix. Tags are never
/// mutated after issuance and are re-verified before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "t")]
    pub body: TagBody,
    /// Hex SHA-256 over the concatenated phi values.
    pub phi_hash: String,
    /// Hex issuer signature over name, u and phi hash.
    pub attest: String,
    /// Hex owner signature, forwarded untouched in aggregate proofs.
    #[serde(default)]
    pub usig: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagBody {
    pub name: String,
    /// Hex commitment `u` used in every authenticator.
    pub u: String,
    /// Hex authenticators, one per block.
    pub phi: Vec<String>,
}

impl Tag {
    pub fn name(&self) -> &str {
        &self.body.name
    }

    pub fn block_count(&self) -> usize {
        self.body.phi.len()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// SHA-256 over the decoded phi values in order.
pub fn phi_hash(phi: &[Vec<u8>]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for p in phi {
        hasher.update(p);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

// SHA-256(SHA-256(name || u || phi_hash))
fn attestation_digest(name: &str, u: &str, phi_hash: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(u.as_bytes());
    hasher.update(phi_hash);
    Sha256::digest(&hasher.finalize()).to_vec()
}

pub(crate) fn issue<B: Backend + ?Sized>(b: &B, name: &str, matrix: &[Vec<u8>]) -> Result<Tag> {
    if matrix.is_empty() {
        return Err(PdpError::InvalidSize("cannot tag an empty matrix".into()));
    }
    let u = b.random_commitment();

    // phi_i = (H(name, i) * u^m_i)^secret
    let mut phi = Vec::with_capacity(matrix.len());
    for (i, block) in matrix.iter().enumerate() {
        let m = b.message(block);
        let base = b.auth_mul(&index_hash(b, name, i), &b.auth_pow_msg(&u, &m));
        phi.push(b.encode_auth(&b.secret_exp(&base)?));
    }

    let u_hex = hex::encode(b.encode_auth(&u));
    let hash = phi_hash(&phi);
    let digest = attestation_digest(name, &u_hex, &hash);
    let attest = b.secret_exp(&b.hash_to_auth(HashLabel::Attestation, &digest))?;

    Ok(Tag {
        body: TagBody {
            name: name.to_string(),
            u: u_hex,
            phi: phi.iter().map(hex::encode).collect(),
        },
        phi_hash: hex::encode(hash),
        attest: hex::encode(b.encode_auth(&attest)),
        usig: String::new(),
    })
}

pub(crate) fn verify<B: Backend + ?Sized>(b: &B, tag: &Tag) -> Result<()> {
    let phi = tag
        .body
        .phi
        .iter()
        .map(hex::decode)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PdpError::TagVerificationFailed(format!("malformed phi: {}", e)))?;
    let claimed = hex::decode(&tag.phi_hash)
        .map_err(|e| PdpError::TagVerificationFailed(format!("malformed phi hash: {}", e)))?;
    let hash = phi_hash(&phi);
    if claimed != hash {
        return Err(PdpError::TagVerificationFailed(format!(
            "phi hash mismatch for {}",
            tag.name()
        )));
    }

    let attest = hex::decode(&tag.attest)
        .map_err(PdpError::from)
        .and_then(|bytes| b.decode_auth(&bytes))
        .map_err(|e| PdpError::TagVerificationFailed(format!("malformed attestation: {}", e)))?;
    let digest = attestation_digest(tag.name(), &tag.body.u, &hash);
    if !b.check(&attest, &b.hash_to_auth(HashLabel::Attestation, &digest)) {
        return Err(PdpError::TagVerificationFailed(format!(
            "attestation of {} does not match issuer key",
            tag.name()
        )));
    }
    Ok(())
}

/// Authenticator of block `index`, bounds-checked against the tag.
pub(crate) fn decode_phi<B: Backend + ?Sized>(b: &B, tag: &Tag, index: usize) -> Result<B::Auth> {
    let entry = tag.body.phi.get(index).ok_or(PdpError::IndexOutOfRange {
        index,
        len: tag.block_count(),
    })?;
    b.decode_auth(&hex::decode(entry)?)
}
