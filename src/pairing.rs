// BLS12-381 backend: authenticators live in G1, the public key in G2.
use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{G1Affine, G1Projective, G2Affine, G2Projective, Scalar, pairing};
use ff::Field;
use group::Curve;
use rand::rngs::OsRng;
use sha2::Sha256;

use crate::error::{PdpError, Result};
use crate::keys::{Domain, Mu, Sigma};
use crate::scheme::{Backend, HashLabel};

pub const SCALAR_LEN: usize = 32;

const DST_INDEX: &[u8] = b"PDP-BLS12381G1_XMD:SHA-256_SSWU_RO_INDEX_";
const DST_ATTEST: &[u8] = b"PDP-BLS12381G1_XMD:SHA-256_SSWU_RO_ATTEST_";

/// Pairing key material: generator `g` in G2, `public_key = g^secret`.
#[derive(Debug, Clone)]
pub struct PairingKeys {
    g: G2Projective,
    public_key: G2Projective,
    secret_key: Option<Scalar>,
}

impl PairingKeys {
    // Generate a secret/public key pair
    pub fn generate() -> Self {
        let x = Scalar::random(&mut OsRng);
        let g = G2Projective::generator();
        Self {
            g,
            public_key: g * x,
            secret_key: Some(x),
        }
    }

    // Rebuild keys, checking the public key against the secret
    pub fn from_parts(secret_key: Scalar, public_key: G2Projective) -> Result<Self> {
        let g = G2Projective::generator();
        if g * secret_key != public_key {
            return Err(PdpError::InvalidKey(
                "public key is not g^secret".into(),
            ));
        }
        Ok(Self {
            g,
            public_key,
            secret_key: Some(secret_key),
        })
    }

    /// Prover-side keys from a 96-byte compressed public key.
    pub fn from_public(public_key: &[u8]) -> Result<Self> {
        let bytes: [u8; 96] = public_key
            .try_into()
            .map_err(|_| PdpError::InvalidKey("public key must be 96 bytes".into()))?;
        let pk = Option::<G2Affine>::from(G2Affine::from_compressed(&bytes))
            .ok_or_else(|| PdpError::InvalidKey("public key is not a G2 point".into()))?;
        Ok(Self {
            g: G2Projective::generator(),
            public_key: pk.into(),
            secret_key: None,
        })
    }

    pub fn public_only(&self) -> Self {
        Self {
            secret_key: None,
            ..self.clone()
        }
    }

    pub fn has_secret(&self) -> bool {
        self.secret_key.is_some()
    }

    pub fn public_key_bytes(&self) -> [u8; 96] {
        self.public_key.to_affine().to_compressed()
    }

    pub fn generator_bytes(&self) -> [u8; 96] {
        self.g.to_affine().to_compressed()
    }
}

/// Read big-endian bytes as an integer reduced into the scalar field.
pub fn bytes_to_scalar(bytes: &[u8]) -> Scalar {
    // 2^64
    let shift = Scalar::from(1u64 << 32).square();
    let (head, tail) = bytes.split_at(bytes.len() % 8);
    let mut acc = Scalar::zero();
    for &b in head {
        acc = acc * Scalar::from(256u64) + Scalar::from(b as u64);
    }
    for chunk in tail.chunks_exact(8) {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        acc = acc * shift + Scalar::from(u64::from_be_bytes(word));
    }
    acc
}

pub fn encode_point(p: &G1Projective) -> Vec<u8> {
    p.to_affine().to_compressed().to_vec()
}

pub fn decode_point(bytes: &[u8]) -> Result<G1Projective> {
    let arr: [u8; 48] = bytes
        .try_into()
        .map_err(|_| PdpError::Encoding(format!("G1 point must be 48 bytes, got {}", bytes.len())))?;
    Option::<G1Affine>::from(G1Affine::from_compressed(&arr))
        .map(G1Projective::from)
        .ok_or_else(|| PdpError::Encoding("bytes are not a G1 point".into()))
}

pub fn decode_scalar(bytes: &[u8]) -> Result<Scalar> {
    let arr: [u8; SCALAR_LEN] = bytes
        .try_into()
        .map_err(|_| PdpError::Encoding(format!("scalar must be 32 bytes, got {}", bytes.len())))?;
    Option::<Scalar>::from(Scalar::from_bytes(&arr))
        .ok_or_else(|| PdpError::Encoding("scalar is not canonical".into()))
}

impl Backend for PairingKeys {
    type Coeff = Scalar;
    type Msg = Scalar;
    type Auth = G1Projective;

    const DOMAIN: Domain = Domain::Pairing;

    fn coefficient(&self, raw: &[u8]) -> Scalar {
        bytes_to_scalar(raw)
    }

    fn message(&self, block: &[u8]) -> Scalar {
        bytes_to_scalar(block)
    }

    fn msg_zero(&self) -> Scalar {
        Scalar::zero()
    }

    fn msg_mul_add(&self, acc: &Scalar, m: &Scalar, v: &Scalar) -> Scalar {
        acc + m * v
    }

    fn auth_identity(&self) -> G1Projective {
        G1Projective::identity()
    }

    fn auth_mul(&self, a: &G1Projective, b: &G1Projective) -> G1Projective {
        a + b
    }

    fn auth_pow(&self, a: &G1Projective, v: &Scalar) -> G1Projective {
        a * v
    }

    fn auth_pow_msg(&self, a: &G1Projective, m: &Scalar) -> G1Projective {
        a * m
    }

    fn hash_to_auth(&self, label: HashLabel, msg: &[u8]) -> G1Projective {
        let dst = match label {
            HashLabel::BlockIndex => DST_INDEX,
            HashLabel::Attestation => DST_ATTEST,
        };
        <G1Projective as HashToCurve<ExpandMsgXmd<Sha256>>>::hash_to_curve(msg, dst)
    }

    fn random_commitment(&self) -> G1Projective {
        G1Projective::generator() * Scalar::random(&mut OsRng)
    }

    fn secret_exp(&self, a: &G1Projective) -> Result<G1Projective> {
        let x = self.secret_key.ok_or(PdpError::MissingSecretKey)?;
        Ok(a * x)
    }

    // e(signed, g) == e(expected, g^x)
    fn check(&self, signed: &G1Projective, expected: &G1Projective) -> bool {
        let lhs = pairing(&signed.to_affine(), &self.g.to_affine());
        let rhs = pairing(&expected.to_affine(), &self.public_key.to_affine());
        lhs == rhs
    }

    fn encode_auth(&self, a: &G1Projective) -> Vec<u8> {
        encode_point(a)
    }

    fn decode_auth(&self, bytes: &[u8]) -> Result<G1Projective> {
        decode_point(bytes)
    }

    fn wrap_sigma(&self, a: G1Projective) -> Sigma {
        Sigma::Pairing(a)
    }

    fn unwrap_sigma(&self, s: &Sigma) -> Result<G1Projective> {
        match s {
            Sigma::Pairing(p) => Ok(*p),
            other => Err(PdpError::DomainMismatch {
                expected: Domain::Pairing,
                found: other.domain(),
            }),
        }
    }

    fn wrap_mu(&self, m: Scalar) -> Mu {
        Mu::Pairing(m)
    }

    fn unwrap_mu(&self, m: &Mu) -> Result<Scalar> {
        match m {
            Mu::Pairing(s) => Ok(*s),
            other => Err(PdpError::DomainMismatch {
                expected: Domain::Pairing,
                found: other.domain(),
            }),
        }
    }

    fn emits_block_hashes(&self) -> bool {
        true
    }
}
