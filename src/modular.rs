// RSA-style backend: authenticators are integers mod N.
use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::{PdpError, Result};
use crate::keys::{Domain, Mu, Sigma};
use crate::scheme::{Backend, HashLabel};

pub const PUBLIC_EXPONENT: u32 = 65537;

/// Modular key material. The private exponent stays with the tag issuer.
#[derive(Debug, Clone)]
pub struct ModularKeys {
    n: BigUint,
    e: BigUint,
    d: Option<BigUint>,
}

impl ModularKeys {
    // Issuer keys from two distinct primes
    pub fn from_primes(p: &BigUint, q: &BigUint, e: &BigUint) -> Result<Self> {
        if p == q || p <= &BigUint::one() || q <= &BigUint::one() {
            return Err(PdpError::InvalidKey("primes must be distinct and > 1".into()));
        }
        let n = p * q;
        let phi = BigInt::from((p - 1u32) * (q - 1u32));
        let egcd = BigInt::from(e.clone()).extended_gcd(&phi);
        if !egcd.gcd.is_one() {
            return Err(PdpError::InvalidKey(
                "public exponent is not invertible mod phi(N)".into(),
            ));
        }
        let d = egcd
            .x
            .mod_floor(&phi)
            .to_biguint()
            .ok_or_else(|| PdpError::InvalidKey("negative private exponent".into()))?;
        Ok(Self {
            n,
            e: e.clone(),
            d: Some(d),
        })
    }

    /// Fresh issuer keys with a modulus of about `bits` bits.
    pub fn generate(bits: u64) -> Result<Self> {
        if bits < 64 {
            return Err(PdpError::InvalidKey(format!("{}-bit modulus is too small", bits)));
        }
        let e = BigUint::from(PUBLIC_EXPONENT);
        loop {
            let p = random_prime(bits / 2);
            let q = random_prime(bits - bits / 2);
            // retry when e divides p - 1 or q - 1
            if let Ok(keys) = Self::from_primes(&p, &q, &e) {
                return Ok(keys);
            }
        }
    }

    pub fn from_public(n: BigUint, e: BigUint) -> Result<Self> {
        if n <= BigUint::one() || e.is_zero() {
            return Err(PdpError::InvalidKey("degenerate public key".into()));
        }
        Ok(Self { n, e, d: None })
    }

    pub fn public_only(&self) -> Self {
        Self {
            d: None,
            ..self.clone()
        }
    }

    pub fn has_secret(&self) -> bool {
        self.d.is_some()
    }

    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    pub fn public_exponent(&self) -> &BigUint {
        &self.e
    }

    fn byte_len(&self) -> usize {
        ((self.n.bits() + 7) / 8) as usize
    }
}

const MILLER_RABIN_ROUNDS: usize = 32;

fn random_prime(bits: u64) -> BigUint {
    let mut rng = OsRng;
    loop {
        let mut candidate = rng.gen_biguint(bits);
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(0, true);
        if is_probable_prime(&candidate) {
            return candidate;
        }
    }
}

fn is_probable_prime(n: &BigUint) -> bool {
    let two = BigUint::from(2u32);
    if *n < two {
        return false;
    }
    for small in [2u32, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37] {
        if n == &BigUint::from(small) {
            return true;
        }
        if (n % small).is_zero() {
            return false;
        }
    }

    // n - 1 = d * 2^s
    let n_minus_one = n - 1u32;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;
    let mut rng = OsRng;
    'witness: for _ in 0..MILLER_RABIN_ROUNDS {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

impl Backend for ModularKeys {
    type Coeff = BigUint;
    type Msg = BigUint;
    type Auth = BigUint;

    const DOMAIN: Domain = Domain::Modular;

    fn coefficient(&self, raw: &[u8]) -> BigUint {
        BigUint::from_bytes_be(raw)
    }

    fn message(&self, block: &[u8]) -> BigUint {
        BigUint::from_bytes_be(block)
    }

    fn msg_zero(&self) -> BigUint {
        BigUint::zero()
    }

    // mu stays a plain integer, it is an exponent of u
    fn msg_mul_add(&self, acc: &BigUint, m: &BigUint, v: &BigUint) -> BigUint {
        acc + m * v
    }

    fn auth_identity(&self) -> BigUint {
        BigUint::one()
    }

    fn auth_mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.n
    }

    fn auth_pow(&self, a: &BigUint, v: &BigUint) -> BigUint {
        a.modpow(v, &self.n)
    }

    fn auth_pow_msg(&self, a: &BigUint, m: &BigUint) -> BigUint {
        a.modpow(m, &self.n)
    }

    // Full-domain hash: SHA-256 in counter mode, 16 bytes wider than N.
    fn hash_to_auth(&self, label: HashLabel, msg: &[u8]) -> BigUint {
        let tag: u8 = match label {
            HashLabel::BlockIndex => 1,
            HashLabel::Attestation => 2,
        };
        let want = self.byte_len() + 16;
        let mut out = Vec::with_capacity(want + 32);
        let mut counter = 0u32;
        while out.len() < want {
            let mut hasher = Sha256::new();
            hasher.update([tag]);
            hasher.update(counter.to_be_bytes());
            hasher.update(msg);
            out.extend_from_slice(&hasher.finalize());
            counter += 1;
        }
        let h = BigUint::from_bytes_be(&out[..want]) % &self.n;
        if h.is_zero() { BigUint::one() } else { h }
    }

    fn random_commitment(&self) -> BigUint {
        let mut rng = OsRng;
        loop {
            let u = rng.gen_biguint_below(&self.n);
            if u > BigUint::one() {
                return u;
            }
        }
    }

    fn secret_exp(&self, a: &BigUint) -> Result<BigUint> {
        let d = self.d.as_ref().ok_or(PdpError::MissingSecretKey)?;
        Ok(a.modpow(d, &self.n))
    }

    // signed^e == expected (mod N)
    fn check(&self, signed: &BigUint, expected: &BigUint) -> bool {
        signed.modpow(&self.e, &self.n) == expected % &self.n
    }

    fn encode_auth(&self, a: &BigUint) -> Vec<u8> {
        a.to_bytes_be()
    }

    fn decode_auth(&self, bytes: &[u8]) -> Result<BigUint> {
        let a = BigUint::from_bytes_be(bytes);
        if a >= self.n {
            return Err(PdpError::Encoding("value is not reduced mod N".into()));
        }
        Ok(a)
    }

    fn wrap_sigma(&self, a: BigUint) -> Sigma {
        Sigma::Modular(a)
    }

    fn unwrap_sigma(&self, s: &Sigma) -> Result<BigUint> {
        match s {
            Sigma::Modular(a) => Ok(a % &self.n),
            other => Err(PdpError::DomainMismatch {
                expected: Domain::Modular,
                found: other.domain(),
            }),
        }
    }

    fn wrap_mu(&self, m: BigUint) -> Mu {
        Mu::Modular(m)
    }

    fn unwrap_mu(&self, m: &Mu) -> Result<BigUint> {
        match m {
            Mu::Modular(a) => Ok(a.clone()),
            other => Err(PdpError::DomainMismatch {
                expected: Domain::Modular,
                found: other.domain(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2^127 - 1 and 2^89 - 1
    fn test_keys() -> ModularKeys {
        let p = (BigUint::one() << 127usize) - 1u32;
        let q = (BigUint::one() << 89usize) - 1u32;
        ModularKeys::from_primes(&p, &q, &BigUint::from(PUBLIC_EXPONENT)).expect("keys")
    }

    #[test]
    fn test_secret_exp_inverts_public_exp() {
        let keys = test_keys();
        let x = BigUint::from(0xdead_beefu64);
        let signed = keys.secret_exp(&x).expect("sign");
        assert!(keys.check(&signed, &x));
        assert!(!keys.check(&x, &signed));
    }

    #[test]
    fn test_from_primes_rejects_bad_input() {
        let p = BigUint::from(11u32);
        assert!(ModularKeys::from_primes(&p, &p, &BigUint::from(3u32)).is_err());
        // phi = 10 * 12, e = 3 shares a factor
        let q = BigUint::from(13u32);
        assert!(ModularKeys::from_primes(&p, &q, &BigUint::from(3u32)).is_err());
        assert!(ModularKeys::from_primes(&p, &q, &BigUint::from(7u32)).is_ok());
    }

    #[test]
    fn test_hash_is_reduced_and_labelled() {
        let keys = test_keys();
        let a = keys.hash_to_auth(HashLabel::BlockIndex, b"file");
        let b = keys.hash_to_auth(HashLabel::Attestation, b"file");
        assert!(a < *keys.modulus());
        assert_ne!(a, b);
        assert_eq!(a, keys.hash_to_auth(HashLabel::BlockIndex, b"file"));
    }

    #[test]
    fn test_decode_rejects_unreduced() {
        let keys = test_keys();
        let big = keys.modulus().to_bytes_be();
        assert!(keys.decode_auth(&big).is_err());
        assert!(keys.decode_auth(&[7]).is_ok());
    }

    #[test]
    fn test_primality() {
        assert!(is_probable_prime(&((BigUint::one() << 89usize) - 1u32)));
        assert!(!is_probable_prime(&((BigUint::one() << 67usize) - 1u32)));
        assert!(!is_probable_prime(&BigUint::from(561u32)));
        assert!(is_probable_prime(&BigUint::from(37u32)));
    }

    #[test]
    fn test_generate() {
        let keys = ModularKeys::generate(256).expect("keys");
        assert!(keys.modulus().bits() >= 255);
        let x = BigUint::from(12345u32);
        assert!(keys.check(&keys.secret_exp(&x).expect("sign"), &x));
        assert!(ModularKeys::generate(16).is_err());
    }

    #[test]
    fn test_public_only() {
        let keys = test_keys();
        let public = keys.public_only();
        assert!(keys.has_secret());
        assert!(!public.has_secret());
        assert!(matches!(
            public.secret_exp(&BigUint::from(2u32)),
            Err(PdpError::MissingSecretKey)
        ));
        let rebuilt =
            ModularKeys::from_public(keys.modulus().clone(), keys.public_exponent().clone())
                .expect("public");
        assert_eq!(rebuilt.modulus(), keys.modulus());
    }
}
