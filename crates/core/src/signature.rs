//! Transaction signatures: EdDSA over Baby JubJub with a Poseidon challenge

use std::fmt;

use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bn254::{EdwardsAffine, Fr as Scalar};
use ark_ff::{BigInteger, PrimeField};
use rand::{CryptoRng, RngCore};
use rollup_smt::{FieldElement, FieldHasher};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::Hasher;

/// Baby JubJub public key (affine coordinates over the BN254 scalar field)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    /// x coordinate
    pub x: FieldElement,
    /// y coordinate
    pub y: FieldElement,
}

impl PublicKey {
    /// Key from raw coordinates
    pub const fn new(x: FieldElement, y: FieldElement) -> Self {
        Self { x, y }
    }

    /// The `(0, 0)` key of the reserved zero-address account. Transfers to
    /// it are withdrawals.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Whether both coordinates are zero
    pub fn is_zero(&self) -> bool {
        self.x.is_zero() && self.y.is_zero()
    }
}

/// Signature `(R8, S)` as consumed by the circuit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// x coordinate of `R8`
    pub r8x: FieldElement,
    /// y coordinate of `R8`
    pub r8y: FieldElement,
    /// Scalar `S`
    pub s: FieldElement,
}

/// 32-byte signing seed
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    /// Key from a fixed seed
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Fresh random key
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn scalar(&self) -> Scalar {
        let digest = Sha256::new().chain_update(b"rollup-eddsa-key").chain_update(self.0).finalize();
        Scalar::from_le_bytes_mod_order(digest.as_slice())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Signature oracle consumed by the engine
pub trait SignatureScheme: fmt::Debug + Send + Sync {
    /// Public key for a private key
    fn public_key(&self, key: &PrivateKey) -> PublicKey;

    /// Sign a field-element message
    fn sign(&self, key: &PrivateKey, message: &FieldElement) -> Signature;

    /// Check a signature over `message` against `public_key`
    fn verify(&self, message: &FieldElement, signature: &Signature, public_key: &PublicKey) -> bool;
}

/// EdDSA over Baby JubJub, verified with `S·B = R8 + 8·h·A` where
/// `h = H5(R8x, R8y, Ax, Ay, M)`, the circomlib `EdDSAPoseidonVerifier`
/// equation.
#[derive(Clone, Copy, Debug, Default)]
pub struct EddsaPoseidon;

impl EddsaPoseidon {
    fn challenge(r8: &EdwardsAffine, public_key: &PublicKey, message: &FieldElement) -> Scalar {
        let h = Hasher::hash5(&[
            FieldElement(r8.x),
            FieldElement(r8.y),
            public_key.x,
            public_key.y,
            *message,
        ]);
        Scalar::from_le_bytes_mod_order(&h.0.into_bigint().to_bytes_le())
    }

    fn decode_point(x: &FieldElement, y: &FieldElement) -> Option<EdwardsAffine> {
        let point = EdwardsAffine::new_unchecked(x.0, y.0);
        (point.is_on_curve() && point.is_in_correct_subgroup_assuming_on_curve() && !point.is_zero())
            .then_some(point)
    }
}

impl SignatureScheme for EddsaPoseidon {
    fn public_key(&self, key: &PrivateKey) -> PublicKey {
        let point = (EdwardsAffine::generator() * key.scalar()).into_affine();
        PublicKey::new(FieldElement(point.x), FieldElement(point.y))
    }

    fn sign(&self, key: &PrivateKey, message: &FieldElement) -> Signature {
        let secret = key.scalar();
        let public_key = self.public_key(key);

        let nonce_digest = Sha256::new()
            .chain_update(b"rollup-eddsa-nonce")
            .chain_update(key.0)
            .chain_update(message.to_be_bytes())
            .finalize();
        let r = Scalar::from_le_bytes_mod_order(nonce_digest.as_slice());
        let r8 = (EdwardsAffine::generator() * r).into_affine();

        let h = Self::challenge(&r8, &public_key, message);
        let s = r + Scalar::from(8u64) * h * secret;

        Signature {
            r8x: FieldElement(r8.x),
            r8y: FieldElement(r8.y),
            s: FieldElement::from_be_bytes_mod_order(&s.into_bigint().to_bytes_be()),
        }
    }

    fn verify(&self, message: &FieldElement, signature: &Signature, public_key: &PublicKey) -> bool {
        let Some(a) = Self::decode_point(&public_key.x, &public_key.y) else {
            return false;
        };
        let Some(r8) = Self::decode_point(&signature.r8x, &signature.r8y) else {
            return false;
        };
        // S must be a canonical scalar
        let Some(s) = Scalar::from_bigint(signature.s.0.into_bigint()) else {
            return false;
        };

        let h = Self::challenge(&r8, public_key, message);
        let lhs = EdwardsAffine::generator() * s;
        let rhs = r8.into_group() + a * (Scalar::from(8u64) * h);
        lhs == rhs
    }
}
