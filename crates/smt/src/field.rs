//! BN254 scalar-field element

use std::{fmt, str::FromStr};

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField, Zero};
use num_bigint::BigUint;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Element of the BN254 scalar field, the field every hash, key and
/// balance in the rollup lives in.
///
/// Serialises as a decimal string, the convention circuit witness files use
/// for big integers.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldElement(pub Fr);

/// Failure to parse a [`FieldElement`] from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFieldError {
    /// Not a decimal (or `0x`-prefixed hex) integer
    #[error("invalid integer literal {0:?}")]
    InvalidLiteral(String),
    /// Integer is not smaller than the field modulus
    #[error("value {0} is not below the field modulus")]
    NotCanonical(String),
}

impl FieldElement {
    /// The additive identity
    pub fn zero() -> Self {
        Self(Fr::zero())
    }

    /// Whether this is the additive identity
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The underlying arkworks element
    pub const fn inner(&self) -> Fr {
        self.0
    }

    /// Big-endian 32-byte encoding, the layout the on-chain contracts use
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let bytes = self.0.into_bigint().to_bytes_be();
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        out
    }

    /// Interpret bytes as a big-endian integer reduced modulo the field order
    pub fn from_be_bytes_mod_order(bytes: &[u8]) -> Self {
        Self(Fr::from_be_bytes_mod_order(bytes))
    }

    /// The canonical integer representative
    pub fn to_biguint(&self) -> BigUint {
        self.0.into_bigint().into()
    }

    /// Parse an integer that must already be canonical (below the modulus)
    pub fn from_biguint(value: &BigUint) -> Result<Self, ParseFieldError> {
        let modulus: BigUint = Fr::MODULUS.into();
        if *value >= modulus {
            return Err(ParseFieldError::NotCanonical(value.to_string()));
        }
        Ok(Self(Fr::from(value.clone())))
    }
}

impl From<Fr> for FieldElement {
    fn from(value: Fr) -> Self {
        Self(value)
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self(Fr::from(value))
    }
}

impl From<u128> for FieldElement {
    fn from(value: u128) -> Self {
        Self(Fr::from(value))
    }
}

impl From<u32> for FieldElement {
    fn from(value: u32) -> Self {
        Self(Fr::from(u64::from(value)))
    }
}

impl FromStr for FieldElement {
    type Err = ParseFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed.strip_prefix("0x") {
            Some(hex) => BigUint::parse_bytes(hex.as_bytes(), 16),
            None => BigUint::parse_bytes(trimmed.as_bytes(), 10),
        };
        let value = parsed.ok_or_else(|| ParseFieldError::InvalidLiteral(s.to_string()))?;
        Self::from_biguint(&value)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_biguint())
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.to_biguint())
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldVisitor;

        impl de::Visitor<'_> for FieldVisitor {
            type Value = FieldElement;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string or unsigned integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(FieldElement::from(v))
            }
        }

        deserializer.deserialize_any(FieldVisitor)
    }
}
