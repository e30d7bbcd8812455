//! Poseidon hash oracle for tree nodes and leaves

use std::fmt::Debug;

use ark_bn254::Fr;
use light_poseidon::{Poseidon, PoseidonHasher as _};

use crate::{FieldElement, SmtError};

/// Hash oracle over the scalar field.
///
/// Only the arities the on-chain verifier deploys are available: 2 for tree
/// nodes, 4 for transaction sub-leaves and 5 for account leaves.
pub trait FieldHasher: Clone + Copy + Debug + Default + Send + Sync + 'static {
    /// `H2(left, right)`
    fn hash2(left: &FieldElement, right: &FieldElement) -> FieldElement;

    /// `H4(a, b, c, d)`
    fn hash4(inputs: &[FieldElement; 4]) -> FieldElement;

    /// `H5(a, b, c, d, e)`
    fn hash5(inputs: &[FieldElement; 5]) -> FieldElement;

    /// Dispatch on input length. Any arity other than 2, 4 or 5 is a
    /// protocol error, never padded.
    fn hash(inputs: &[FieldElement]) -> Result<FieldElement, SmtError> {
        match inputs {
            [a, b] => Ok(Self::hash2(a, b)),
            [a, b, c, d] => Ok(Self::hash4(&[*a, *b, *c, *d])),
            [a, b, c, d, e] => Ok(Self::hash5(&[*a, *b, *c, *d, *e])),
            _ => Err(SmtError::UnsupportedArity(inputs.len())),
        }
    }
}

/// Circom-compatible Poseidon over BN254, identical to circomlib's
/// `poseidon` and the generated `PoseidonT3`/`T5`/`T6` contracts.
#[derive(Debug, Default, Clone, Copy)]
pub struct CircomPoseidon;

impl CircomPoseidon {
    fn poseidon(inputs: &[Fr]) -> FieldElement {
        let mut hasher = Poseidon::<Fr>::new_circom(inputs.len())
            .expect("circom parameters exist for 2, 4 and 5 inputs");
        let hash = hasher
            .hash(inputs)
            .expect("input count matches the hasher width");
        FieldElement(hash)
    }
}

impl FieldHasher for CircomPoseidon {
    fn hash2(left: &FieldElement, right: &FieldElement) -> FieldElement {
        Self::poseidon(&[left.0, right.0])
    }

    fn hash4(inputs: &[FieldElement; 4]) -> FieldElement {
        Self::poseidon(&inputs.map(|fe| fe.0))
    }

    fn hash5(inputs: &[FieldElement; 5]) -> FieldElement {
        Self::poseidon(&inputs.map(|fe| fe.0))
    }
}
