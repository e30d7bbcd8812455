//! Prover input assembly

use rollup_smt::FieldElement;
use serde::{Deserialize, Serialize};

use crate::transition::StateTransition;

/// Circuit input for one batch, field names as the circuit expects them.
///
/// Per-transaction vectors are indexed in batch order. Scalars serialize as
/// decimal strings and path positions as arrays of 0/1.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessBundle {
    pub tx_root: FieldElement,
    pub paths2tx_root: Vec<Vec<FieldElement>>,
    pub paths2tx_root_pos: Vec<Vec<u8>>,
    pub current_state: FieldElement,
    pub intermediate_roots: Vec<FieldElement>,
    pub paths2_root_from: Vec<Vec<FieldElement>>,
    pub paths2root_from_pos: Vec<Vec<u8>>,
    pub paths2_root_to: Vec<Vec<FieldElement>>,
    pub paths2root_to_pos: Vec<Vec<u8>>,
    pub from_x: Vec<FieldElement>,
    pub from_y: Vec<FieldElement>,
    pub from_index: Vec<FieldElement>,
    pub to_x: Vec<FieldElement>,
    pub to_y: Vec<FieldElement>,
    pub nonce_from: Vec<FieldElement>,
    pub amount: Vec<FieldElement>,
    pub token_type_from: Vec<FieldElement>,
    #[serde(rename = "R8x")]
    pub r8x: Vec<FieldElement>,
    #[serde(rename = "R8y")]
    pub r8y: Vec<FieldElement>,
    #[serde(rename = "S")]
    pub s: Vec<FieldElement>,
    pub token_balance_from: Vec<FieldElement>,
    pub token_balance_to: Vec<FieldElement>,
    pub nonce_to: Vec<FieldElement>,
    pub token_type_to: Vec<FieldElement>,
}

impl WitnessBundle {
    /// Lay out `transition` in circuit order
    pub fn from_transition(transition: &StateTransition) -> Self {
        let mut witness = Self {
            tx_root: transition.tx_root(),
            current_state: transition.prev_root,
            intermediate_roots: transition.intermediate_roots.clone(),
            ..Self::default()
        };

        for proof in &transition.tx_proofs {
            witness.paths2tx_root.push(proof.siblings.clone());
            witness.paths2tx_root_pos.push(proof.positions.clone());
        }

        for (tx, delta) in transition.tx_tree.txs().iter().zip(&transition.deltas) {
            let signature = tx.signature.unwrap_or_default();

            witness.paths2_root_from.push(delta.sender_proof.siblings.clone());
            witness.paths2root_from_pos.push(delta.sender_proof.positions.clone());
            witness.paths2_root_to.push(delta.receiver_proof.siblings.clone());
            witness.paths2root_to_pos.push(delta.receiver_proof.positions.clone());

            witness.from_x.push(tx.from.x);
            witness.from_y.push(tx.from.y);
            witness.from_index.push(FieldElement::from(tx.from_index));
            witness.to_x.push(tx.to.x);
            witness.to_y.push(tx.to.y);
            witness.nonce_from.push(FieldElement::from(tx.nonce));
            witness.amount.push(FieldElement::from(tx.amount));
            witness.token_type_from.push(FieldElement::from(tx.token_type));
            witness.r8x.push(signature.r8x);
            witness.r8y.push(signature.r8y);
            witness.s.push(signature.s);

            witness.token_balance_from.push(FieldElement::from(delta.balance_from));
            witness.token_balance_to.push(FieldElement::from(delta.balance_to));
            witness.nonce_to.push(FieldElement::from(delta.nonce_to));
            witness.token_type_to.push(FieldElement::from(delta.token_type_to));
        }

        witness
    }

    /// Number of transactions covered
    pub fn len(&self) -> usize {
        self.from_x.len()
    }

    /// Whether the bundle covers no transactions
    pub fn is_empty(&self) -> bool {
        self.from_x.is_empty()
    }

    /// Pretty JSON, the format the proving toolchain reads
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
