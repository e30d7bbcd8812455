//! Operator-side engine

use rollup_smt::{FieldElement, MerkleProof};
use tracing::{info, warn};

use crate::account::AccountLeaf;
use crate::deposit::{BatchDepositMerger, DepositQueue, MergeOutcome};
use crate::error::{Result, RollupError};
use crate::signature::{EddsaPoseidon, PublicKey, SignatureScheme};
use crate::state::State;
use crate::transition::{StateTransition, StateTransitionBuilder};
use crate::tx::{withdrawal_message, Transaction};
use crate::tx_tree::verify_membership;
use crate::types::{AccountIndex, Amount, Hasher, RollupConfig, TokenType};
use crate::withdraw::{WithdrawalReceipt, WithdrawalRequest, WithdrawalVoidTracker};

/// Account state, pending deposits, committed batches and consumed
/// withdrawals of one rollup.
///
/// Mutating entry points take `&mut self` and either commit a whole batch
/// or return an error with nothing changed.
#[derive(Debug)]
pub struct Rollup<S: SignatureScheme = EddsaPoseidon> {
    config: RollupConfig,
    state: State,
    deposits: DepositQueue,
    voids: WithdrawalVoidTracker,
    committed_tx_roots: Vec<FieldElement>,
    scheme: S,
}

impl Rollup<EddsaPoseidon> {
    /// Empty rollup with the default signature scheme
    pub fn new(config: RollupConfig) -> Result<Self> {
        Self::with_scheme(config, EddsaPoseidon)
    }
}

impl<S: SignatureScheme> Rollup<S> {
    /// Empty rollup verifying signatures with `scheme`
    pub fn with_scheme(config: RollupConfig, scheme: S) -> Result<Self> {
        let state = State::new(config.tree_depth)?;
        info!(
            depth = config.tree_depth,
            tx_batch_depth = config.tx_batch_depth,
            root = %state.root(),
            "rollup initialised"
        );
        Ok(Self {
            config,
            state,
            deposits: DepositQueue::new(),
            voids: WithdrawalVoidTracker::new(),
            committed_tx_roots: Vec::new(),
            scheme,
        })
    }

    /// Engine configuration
    pub const fn config(&self) -> &RollupConfig {
        &self.config
    }

    /// Signature scheme in use
    pub const fn scheme(&self) -> &S {
        &self.scheme
    }

    /// Current account tree root
    pub fn current_root(&self) -> FieldElement {
        self.state.root()
    }

    /// Inclusion path of the leaf at `index` under the current root
    pub fn proof_path(&self, index: AccountIndex) -> Result<MerkleProof> {
        self.state.proof(index)
    }

    /// Registered account at `index`
    pub fn account(&self, index: AccountIndex) -> Option<&AccountLeaf> {
        self.state.account(index)
    }

    /// All registered accounts in index order
    pub fn accounts(&self) -> impl Iterator<Item = &AccountLeaf> {
        self.state.accounts()
    }

    /// Committed state
    pub const fn state(&self) -> &State {
        &self.state
    }

    /// Whether the withdrawal claim `(tx_hash, proof)` was consumed
    pub fn is_voided(&self, tx_hash: &FieldElement, proof: &MerkleProof) -> bool {
        self.voids.is_voided(tx_hash, proof)
    }

    /// Transaction roots of every accepted batch, oldest first
    pub fn committed_tx_roots(&self) -> &[FieldElement] {
        &self.committed_tx_roots
    }

    /// Queue a deposit. Returns the number of pending deposits.
    pub fn deposit(&mut self, pubkey: PublicKey, amount: Amount, token_type: TokenType) -> usize {
        self.deposits.deposit(pubkey, amount, token_type)
    }

    /// Queue the reserved accounts ahead of any user deposit: the zero-address
    /// account, then the coordinator. They take the first two leaves of
    /// whichever slot the first batch is merged into, which is indices 0 and
    /// 1 when that batch goes to [`Rollup::next_free_subtree`].
    pub fn genesis_deposits(&mut self, coordinator: PublicKey) -> Result<usize> {
        if !self.deposits.is_empty() || self.state.accounts().next().is_some() {
            return Err(RollupError::MalformedInput(
                "genesis deposits must come first".to_string(),
            ));
        }
        self.deposits.deposit(PublicKey::zero(), 0, 0);
        Ok(self.deposits.deposit(coordinator, 0, 0))
    }

    /// Number of deposits waiting to be merged
    pub fn pending_deposits(&self) -> usize {
        self.deposits.len()
    }

    /// Root of the next `2^subtree_depth` pending deposits
    pub fn pending_deposits_root(&self, subtree_depth: usize) -> Result<FieldElement> {
        self.deposits.pending_root(subtree_depth)
    }

    /// Lowest empty aligned slot for a `2^subtree_depth` batch, as the
    /// `(positions, siblings)` pair [`Rollup::apply_deposit_batch`] takes
    pub fn next_free_subtree(&self, subtree_depth: usize) -> Result<MerkleProof> {
        let tree = self.state.tree();
        if subtree_depth > tree.depth() {
            return Err(RollupError::MalformedInput(format!(
                "deposit subtree depth {subtree_depth} exceeds tree depth {}",
                tree.depth()
            )));
        }
        let index = tree.first_empty_subtree(subtree_depth).ok_or_else(|| {
            RollupError::MalformedInput(format!("no empty subtree left at level {subtree_depth}"))
        })?;
        Ok(tree.subtree_proof(subtree_depth, index)?)
    }

    /// Merge the next `2^subtree_depth` pending deposits at the slot given by
    /// `position`, proven empty by `proof`
    pub fn apply_deposit_batch(
        &mut self,
        subtree_depth: usize,
        position: &[u8],
        proof: &[FieldElement],
    ) -> Result<MergeOutcome> {
        let batch = self.deposits.peek_batch(subtree_depth)?;
        let outcome = BatchDepositMerger::merge(&mut self.state, &batch, position, proof)
            .inspect_err(|err| warn!(%err, "deposit batch rejected"))?;
        self.deposits.take_batch(subtree_depth)?;
        Ok(outcome)
    }

    /// Apply a batch of signed transactions.
    ///
    /// When `expected_root` is given the computed post-state root must match
    /// it. On success the batch's transaction root becomes claimable for
    /// withdrawals.
    pub fn apply_transaction_batch(
        &mut self,
        txs: Vec<Transaction>,
        expected_root: Option<FieldElement>,
    ) -> Result<StateTransition> {
        let (post, transition) = self.build_transition(txs, expected_root).inspect_err(|err| {
            warn!(%err, "transaction batch rejected");
        })?;

        self.state = post;
        self.committed_tx_roots.push(transition.tx_root());
        info!(
            batch = self.committed_tx_roots.len(),
            tx_root = %transition.tx_root(),
            root = %transition.new_root,
            "transaction batch committed"
        );
        Ok(transition)
    }

    fn build_transition(
        &self,
        txs: Vec<Transaction>,
        expected_root: Option<FieldElement>,
    ) -> Result<(State, StateTransition)> {
        let builder = StateTransitionBuilder::new(&self.scheme, self.config.tx_batch_depth)
            .receiver_policy(self.config.receiver_policy);
        let (post, transition) = builder.build(&self.state, txs)?;

        if let Some(expected) = expected_root {
            if expected != transition.new_root {
                return Err(RollupError::RootMismatch {
                    expected,
                    actual: transition.new_root,
                });
            }
        }
        transition.verify()?;
        Ok((post, transition))
    }

    /// Release a withdrawal included in a committed batch. Each
    /// `(transaction, proof)` claim is accepted once.
    pub fn process_withdrawal(&mut self, request: &WithdrawalRequest) -> Result<WithdrawalReceipt> {
        let tx = &request.tx;
        if !tx.is_withdrawal() {
            return Err(RollupError::NotAWithdrawal);
        }
        if !self.committed_tx_roots.contains(&request.tx_root) {
            return Err(RollupError::UnknownTxRoot(request.tx_root));
        }

        let tx_hash = tx.hash();
        if !verify_membership(&tx_hash, &request.proof, &request.tx_root) {
            return Err(RollupError::RootMismatch {
                expected: request.tx_root,
                actual: request.proof.compute_root::<Hasher>(&tx_hash)?,
            });
        }

        let message = withdrawal_message(tx.nonce, &request.recipient);
        if !self.scheme.verify(&message, &request.signature, &tx.from) {
            return Err(RollupError::SignatureInvalid { index: tx.from_index });
        }

        let key = self.voids.mark_voided(&tx_hash, &request.proof)?;
        info!(
            from = tx.from_index,
            amount = %tx.amount,
            recipient = %request.recipient,
            "withdrawal released"
        );
        Ok(WithdrawalReceipt {
            tx_hash,
            void_key: hex::encode(key),
            recipient: request.recipient,
            amount: tx.amount,
            token_type: tx.token_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::PrivateKey;

    fn config(depth: usize) -> RollupConfig {
        RollupConfig {
            tree_depth: depth,
            tx_batch_depth: 0,
            ..RollupConfig::default()
        }
    }

    #[test]
    fn test_genesis_and_first_merge() {
        let mut rollup = Rollup::new(config(3)).unwrap();
        let empty_root = rollup.current_root();
        let coordinator = rollup.scheme().public_key(&PrivateKey::from_bytes([1; 32]));

        assert_eq!(rollup.genesis_deposits(coordinator).unwrap(), 2);
        let slot = rollup.next_free_subtree(1).unwrap();
        assert_eq!(slot.positions, vec![0, 0]);

        let outcome = rollup.apply_deposit_batch(1, &slot.positions, &slot.siblings).unwrap();
        assert_eq!(outcome.prev_root, empty_root);
        assert_eq!(outcome.new_root, rollup.current_root());
        assert_eq!(rollup.pending_deposits(), 0);
        assert_eq!(rollup.account(1).unwrap().pubkey, coordinator);
        assert!(rollup.genesis_deposits(coordinator).is_err());

        assert_eq!(rollup.next_free_subtree(1).unwrap().positions, vec![1, 0]);
    }

    #[test]
    fn test_failed_merge_keeps_queue() {
        let mut rollup = Rollup::new(config(3)).unwrap();
        rollup.deposit(PublicKey::zero(), 0, 0);
        rollup.deposit(PublicKey::zero(), 0, 0);
        let slot = rollup.next_free_subtree(1).unwrap();

        assert!(rollup.apply_deposit_batch(1, &slot.positions[..1], &slot.siblings[..1]).is_err());
        assert_eq!(rollup.pending_deposits(), 2);
        assert!(rollup.apply_deposit_batch(2, &[0], &[FieldElement::zero()]).is_err());
        assert_eq!(rollup.pending_deposits(), 2);
    }

    #[test]
    fn test_expected_root_mismatch_leaves_state() {
        let scheme = EddsaPoseidon;
        let alice = PrivateKey::from_bytes([6; 32]);
        let mut rollup = Rollup::new(config(2)).unwrap();
        rollup.deposit(PublicKey::zero(), 0, 0);
        rollup.deposit(scheme.public_key(&alice), 40, 1);
        let slot = rollup.next_free_subtree(1).unwrap();
        rollup.apply_deposit_batch(1, &slot.positions, &slot.siblings).unwrap();
        let before = rollup.current_root();

        let tx = Transaction::withdrawal(scheme.public_key(&alice), 1, 0, 0, 15, 1).signed(&scheme, &alice);
        let err = rollup
            .apply_transaction_batch(vec![tx.clone()], Some(FieldElement::from(3u64)))
            .unwrap_err();
        assert!(matches!(err, RollupError::RootMismatch { .. }));
        assert_eq!(rollup.current_root(), before);
        assert!(rollup.committed_tx_roots().is_empty());

        let transition = rollup.apply_transaction_batch(vec![tx], None).unwrap();
        assert_eq!(rollup.committed_tx_roots(), &[transition.tx_root()]);
        assert_eq!(rollup.account(1).unwrap().balance, 25);
    }

    #[test]
    fn test_zero_key_leaf_does_not_block_merge() {
        let scheme = EddsaPoseidon;
        let alice = PrivateKey::from_bytes([6; 32]);
        let mut rollup = Rollup::new(config(2)).unwrap();
        rollup.deposit(PublicKey::zero(), 0, 0);
        rollup.deposit(scheme.public_key(&alice), 40, 1);
        let slot = rollup.next_free_subtree(1).unwrap();
        rollup.apply_deposit_batch(1, &slot.positions, &slot.siblings).unwrap();

        // Withdrawals never register the index they point at.
        let stray = Transaction::withdrawal(scheme.public_key(&alice), 1, 3, 0, 15, 1).signed(&scheme, &alice);
        assert_eq!(
            rollup.apply_transaction_batch(vec![stray], None).unwrap_err(),
            RollupError::UnknownAccount { index: 3 }
        );
        assert!(rollup.account(3).is_none());

        // A zero-key account hashes to the empty leaf, so its slot stays free.
        rollup.deposit(PublicKey::zero(), 0, 0);
        let leaf = rollup.state().tree().subtree_proof(0, 2).unwrap();
        rollup.apply_deposit_batch(0, &leaf.positions, &leaf.siblings).unwrap();
        assert!(rollup.account(2).is_some());

        let free = rollup.next_free_subtree(1).unwrap();
        assert_eq!(free.positions, vec![1]);
        rollup.deposit(scheme.public_key(&PrivateKey::from_bytes([7; 32])), 5, 1);
        rollup.deposit(scheme.public_key(&PrivateKey::from_bytes([8; 32])), 5, 1);
        let outcome = rollup.apply_deposit_batch(1, &free.positions, &free.siblings).unwrap();
        assert_eq!(outcome.first_index, 2);
        assert_eq!(rollup.account(3).unwrap().balance, 5);
    }

    #[test]
    fn test_withdrawal_guards() {
        let scheme = EddsaPoseidon;
        let alice = PrivateKey::from_bytes([6; 32]);
        let mut rollup = Rollup::new(config(2)).unwrap();
        rollup.deposit(PublicKey::zero(), 0, 0);
        rollup.deposit(scheme.public_key(&alice), 40, 1);
        let slot = rollup.next_free_subtree(1).unwrap();
        rollup.apply_deposit_batch(1, &slot.positions, &slot.siblings).unwrap();

        let tx = Transaction::withdrawal(scheme.public_key(&alice), 1, 0, 0, 15, 1).signed(&scheme, &alice);
        let recipient = FieldElement::from(0xc0ffee_u64);
        let signature = scheme.sign(&alice, &withdrawal_message(0, &recipient));
        let mut request = WithdrawalRequest {
            tx: tx.clone(),
            tx_root: tx.hash(),
            proof: MerkleProof::default(),
            recipient,
            signature,
        };
        assert_eq!(
            rollup.process_withdrawal(&request),
            Err(RollupError::UnknownTxRoot(tx.hash()))
        );

        let transition = rollup.apply_transaction_batch(vec![tx], None).unwrap();
        request.tx_root = transition.tx_root();

        let mut not_withdrawal = request.clone();
        not_withdrawal.tx.to = PublicKey::new(FieldElement::from(1u64), FieldElement::from(1u64));
        assert_eq!(rollup.process_withdrawal(&not_withdrawal), Err(RollupError::NotAWithdrawal));

        let mut wrong_recipient = request.clone();
        wrong_recipient.recipient = FieldElement::from(1u64);
        assert_eq!(
            rollup.process_withdrawal(&wrong_recipient),
            Err(RollupError::SignatureInvalid { index: 1 })
        );

        let receipt = rollup.process_withdrawal(&request).unwrap();
        assert_eq!(receipt.amount, 15);
        assert!(rollup.is_voided(&receipt.tx_hash, &request.proof));
        assert!(matches!(
            rollup.process_withdrawal(&request),
            Err(RollupError::AlreadyVoided(_))
        ));
    }
}
