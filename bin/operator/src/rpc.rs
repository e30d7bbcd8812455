//! JSON-RPC surface of the operator

use std::sync::Arc;

use axum::{extract::State as AxumState, Json};
use rollup_core::{
    Amount, FieldElement, MerkleProof, PublicKey, Rollup, TokenType, Transaction, WithdrawalRequest,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;

/// Engine shared between request handlers. Reads take the read lock,
/// batches hold the write lock until they commit or fail.
pub type SharedState = Arc<RwLock<Rollup>>;

/// JSON-RPC request
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    #[allow(dead_code)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    id: Value,
}

/// JSON-RPC response
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    jsonrpc: String,
    result: Value,
    id: Value,
}

#[derive(Deserialize)]
struct DepositParams {
    pubkey: PublicKey,
    #[serde(with = "rollup_core::decimal_amount")]
    amount: Amount,
    token_type: TokenType,
}

#[derive(Deserialize)]
struct ProcessDepositsParams {
    subtree_depth: usize,
    /// Slot to merge into; the lowest free slot when omitted
    #[serde(default)]
    slot: Option<MerkleProof>,
}

#[derive(Deserialize)]
struct ApplyBatchParams {
    txs: Vec<Transaction>,
    #[serde(default)]
    expected_root: Option<FieldElement>,
}

#[derive(Deserialize)]
struct VoidQuery {
    tx_hash: FieldElement,
    proof: MerkleProof,
}

/// RPC handler
pub async fn rpc_handler(
    AxumState(state): AxumState<SharedState>,
    Json(req): Json<RpcRequest>,
) -> Json<RpcResponse> {
    debug!(method = %req.method, "rpc request");
    let result = match dispatch(&state, &req.method, req.params).await {
        Ok(value) => value,
        Err(error) => json!({ "success": false, "error": error }),
    };

    Json(RpcResponse {
        jsonrpc: "2.0".to_string(),
        result,
        id: req.id,
    })
}

/// Health check endpoint
pub async fn health() -> &'static str {
    "ok"
}

async fn dispatch(state: &SharedState, method: &str, params: Option<Value>) -> Result<Value, String> {
    match method {
        "rollup_currentRoot" => to_json(state.read().await.current_root()),
        "rollup_proofPath" => {
            let index: u64 = first_param(params)?;
            let proof = state.read().await.proof_path(index).map_err(|e| e.to_string())?;
            to_json(proof)
        }
        "rollup_getAccount" => {
            let index: u64 = first_param(params)?;
            to_json(state.read().await.account(index))
        }
        "rollup_getAccounts" => {
            let rollup = state.read().await;
            to_json(rollup.accounts().collect::<Vec<_>>())
        }
        "rollup_isVoided" => {
            let query: VoidQuery = first_param(params)?;
            to_json(state.read().await.is_voided(&query.tx_hash, &query.proof))
        }
        "rollup_committedTxRoots" => to_json(state.read().await.committed_tx_roots()),
        "rollup_deposit" => {
            let deposit: DepositParams = first_param(params)?;
            let pending = state
                .write()
                .await
                .deposit(deposit.pubkey, deposit.amount, deposit.token_type);
            Ok(json!({ "success": true, "pending": pending }))
        }
        "rollup_pendingDeposits" => {
            let rollup = state.read().await;
            let count = rollup.pending_deposits();
            // Root of the largest full batch the queue can form
            let root = count
                .checked_ilog2()
                .and_then(|k| rollup.pending_deposits_root(k as usize).ok());
            Ok(json!({ "count": count, "root": root }))
        }
        "rollup_nextFreeSubtree" => {
            let subtree_depth: usize = first_param(params)?;
            let slot = state
                .read()
                .await
                .next_free_subtree(subtree_depth)
                .map_err(|e| e.to_string())?;
            to_json(slot)
        }
        "rollup_processDeposits" => {
            let req: ProcessDepositsParams = first_param(params)?;
            let mut rollup = state.write().await;
            let slot = match req.slot {
                Some(slot) => slot,
                None => rollup.next_free_subtree(req.subtree_depth).map_err(|e| e.to_string())?,
            };
            let outcome = rollup
                .apply_deposit_batch(req.subtree_depth, &slot.positions, &slot.siblings)
                .map_err(|e| e.to_string())?;
            to_json(outcome)
        }
        "rollup_applyBatch" => {
            let req: ApplyBatchParams = first_param(params)?;
            let transition = state
                .write()
                .await
                .apply_transaction_batch(req.txs, req.expected_root)
                .map_err(|e| e.to_string())?;
            Ok(json!({
                "success": true,
                "prevRoot": transition.prev_root,
                "newRoot": transition.new_root,
                "txRoot": transition.tx_root(),
                "witness": to_json(transition.witness())?,
            }))
        }
        "rollup_withdraw" => {
            let request: WithdrawalRequest = first_param(params)?;
            let receipt = state
                .write()
                .await
                .process_withdrawal(&request)
                .map_err(|e| e.to_string())?;
            to_json(receipt)
        }
        _ => Err(format!("unknown method {method}")),
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

/// First positional parameter, or the params value itself when it is not an array
fn first_param<T: DeserializeOwned>(params: Option<Value>) -> Result<T, String> {
    let value = match params {
        Some(Value::Array(mut arr)) if !arr.is_empty() => arr.swap_remove(0),
        Some(Value::Array(_)) | None => return Err("missing params".to_string()),
        Some(value) => value,
    };
    serde_json::from_value(value).map_err(|e| format!("invalid params: {e}"))
}

#[cfg(test)]
mod tests {
    use rollup_core::{EddsaPoseidon, PrivateKey, RollupConfig, SignatureScheme};

    use super::*;

    fn shared(tree_depth: usize, tx_batch_depth: usize) -> SharedState {
        let config = RollupConfig {
            tree_depth,
            tx_batch_depth,
            ..RollupConfig::default()
        };
        Arc::new(RwLock::new(Rollup::new(config).unwrap()))
    }

    #[tokio::test]
    async fn test_deposit_merge_and_batch_over_rpc() {
        let state = shared(3, 0);
        let scheme = EddsaPoseidon;
        let alice = PrivateKey::from_bytes([21; 32]);
        let alice_pk = scheme.public_key(&alice);

        let zero = json!([{ "pubkey": PublicKey::zero(), "amount": 0, "token_type": 0 }]);
        dispatch(&state, "rollup_deposit", Some(zero)).await.unwrap();
        let funded = json!([{ "pubkey": alice_pk, "amount": 50, "token_type": 1 }]);
        let pending = dispatch(&state, "rollup_deposit", Some(funded)).await.unwrap();
        assert_eq!(pending["pending"], 2);

        let queued = dispatch(&state, "rollup_pendingDeposits", None).await.unwrap();
        assert_eq!(queued["count"], 2);
        assert!(queued["root"].is_string());

        let merged = dispatch(&state, "rollup_processDeposits", Some(json!({ "subtree_depth": 1 })))
            .await
            .unwrap();
        let root = dispatch(&state, "rollup_currentRoot", None).await.unwrap();
        assert_eq!(merged["new_root"], root);

        let account = dispatch(&state, "rollup_getAccount", Some(json!([1]))).await.unwrap();
        assert_eq!(account["balance"], "50");

        let tx = Transaction::withdrawal(alice_pk, 1, 0, 0, 20, 1).signed(&scheme, &alice);
        let applied = dispatch(&state, "rollup_applyBatch", Some(json!([{ "txs": [tx] }])))
            .await
            .unwrap();
        assert_eq!(applied["success"], true);
        assert_eq!(applied["witness"]["amount"][0], "20");

        let roots = dispatch(&state, "rollup_committedTxRoots", None).await.unwrap();
        assert_eq!(roots[0], applied["txRoot"]);
    }

    #[tokio::test]
    async fn test_balances_beyond_u64_are_served() {
        let state = shared(2, 0);
        let big = u128::from(u64::MAX) + 1;
        let holder = EddsaPoseidon.public_key(&PrivateKey::from_bytes([22; 32]));

        let zero = json!([{ "pubkey": PublicKey::zero(), "amount": 0, "token_type": 0 }]);
        dispatch(&state, "rollup_deposit", Some(zero)).await.unwrap();
        let deposit = json!([{ "pubkey": holder, "amount": big.to_string(), "token_type": 1 }]);
        dispatch(&state, "rollup_deposit", Some(deposit)).await.unwrap();
        dispatch(&state, "rollup_processDeposits", Some(json!({ "subtree_depth": 1 })))
            .await
            .unwrap();

        let account = dispatch(&state, "rollup_getAccount", Some(json!([1]))).await.unwrap();
        assert_eq!(account["balance"], "18446744073709551616");
        let accounts = dispatch(&state, "rollup_getAccounts", None).await.unwrap();
        assert_eq!(accounts[1]["balance"], "18446744073709551616");
    }

    #[tokio::test]
    async fn test_errors_are_reported_in_result() {
        let state = shared(3, 0);
        assert!(dispatch(&state, "rollup_unknown", None).await.is_err());
        assert!(dispatch(&state, "rollup_proofPath", None).await.is_err());

        let err = dispatch(&state, "rollup_processDeposits", Some(json!({ "subtree_depth": 1 })))
            .await
            .unwrap_err();
        assert!(err.contains("pending deposits"));

        let response = rpc_handler(
            AxumState(state),
            Json(RpcRequest {
                jsonrpc: "2.0".to_string(),
                method: "rollup_proofPath".to_string(),
                params: Some(json!([99])),
                id: json!(7),
            }),
        )
        .await;
        assert_eq!(response.0.result["success"], false);
        assert_eq!(response.0.id, 7);
    }
}
