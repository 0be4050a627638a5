//! Aptos fullnode REST client
//!
//! Implements [`ChainClient`] over the node's `/v1` JSON API. Transactions are
//! BCS-encoded by the node (`encode_submission`) and signed locally, so no
//! BCS implementation is needed here.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ChainConfig;
use crate::error::{AptoError, Result};
use crate::wallet::SigningIdentity;

use super::{
    AccountAddress, ChainClient, ChainError, ChainResult, FeeEstimate, GasPrice, TransactionInfo,
    TransferReceipt,
};

/// Entry function used for APT transfers; creates the recipient account when
/// it does not exist yet.
const TRANSFER_FUNCTION: &str = "0x1::aptos_account::transfer";
const BALANCE_FUNCTION: &str = "0x1::coin::balance";
const APT_COIN_TYPE: &str = "0x1::aptos_coin::AptosCoin";

/// Seconds a signed transaction stays valid for.
const EXPIRATION_SECS: i64 = 60;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// Node API types
// ============================================================================

#[derive(Debug, Serialize, Clone)]
struct EntryFunctionPayload {
    r#type: &'static str,
    function: &'static str,
    type_arguments: Vec<String>,
    arguments: Vec<Value>,
}

/// Unsigned transaction in the node's JSON form.
#[derive(Debug, Serialize, Clone)]
struct RawTransaction {
    sender: String,
    sequence_number: String,
    max_gas_amount: String,
    gas_unit_price: String,
    expiration_timestamp_secs: String,
    payload: EntryFunctionPayload,
}

#[derive(Debug, Serialize)]
struct Ed25519Signature {
    r#type: &'static str,
    public_key: String,
    signature: String,
}

#[derive(Debug, Serialize)]
struct SignedTransaction<'a> {
    #[serde(flatten)]
    raw: &'a RawTransaction,
    signature: Ed25519Signature,
}

#[derive(Debug, Deserialize)]
struct AccountResource {
    sequence_number: String,
}

#[derive(Debug, Deserialize)]
struct GasEstimateResponse {
    gas_estimate: u64,
    #[serde(default)]
    deprioritized_gas_estimate: Option<u64>,
    #[serde(default)]
    prioritized_gas_estimate: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PendingTransaction {
    hash: String,
}

/// The subset of a transaction object this client reads.
#[derive(Debug, Deserialize)]
struct TransactionView {
    r#type: String,
    hash: String,
    #[serde(default)]
    sender: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    vm_status: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    gas_used: Option<String>,
    #[serde(default)]
    gas_unit_price: Option<String>,
}

impl TransactionView {
    fn is_pending(&self) -> bool {
        self.r#type == "pending_transaction"
    }

    fn into_info(self) -> TransactionInfo {
        TransactionInfo {
            pending: self.is_pending(),
            hash: self.hash,
            success: self.success,
            vm_status: self.vm_status,
            sender: self.sender,
            version: self.version.and_then(|v| v.parse().ok()),
            gas_used: self.gas_used.and_then(|v| v.parse().ok()),
        }
    }
}

/// Error body returned by the node for non-2xx responses.
#[derive(Debug, Deserialize)]
struct NodeError {
    message: String,
    #[serde(default)]
    error_code: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// REST client for one Aptos network.
pub struct AptosClient {
    client: Client,
    base_url: String,
    network: String,
    max_gas_amount: u64,
    wait_timeout: Duration,
}

impl AptosClient {
    /// Build a client from the `chain` config section.
    pub fn new(config: &ChainConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs.max(1)))
            .build()
            .map_err(|e| AptoError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.node_url(),
            network: config.network.as_str().to_string(),
            max_gas_amount: config.max_gas_amount,
            wait_timeout: Duration::from_secs(config.transaction_wait_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> ChainResult<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    async fn post_json<T: for<'de> Deserialize<'de>, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ChainResult<T> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    /// Current sequence number; accounts not yet created on chain start at 0.
    async fn sequence_number(&self, address: &AccountAddress) -> ChainResult<u64> {
        match self
            .get_json::<AccountResource>(&format!("/accounts/{}", address))
            .await
        {
            Ok(resource) => resource
                .sequence_number
                .parse()
                .map_err(|_| ChainError::Unexpected("sequence_number is not a number".into())),
            Err(ChainError::AccountNotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    async fn build_transfer(
        &self,
        sender: &SigningIdentity,
        to: &AccountAddress,
        octas: u64,
        gas_unit_price: u64,
    ) -> ChainResult<RawTransaction> {
        let sender_address = sender.address();
        let sequence_number = self.sequence_number(&sender_address).await?;
        let expiration = chrono::Utc::now().timestamp() + EXPIRATION_SECS;
        Ok(RawTransaction {
            sender: sender_address.to_hex(),
            sequence_number: sequence_number.to_string(),
            max_gas_amount: self.max_gas_amount.to_string(),
            gas_unit_price: gas_unit_price.to_string(),
            expiration_timestamp_secs: expiration.to_string(),
            payload: EntryFunctionPayload {
                r#type: "entry_function_payload",
                function: TRANSFER_FUNCTION,
                type_arguments: Vec::new(),
                arguments: vec![json!(to.to_hex()), json!(octas.to_string())],
            },
        })
    }

    /// Ask the node for the signing message of `raw` and sign it.
    async fn sign(&self, sender: &SigningIdentity, raw: &RawTransaction) -> ChainResult<String> {
        let message_hex: String = self.post_json("/transactions/encode_submission", raw).await?;
        let message = hex::decode(message_hex.trim_start_matches("0x"))
            .map_err(|_| ChainError::Unexpected("signing message is not hex".into()))?;
        Ok(format!("0x{}", hex::encode(sender.sign(&message))))
    }

    async fn wait_for(&self, hash: &str) -> ChainResult<TransactionView> {
        let deadline = tokio::time::Instant::now() + self.wait_timeout;
        loop {
            match self
                .get_json::<TransactionView>(&format!("/transactions/by_hash/{}", hash))
                .await
            {
                Ok(txn) if !txn.is_pending() => return Ok(txn),
                Ok(_) | Err(ChainError::TransactionNotFound(_)) => {}
                Err(e) => return Err(e),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ChainError::Timeout(format!(
                    "transaction {} not committed after {}s",
                    hash,
                    self.wait_timeout.as_secs()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl ChainClient for AptosClient {
    fn network(&self) -> &str {
        &self.network
    }

    async fn balance(&self, address: &AccountAddress) -> ChainResult<u64> {
        let body = json!({
            "function": BALANCE_FUNCTION,
            "type_arguments": [APT_COIN_TYPE],
            "arguments": [address.to_hex()],
        });
        let values: Vec<Value> = match self.post_json("/view", &body).await {
            Ok(v) => v,
            Err(ChainError::AccountNotFound(_)) => return Ok(0),
            Err(e) => return Err(e),
        };
        let raw = values
            .first()
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChainError::Unexpected("balance view returned no value".into()))?;
        raw.parse()
            .map_err(|_| ChainError::Unexpected(format!("balance '{}' is not a number", raw)))
    }

    async fn gas_price(&self) -> ChainResult<GasPrice> {
        let estimate: GasEstimateResponse = self.get_json("/estimate_gas_price").await?;
        Ok(GasPrice {
            deprioritized: estimate.deprioritized_gas_estimate,
            standard: estimate.gas_estimate,
            prioritized: estimate.prioritized_gas_estimate,
        })
    }

    async fn simulate_transfer(
        &self,
        sender: &SigningIdentity,
        to: &AccountAddress,
        octas: u64,
    ) -> ChainResult<FeeEstimate> {
        let price = self.gas_price().await?;
        let raw = self.build_transfer(sender, to, octas, price.standard).await?;
        // the node rejects simulations that carry a valid signature
        let signed = SignedTransaction {
            raw: &raw,
            signature: Ed25519Signature {
                r#type: "ed25519_signature",
                public_key: sender.public_key_hex(),
                signature: format!("0x{}", "00".repeat(64)),
            },
        };
        let results: Vec<TransactionView> = self
            .post_json("/transactions/simulate?estimate_gas_unit_price=true", &signed)
            .await?;
        let txn = results
            .into_iter()
            .next()
            .ok_or_else(|| ChainError::Unexpected("empty simulation result".into()))?;

        let gas_used: u64 = txn.gas_used.as_deref().and_then(|v| v.parse().ok()).unwrap_or(0);
        let gas_unit_price: u64 = txn
            .gas_unit_price
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(price.standard);
        Ok(FeeEstimate {
            gas_used,
            gas_unit_price,
            fee_octas: gas_used.saturating_mul(gas_unit_price),
            success: txn.success.unwrap_or(false),
            vm_status: txn.vm_status.unwrap_or_default(),
        })
    }

    async fn transfer(
        &self,
        sender: &SigningIdentity,
        to: &AccountAddress,
        octas: u64,
    ) -> ChainResult<TransferReceipt> {
        if octas == 0 {
            return Err(ChainError::InvalidAmount("amount must be positive".into()));
        }
        let price = self.gas_price().await?;
        let available = self.balance(&sender.address()).await?;
        let needed = octas.saturating_add(self.max_gas_amount.saturating_mul(price.standard));
        if available < needed {
            return Err(ChainError::InsufficientFunds { needed, available });
        }

        let raw = self.build_transfer(sender, to, octas, price.standard).await?;
        let signature = self.sign(sender, &raw).await?;
        let signed = SignedTransaction {
            raw: &raw,
            signature: Ed25519Signature {
                r#type: "ed25519_signature",
                public_key: sender.public_key_hex(),
                signature,
            },
        };
        let pending: PendingTransaction = self.post_json("/transactions", &signed).await?;
        info!(hash = %pending.hash, to = %to, octas, "Submitted transfer");

        let txn = self.wait_for(&pending.hash).await?;
        let info = txn.into_info();
        if info.success != Some(true) {
            warn!(hash = %info.hash, vm_status = ?info.vm_status, "Transfer failed on chain");
        }
        Ok(TransferReceipt {
            hash: info.hash,
            success: info.success.unwrap_or(false),
            vm_status: info.vm_status.unwrap_or_default(),
            gas_used: info.gas_used.unwrap_or(0),
            version: info.version,
        })
    }

    async fn transaction(&self, hash: &str) -> ChainResult<TransactionInfo> {
        let hash = hash.trim();
        let digits = hash.strip_prefix("0x").unwrap_or(hash);
        if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChainError::TransactionNotFound(format!(
                "'{}' is not a transaction hash",
                hash
            )));
        }
        let txn: TransactionView = self
            .get_json(&format!("/transactions/by_hash/0x{}", digits))
            .await?;
        Ok(txn.into_info())
    }
}

// ============================================================================
// Error mapping
// ============================================================================

fn transport_error(e: reqwest::Error) -> ChainError {
    if e.is_timeout() {
        ChainError::Timeout(e.to_string())
    } else {
        ChainError::Network(e.to_string())
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> ChainResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    if status.is_success() {
        return serde_json::from_str(&body)
            .map_err(|e| ChainError::Unexpected(format!("invalid JSON from node: {}", e)));
    }
    debug!(status = %status, body = %body, "Node returned error");
    Err(classify_node_error(status, &body))
}

/// Map a non-2xx node response onto [`ChainError`].
fn classify_node_error(status: StatusCode, body: &str) -> ChainError {
    let (message, code) = match serde_json::from_str::<NodeError>(body) {
        Ok(err) => (err.message, err.error_code.unwrap_or_default()),
        Err(_) => (body.to_string(), String::new()),
    };

    match code.as_str() {
        "account_not_found" | "resource_not_found" => return ChainError::AccountNotFound(message),
        "transaction_not_found" => return ChainError::TransactionNotFound(message),
        _ => {}
    }
    match status {
        StatusCode::NOT_FOUND => ChainError::TransactionNotFound(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ChainError::Timeout(message),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            ChainError::Network(format!("{}: {}", s, message))
        }
        _ => ChainError::Rejected(message),
    }
}
