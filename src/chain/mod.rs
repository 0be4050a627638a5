//! Aptos network access.
//!
//! [`ChainClient`] is what the agent's tools call. Failures are
//! [`ChainError`]s, which tools turn into structured tool results so the
//! reasoning loop can explain them to the user.

pub mod address;
pub mod aptos;
pub mod units;

#[cfg(test)]
pub(crate) mod mock;

pub use address::{AccountAddress, AddressParseError};
pub use aptos::AptosClient;
pub use units::{format_octas, parse_apt_amount, OCTAS_PER_APT};

use crate::wallet::SigningIdentity;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Blockchain-level failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient funds: need {needed} octas, have {available} octas")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("account not found on chain: {0}")]
    AccountNotFound(String),

    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    /// The node refused the request or the VM aborted the transaction.
    #[error("rejected by the network: {0}")]
    Rejected(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("unexpected node response: {0}")]
    Unexpected(String),
}

impl ChainError {
    /// Stable snake_case tag used in tool-error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainError::InvalidAddress(_) => "invalid_address",
            ChainError::InvalidAmount(_) => "invalid_amount",
            ChainError::InsufficientFunds { .. } => "insufficient_funds",
            ChainError::AccountNotFound(_) => "account_not_found",
            ChainError::TransactionNotFound(_) => "transaction_not_found",
            ChainError::Rejected(_) => "rejected",
            ChainError::Network(_) => "network_error",
            ChainError::Timeout(_) => "timeout",
            ChainError::Unexpected(_) => "unexpected_response",
        }
    }
}

impl From<AddressParseError> for ChainError {
    fn from(e: AddressParseError) -> Self {
        ChainError::InvalidAddress(e.to_string())
    }
}

pub type ChainResult<T> = std::result::Result<T, ChainError>;

/// Gas unit price estimates in octas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GasPrice {
    pub deprioritized: Option<u64>,
    pub standard: u64,
    pub prioritized: Option<u64>,
}

/// Fee of a simulated transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeEstimate {
    pub gas_used: u64,
    pub gas_unit_price: u64,
    pub fee_octas: u64,
    pub success: bool,
    pub vm_status: String,
}

/// Outcome of a committed (or rejected after commit) transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub hash: String,
    pub success: bool,
    pub vm_status: String,
    pub gas_used: u64,
    pub version: Option<u64>,
}

/// Lookup result for a transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionInfo {
    pub hash: String,
    pub pending: bool,
    pub success: Option<bool>,
    pub vm_status: Option<String>,
    pub sender: Option<String>,
    pub version: Option<u64>,
    pub gas_used: Option<u64>,
}

/// Operations the agent may perform against the network.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Network label shown to the user (e.g. "testnet").
    fn network(&self) -> &str;

    /// APT balance in octas. Accounts that do not exist yet hold zero.
    async fn balance(&self, address: &AccountAddress) -> ChainResult<u64>;

    async fn gas_price(&self) -> ChainResult<GasPrice>;

    /// Simulate an APT transfer without submitting it.
    async fn simulate_transfer(
        &self,
        sender: &SigningIdentity,
        to: &AccountAddress,
        octas: u64,
    ) -> ChainResult<FeeEstimate>;

    /// Sign, submit and wait for an APT transfer.
    async fn transfer(
        &self,
        sender: &SigningIdentity,
        to: &AccountAddress,
        octas: u64,
    ) -> ChainResult<TransferReceipt>;

    async fn transaction(&self, hash: &str) -> ChainResult<TransactionInfo>;
}
