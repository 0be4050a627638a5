//! In-memory chain used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    AccountAddress, ChainClient, ChainError, ChainResult, FeeEstimate, GasPrice, TransactionInfo,
    TransferReceipt,
};
use crate::wallet::SigningIdentity;

pub(crate) const GAS_UNIT_PRICE: u64 = 100;
pub(crate) const GAS_USED: u64 = 10;

#[derive(Default)]
pub(crate) struct MockChain {
    balances: Mutex<HashMap<AccountAddress, u64>>,
    transfers: Mutex<Vec<(AccountAddress, AccountAddress, u64)>>,
    fail_with: Option<ChainError>,
    delay: Option<Duration>,
}

impl MockChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_balance(self, address: AccountAddress, octas: u64) -> Self {
        self.balances.lock().unwrap().insert(address, octas);
        self
    }

    pub(crate) fn failing(mut self, err: ChainError) -> Self {
        self.fail_with = Some(err);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn balance_of(&self, address: &AccountAddress) -> u64 {
        self.balances.lock().unwrap().get(address).copied().unwrap_or(0)
    }

    pub(crate) fn transfers(&self) -> Vec<(AccountAddress, AccountAddress, u64)> {
        self.transfers.lock().unwrap().clone()
    }

    async fn gate(&self) -> ChainResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn network(&self) -> &str {
        "mocknet"
    }

    async fn balance(&self, address: &AccountAddress) -> ChainResult<u64> {
        self.gate().await?;
        Ok(self.balance_of(address))
    }

    async fn gas_price(&self) -> ChainResult<GasPrice> {
        self.gate().await?;
        Ok(GasPrice {
            deprioritized: Some(GAS_UNIT_PRICE),
            standard: GAS_UNIT_PRICE,
            prioritized: Some(GAS_UNIT_PRICE * 15),
        })
    }

    async fn simulate_transfer(
        &self,
        _sender: &SigningIdentity,
        _to: &AccountAddress,
        _octas: u64,
    ) -> ChainResult<FeeEstimate> {
        self.gate().await?;
        Ok(FeeEstimate {
            gas_used: GAS_USED,
            gas_unit_price: GAS_UNIT_PRICE,
            fee_octas: GAS_USED * GAS_UNIT_PRICE,
            success: true,
            vm_status: "Executed successfully".to_string(),
        })
    }

    async fn transfer(
        &self,
        sender: &SigningIdentity,
        to: &AccountAddress,
        octas: u64,
    ) -> ChainResult<TransferReceipt> {
        self.gate().await?;
        let from = sender.address();
        let fee = GAS_USED * GAS_UNIT_PRICE;
        let mut balances = self.balances.lock().unwrap();
        let available = balances.get(&from).copied().unwrap_or(0);
        let needed = octas + fee;
        if available < needed {
            return Err(ChainError::InsufficientFunds { needed, available });
        }
        balances.insert(from, available - needed);
        *balances.entry(*to).or_insert(0) += octas;
        self.transfers.lock().unwrap().push((from, *to, octas));
        Ok(TransferReceipt {
            hash: format!("0x{}", "ab".repeat(32)),
            success: true,
            vm_status: "Executed successfully".to_string(),
            gas_used: GAS_USED,
            version: Some(42),
        })
    }

    async fn transaction(&self, hash: &str) -> ChainResult<TransactionInfo> {
        self.gate().await?;
        Ok(TransactionInfo {
            hash: hash.to_string(),
            pending: false,
            success: Some(true),
            vm_status: Some("Executed successfully".to_string()),
            sender: None,
            version: Some(42),
            gas_used: Some(GAS_USED),
        })
    }
}
