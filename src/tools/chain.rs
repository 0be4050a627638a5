//! On-chain tools exposed to the reasoning agent.
//!
//! The toolset is closed: every tool is a [`ChainTool`] variant, so adding
//! one means adding a variant and its match arms.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::chain::{format_octas, parse_apt_amount, AccountAddress, ChainError};

use super::{Tool, ToolCategory, ToolContext, ToolError, ToolOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainTool {
    WalletAddress,
    Balance,
    Transfer,
    GasEstimate,
    TransactionStatus,
}

impl ChainTool {
    pub const ALL: [ChainTool; 5] = [
        ChainTool::WalletAddress,
        ChainTool::Balance,
        ChainTool::Transfer,
        ChainTool::GasEstimate,
        ChainTool::TransactionStatus,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    async fn wallet_address(ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::json(&json!({
            "address": ctx.signer.address().to_hex(),
            "public_key": ctx.signer.public_key_hex(),
            "network": ctx.chain.network(),
        })))
    }

    async fn balance(args: &Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let address = match str_arg(args, "address")? {
            Some(text) => parse_address(text)?,
            None => ctx.signer.address(),
        };
        let octas = ctx.chain.balance(&address).await?;
        Ok(ToolOutput::json(&json!({
            "address": address.to_hex(),
            "balance_octas": octas,
            "balance_apt": format_octas(octas),
            "network": ctx.chain.network(),
        })))
    }

    async fn transfer(args: &Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let to = parse_address(required_str(args, "to")?)?;
        let octas = amount_arg(args)?
            .ok_or_else(|| ToolError::InvalidArguments("missing 'amount'".into()))?;
        if to == ctx.signer.address() {
            return Err(ToolError::InvalidArguments(
                "recipient is the sender's own address".into(),
            ));
        }

        let receipt = ctx.chain.transfer(&ctx.signer, &to, octas).await?;
        Ok(ToolOutput::json(&json!({
            "hash": receipt.hash,
            "success": receipt.success,
            "vm_status": receipt.vm_status,
            "from": ctx.signer.address().to_hex(),
            "to": to.to_hex(),
            "amount_octas": octas,
            "amount_apt": format_octas(octas),
            "gas_used": receipt.gas_used,
            "version": receipt.version,
            "network": ctx.chain.network(),
        })))
    }

    async fn gas_estimate(args: &Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let price = ctx.chain.gas_price().await?;
        let mut out = json!({
            "gas_unit_price": price.standard,
            "deprioritized_gas_unit_price": price.deprioritized,
            "prioritized_gas_unit_price": price.prioritized,
            "network": ctx.chain.network(),
        });

        let to = str_arg(args, "to")?;
        let amount = amount_arg(args)?;
        if let (Some(to), Some(octas)) = (to, amount) {
            let to = parse_address(to)?;
            let fee = ctx.chain.simulate_transfer(&ctx.signer, &to, octas).await?;
            out["transfer"] = json!({
                "to": to.to_hex(),
                "amount_apt": format_octas(octas),
                "gas_used": fee.gas_used,
                "fee_octas": fee.fee_octas,
                "fee_apt": format_octas(fee.fee_octas),
                "would_succeed": fee.success,
                "vm_status": fee.vm_status,
            });
        }
        Ok(ToolOutput::json(&out))
    }

    async fn transaction_status(args: &Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let hash = required_str(args, "hash")?;
        let info = ctx.chain.transaction(hash).await?;
        let value = serde_json::to_value(&info)
            .map_err(|e| ToolError::Chain(ChainError::Unexpected(e.to_string())))?;
        Ok(ToolOutput::json(&value))
    }
}

#[async_trait]
impl Tool for ChainTool {
    fn name(&self) -> &str {
        match self {
            ChainTool::WalletAddress => "aptos_get_wallet_address",
            ChainTool::Balance => "aptos_get_balance",
            ChainTool::Transfer => "aptos_transfer",
            ChainTool::GasEstimate => "aptos_estimate_gas",
            ChainTool::TransactionStatus => "aptos_get_transaction",
        }
    }

    fn description(&self) -> &str {
        match self {
            ChainTool::WalletAddress => {
                "Get the user's own Aptos wallet address and public key."
            }
            ChainTool::Balance => {
                "Get the APT balance of an Aptos account. Defaults to the user's own wallet."
            }
            ChainTool::Transfer => {
                "Send APT from the user's wallet to another Aptos address. \
                 Amount is in APT (up to 8 decimal places). Only call this when the user \
                 has clearly asked for the transfer."
            }
            ChainTool::GasEstimate => {
                "Get current gas unit prices. When 'to' and 'amount' are given, also \
                 simulates that transfer and reports the expected fee."
            }
            ChainTool::TransactionStatus => "Look up a transaction by its hash.",
        }
    }

    fn parameters(&self) -> Value {
        match self {
            ChainTool::WalletAddress => json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            ChainTool::Balance => json!({
                "type": "object",
                "properties": {
                    "address": {
                        "type": "string",
                        "description": "Account address (0x-prefixed hex). Omit for the user's wallet."
                    }
                },
                "required": []
            }),
            ChainTool::Transfer => json!({
                "type": "object",
                "properties": {
                    "to": {
                        "type": "string",
                        "description": "Recipient account address (0x-prefixed hex)"
                    },
                    "amount": {
                        "type": "string",
                        "description": "Amount of APT, e.g. \"0.5\""
                    }
                },
                "required": ["to", "amount"]
            }),
            ChainTool::GasEstimate => json!({
                "type": "object",
                "properties": {
                    "to": {
                        "type": "string",
                        "description": "Recipient address for a simulated transfer"
                    },
                    "amount": {
                        "type": "string",
                        "description": "Amount of APT for a simulated transfer"
                    }
                },
                "required": []
            }),
            ChainTool::TransactionStatus => json!({
                "type": "object",
                "properties": {
                    "hash": {
                        "type": "string",
                        "description": "Transaction hash (0x-prefixed hex)"
                    }
                },
                "required": ["hash"]
            }),
        }
    }

    fn category(&self) -> ToolCategory {
        match self {
            ChainTool::Transfer => ToolCategory::ChainWrite,
            _ => ToolCategory::ChainRead,
        }
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        match self {
            ChainTool::WalletAddress => Self::wallet_address(ctx).await,
            ChainTool::Balance => Self::balance(&args, ctx).await,
            ChainTool::Transfer => Self::transfer(&args, ctx).await,
            ChainTool::GasEstimate => Self::gas_estimate(&args, ctx).await,
            ChainTool::TransactionStatus => Self::transaction_status(&args, ctx).await,
        }
    }
}

/// Optional string argument; blank counts as absent.
fn str_arg<'a>(args: &'a Value, key: &str) -> Result<Option<&'a str>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim())),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "'{}' must be a string, got {}",
            key, other
        ))),
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    str_arg(args, key)?.ok_or_else(|| ToolError::InvalidArguments(format!("missing '{}'", key)))
}

/// APT amount given as a decimal string or a JSON number.
fn amount_arg(args: &Value) -> Result<Option<u64>, ToolError> {
    let text = match args.get("amount") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(ToolError::InvalidArguments(format!(
                "'amount' must be a decimal string, got {}",
                other
            )))
        }
    };
    let octas = parse_apt_amount(&text)?;
    if octas == 0 {
        return Err(ChainError::InvalidAmount("amount must be greater than zero".into()).into());
    }
    Ok(Some(octas))
}

fn parse_address(text: &str) -> Result<AccountAddress, ToolError> {
    text.parse::<AccountAddress>()
        .map_err(|e| ToolError::Chain(e.into()))
}
