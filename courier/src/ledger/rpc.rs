/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::common::{CourierConfig, LedgerError, LedgerResult};
use crate::ledger::transaction::{
    address_of, balance_of_calldata, decimals_calldata, parse_address, parse_signing_key,
    transfer_calldata, LegacyTransaction,
};
use crate::traits::{LedgerConnector, LedgerService, TransferConfirmation};

/// Transaction parameters shared by every [`RpcLedger`] a connector builds.
#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub gas_limit: u64,
    pub gas_price_multiplier_percent: u64,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl RpcSettings {
    pub fn from_config(config: &CourierConfig) -> Self {
        Self {
            gas_limit: config.ledger.gas_limit,
            gas_price_multiplier_percent: config.ledger.gas_price_multiplier_percent,
            receipt_timeout: Duration::from_secs(config.timeouts.receipt_timeout_secs),
            receipt_poll_interval: Duration::from_millis(config.timeouts.receipt_poll_interval_ms),
        }
    }
}

/// An ERC-20 token on an EVM chain, reached over JSON-RPC.
///
/// Transfers are signed locally with the caller's credential and sent as raw
/// legacy transactions; the node never sees the key.
#[derive(Debug)]
pub struct RpcLedger {
    client: reqwest::Client,
    endpoint: String,
    token: Address,
    settings: RpcSettings,
    request_id: AtomicU64,
}

impl RpcLedger {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        token: &str,
        settings: RpcSettings,
    ) -> LedgerResult<Self> {
        let endpoint = endpoint.into();
        if endpoint.is_empty() {
            return Err(LedgerError::InvalidInput("empty ledger endpoint".to_string()));
        }
        Ok(Self {
            client,
            endpoint,
            token: parse_address(token)?,
            settings,
            request_id: AtomicU64::new(1),
        })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> LedgerResult<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        trace!(method, id, "JSON-RPC request");
        let response: Value = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": id
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.get("error") {
            return Err(LedgerError::Rpc(format!("{method} returned error: {error}")));
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| LedgerError::Decode(format!("{method} response has no result")))
    }

    async fn rpc_string(&self, method: &str, params: Value) -> LedgerResult<String> {
        let result = self.rpc_call(method, params).await?;
        result
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| LedgerError::Decode(format!("{method} result is not a string")))
    }

    async fn eth_call(&self, data: Vec<u8>) -> LedgerResult<String> {
        let to = format!("{:#x}", self.token);
        let data = format!("0x{}", hex::encode(data));
        self.rpc_string("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }

    async fn chain_id(&self) -> LedgerResult<u64> {
        let raw = self.rpc_string("eth_chainId", json!([])).await?;
        parse_quantity(&raw, "chain id")
    }

    async fn pending_nonce(&self, account: &Address) -> LedgerResult<u64> {
        let raw = self
            .rpc_string(
                "eth_getTransactionCount",
                json!([format!("{account:#x}"), "pending"]),
            )
            .await?;
        parse_quantity(&raw, "nonce")
    }

    async fn gas_price(&self) -> LedgerResult<U256> {
        let raw = self.rpc_string("eth_gasPrice", json!([])).await?;
        let quoted = U256::from(parse_quantity_u128(&raw, "gas price")?);
        Ok(quoted * U256::from(self.settings.gas_price_multiplier_percent) / U256::from(100u64))
    }

    async fn block_timestamp(&self, block: &str) -> LedgerResult<u64> {
        let block = self
            .rpc_call("eth_getBlockByNumber", json!([block, false]))
            .await?;
        let raw = block
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| LedgerError::Decode("block has no timestamp".to_string()))?;
        parse_quantity(raw, "block timestamp")
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> LedgerResult<Value> {
        let deadline = Instant::now() + self.settings.receipt_timeout;
        loop {
            let receipt = self
                .rpc_call("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if !receipt.is_null() {
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                return Err(LedgerError::ConfirmationTimeout(tx_hash.to_string()));
            }
            tokio::time::sleep(self.settings.receipt_poll_interval).await;
        }
    }
}

#[async_trait]
impl LedgerService for RpcLedger {
    async fn token_decimals(&self) -> LedgerResult<u8> {
        let raw = self.eth_call(decimals_calldata()).await?;
        let decimals = parse_word(&raw, "decimals")?;
        u8::try_from(decimals)
            .map_err(|_| LedgerError::Decode(format!("decimals {decimals} out of range")))
    }

    async fn balance_of(&self, identity: &str) -> LedgerResult<u128> {
        let owner = parse_address(identity)?;
        let raw = self.eth_call(balance_of_calldata(&owner)).await?;
        parse_word(&raw, "balance")
    }

    async fn submit_transfer(
        &self,
        source: &str,
        target: &str,
        amount: u128,
        credential: &str,
    ) -> LedgerResult<TransferConfirmation> {
        let key = parse_signing_key(credential)?;
        let signer = address_of(&key);
        if signer != parse_address(source)? {
            return Err(LedgerError::InvalidInput(format!(
                "credential does not control {source}"
            )));
        }
        let target = parse_address(target)?;

        let tx = LegacyTransaction {
            nonce: self.pending_nonce(&signer).await?,
            gas_price: self.gas_price().await?,
            gas_limit: self.settings.gas_limit,
            to: self.token,
            value: U256::ZERO,
            data: Bytes::from(transfer_calldata(&target, amount)),
            chain_id: self.chain_id().await?,
        };
        let signed = tx.sign(&key)?;
        debug!(nonce = tx.nonce, tx_hash = %signed.hash_hex(), "Sending raw transaction");

        let tx_hash = self
            .rpc_string("eth_sendRawTransaction", json!([signed.raw_hex()]))
            .await?;
        let receipt = self.wait_for_receipt(&tx_hash).await?;

        let field = |name: &str| receipt_field(&receipt, name);
        let block_hex = field("blockNumber")?;
        let timestamp = self.block_timestamp(block_hex).await?;

        Ok(TransferConfirmation {
            succeeded: parse_quantity(field("status")?, "receipt status")? == 1,
            tx_hash,
            block_number: parse_quantity(block_hex, "block number")?,
            sender: field("from")
                .map(ToString::to_string)
                .unwrap_or_else(|_| format!("{signer:#x}")),
            gas_used: parse_quantity(field("gasUsed")?, "gas used")?,
            timestamp,
        })
    }
}

/// Builds an [`RpcLedger`] per `(endpoint, token)` over one shared HTTP client.
#[derive(Debug, Clone)]
pub struct RpcLedgerConnector {
    client: reqwest::Client,
    settings: RpcSettings,
}

impl RpcLedgerConnector {
    pub fn new(settings: RpcSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    pub fn from_config(config: &CourierConfig) -> Self {
        Self::new(RpcSettings::from_config(config))
    }
}

impl LedgerConnector for RpcLedgerConnector {
    fn connect(&self, endpoint: &str, token: &str) -> LedgerResult<Arc<dyn LedgerService>> {
        Ok(Arc::new(RpcLedger::new(
            self.client.clone(),
            endpoint,
            token,
            self.settings.clone(),
        )?))
    }
}

fn receipt_field<'a>(receipt: &'a Value, name: &str) -> LedgerResult<&'a str> {
    receipt
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| LedgerError::Decode(format!("receipt has no {name}")))
}

fn strip_hex<'a>(raw: &'a str, field: &str) -> LedgerResult<&'a str> {
    raw.trim()
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::Decode(format!("{field} is not 0x-prefixed: {raw}")))
}

fn parse_quantity(raw: &str, field: &str) -> LedgerResult<u64> {
    let digits = strip_hex(raw, field)?;
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::Decode(format!("failed to parse {field}: {e}")))
}

fn parse_quantity_u128(raw: &str, field: &str) -> LedgerResult<u128> {
    let digits = strip_hex(raw, field)?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::Decode(format!("failed to parse {field}: {e}")))
}

// An ABI-encoded uint256 return value that must fit in 128 bits.
fn parse_word(raw: &str, field: &str) -> LedgerResult<u128> {
    let digits = strip_hex(raw, field)?;
    if digits.len() > 64 {
        return Err(LedgerError::Decode(format!("{field} exceeds 32 bytes")));
    }
    let significant = digits.trim_start_matches('0');
    if significant.len() > 32 {
        return Err(LedgerError::Decode(format!("{field} does not fit in 128 bits")));
    }
    if significant.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(significant, 16)
        .map_err(|e| LedgerError::Decode(format!("failed to parse {field}: {e}")))
}
