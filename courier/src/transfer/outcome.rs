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

use serde::{Deserialize, Serialize};

/// The result of one transfer, delivered through the requesting agent's
/// [`StatusChannel`](crate::traits::StatusChannel) slot.
///
/// On the wire this is a flat JSON object tagged by `"status"`, either
/// `"success"` or `"error"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OutcomeRecord", into = "OutcomeRecord")]
pub enum TransferOutcome {
    /// The ledger confirmed the transfer.
    Success(TransferReceipt),
    /// The transfer was not carried out, or the ledger rejected it.
    Failure {
        /// Wallet the transfer would have left, when known.
        source_identity: Option<String>,
        /// Human-readable reason.
        error_message: String,
    },
}

/// Confirmation details of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Hex transaction hash.
    pub tx_hash: String,
    /// Block that included the transaction.
    pub block_number: u64,
    /// Account that sent the transaction, as reported by the ledger.
    pub sender: String,
    /// Gas consumed.
    pub gas_used: u64,
    /// Amount moved, in the token's smallest unit.
    pub amount: Option<u128>,
    /// Unix timestamp of the including block.
    pub timestamp: u64,
    /// Wallet the tokens left.
    pub source_identity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OutcomeRecord {
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gas_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    amount: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<TransferOutcome> for OutcomeRecord {
    fn from(outcome: TransferOutcome) -> Self {
        match outcome {
            TransferOutcome::Success(receipt) => OutcomeRecord {
                status: "success".into(),
                source_address: receipt.source_identity,
                sender: Some(receipt.sender),
                tx_hash: Some(receipt.tx_hash),
                block_number: Some(receipt.block_number),
                gas_used: Some(receipt.gas_used),
                timestamp: Some(receipt.timestamp),
                amount: receipt.amount,
                error: None,
            },
            TransferOutcome::Failure {
                source_identity,
                error_message,
            } => OutcomeRecord {
                status: "error".into(),
                source_address: source_identity,
                sender: None,
                tx_hash: None,
                block_number: None,
                gas_used: None,
                timestamp: None,
                amount: None,
                error: Some(error_message),
            },
        }
    }
}

impl TryFrom<OutcomeRecord> for TransferOutcome {
    type Error = String;

    fn try_from(record: OutcomeRecord) -> Result<Self, Self::Error> {
        match record.status.as_str() {
            "success" => Ok(TransferOutcome::Success(TransferReceipt {
                tx_hash: record.tx_hash.ok_or("success outcome without tx_hash")?,
                block_number: record.block_number.ok_or("success outcome without block_number")?,
                sender: record.sender.ok_or("success outcome without sender")?,
                gas_used: record.gas_used.ok_or("success outcome without gas_used")?,
                amount: record.amount,
                timestamp: record.timestamp.unwrap_or_default(),
                source_identity: record.source_address,
            })),
            "error" => Ok(TransferOutcome::Failure {
                source_identity: record.source_address,
                error_message: record.error.unwrap_or_else(|| "unknown error".to_string()),
            }),
            other => Err(format!("unknown transfer status {other:?}")),
        }
    }
}

impl TransferOutcome {
    /// A failure with a reason and, when known, the source wallet.
    pub fn failure(source_identity: Option<String>, error_message: impl Into<String>) -> Self {
        TransferOutcome::Failure {
            source_identity,
            error_message: error_message.into(),
        }
    }

    /// True for [`TransferOutcome::Success`].
    pub const fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success(_))
    }

    /// The failure reason, if this is a failure.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            TransferOutcome::Failure { error_message, .. } => Some(error_message),
            TransferOutcome::Success(_) => None,
        }
    }

    /// The receipt, if this is a success.
    pub const fn receipt(&self) -> Option<&TransferReceipt> {
        match self {
            TransferOutcome::Success(receipt) => Some(receipt),
            TransferOutcome::Failure { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn success_is_tagged_and_flattened() {
        let outcome = TransferOutcome::Success(TransferReceipt {
            tx_hash: "0xabc".into(),
            block_number: 7,
            sender: "0xsender".into(),
            gas_used: 21_000,
            amount: None,
            timestamp: 1_700_000_000,
            source_identity: Some("0xsource".into()),
        });
        let encoded: Value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(encoded["status"], "success");
        assert_eq!(encoded["tx_hash"], "0xabc");
        assert_eq!(encoded["source_address"], "0xsource");
        assert!(encoded.get("amount").is_none());
    }

    #[test]
    fn success_round_trips_through_the_wire_record() {
        let outcome = TransferOutcome::Success(TransferReceipt {
            tx_hash: "0x01".into(),
            block_number: 1,
            sender: "0xs".into(),
            gas_used: 2,
            amount: Some(1_000_000_000_000_000_000),
            timestamp: 3,
            source_identity: None,
        });
        let encoded = serde_json::to_string(&outcome).unwrap();
        assert_eq!(serde_json::from_str::<TransferOutcome>(&encoded).unwrap(), outcome);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let raw = json!({"status": "pending"});
        assert!(serde_json::from_value::<TransferOutcome>(raw).is_err());
    }

    #[test]
    fn error_status_decodes_into_failure() {
        let raw = json!({"status": "error", "source_address": "0xs", "error": "Transaction failed"});
        let outcome: TransferOutcome = serde_json::from_value(raw).unwrap();
        assert_eq!(outcome.error_message(), Some("Transaction failed"));
        assert!(!outcome.is_success());
    }
}
