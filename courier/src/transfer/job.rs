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

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to move tokens, executed asynchronously by a
/// [`TransferWorker`](crate::transfer::TransferWorker).
///
/// Serialized as JSON onto the transfer queue. The field names on the wire are
/// shared with every other producer and consumer of that queue.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferJob {
    /// JSON-RPC endpoint of the ledger that holds the token.
    #[serde(rename = "web3_provider")]
    pub ledger_endpoint: String,
    /// Token contract address.
    #[serde(rename = "token_address")]
    pub token_identifier: String,
    /// Wallet the tokens leave.
    #[serde(rename = "source_address")]
    pub source_identity: String,
    /// Wallet the tokens arrive in.
    #[serde(rename = "target_address")]
    pub target_identity: String,
    /// Key that signs the transfer. Never logged.
    #[serde(rename = "private_key")]
    pub signing_credential: String,
    /// Amount in the token's smallest unit.
    pub amount: u128,
    /// Agent whose status channel receives the outcome.
    #[serde(rename = "agent_name")]
    pub requesting_agent: String,
}

impl TransferJob {
    /// Encodes the job for the queue.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails, which a well-formed job never does.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decodes a queue payload.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the payload is not a complete job.
    pub fn from_payload(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

impl fmt::Debug for TransferJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferJob")
            .field("ledger_endpoint", &self.ledger_endpoint)
            .field("token_identifier", &self.token_identifier)
            .field("source_identity", &self.source_identity)
            .field("target_identity", &self.target_identity)
            .field("signing_credential", &"<redacted>")
            .field("amount", &self.amount)
            .field("requesting_agent", &self.requesting_agent)
            .finish()
    }
}

/// A job payload exactly as it came off the queue.
///
/// Decoding is left to the consumer so that a malformed payload can still be
/// traced back to the agent that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    payload: String,
}

impl QueuedJob {
    /// Wraps a raw payload.
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The raw payload.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Decodes the payload into a [`TransferJob`].
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the payload is not a complete job.
    pub fn decode(&self) -> serde_json::Result<TransferJob> {
        TransferJob::from_payload(&self.payload)
    }

    /// Best-effort extraction of the requesting agent from a payload that may
    /// not decode as a whole.
    pub fn requesting_agent(&self) -> Option<String> {
        let value: Value = serde_json::from_str(&self.payload).ok()?;
        value.get("agent_name")?.as_str().map(ToString::to_string)
    }

    /// Best-effort extraction of the source wallet.
    pub fn source_identity(&self) -> Option<String> {
        let value: Value = serde_json::from_str(&self.payload).ok()?;
        value.get("source_address")?.as_str().map(ToString::to_string)
    }
}
