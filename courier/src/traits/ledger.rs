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

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::common::LedgerResult;

/// What a ledger reports after executing a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfirmation {
    /// Whether the ledger applied the transfer.
    pub succeeded: bool,
    /// Hex transaction hash.
    pub tx_hash: String,
    /// Block that included the transaction.
    pub block_number: u64,
    /// Account the ledger recorded as sender.
    pub sender: String,
    /// Gas consumed.
    pub gas_used: u64,
    /// Unix timestamp of the including block.
    pub timestamp: u64,
}

/// Balance queries and signed transfers for one token on one ledger.
#[async_trait]
pub trait LedgerService: Debug + Send + Sync {
    /// Number of decimals of the token.
    async fn token_decimals(&self) -> LedgerResult<u8>;

    /// Token balance of `identity`, in smallest units.
    async fn balance_of(&self, identity: &str) -> LedgerResult<u128>;

    /// Signs a transfer of `amount` from `source` to `target` with
    /// `credential`, submits it and waits for the ledger's confirmation.
    async fn submit_transfer(
        &self,
        source: &str,
        target: &str,
        amount: u128,
        credential: &str,
    ) -> LedgerResult<TransferConfirmation>;
}

/// Builds a [`LedgerService`] for the endpoint and token named in a transfer job.
pub trait LedgerConnector: Debug + Send + Sync {
    /// Returns a ledger bound to `endpoint` and `token`.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint or token cannot be used.
    fn connect(&self, endpoint: &str, token: &str) -> LedgerResult<Arc<dyn LedgerService>>;
}
