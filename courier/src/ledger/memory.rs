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

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::common::{LedgerError, LedgerResult};
use crate::traits::{LedgerConnector, LedgerService, TransferConfirmation};

/// A transfer as seen by [`InMemoryLedger::submit_transfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransfer {
    pub source: String,
    pub target: String,
    pub amount: u128,
}

#[derive(Debug)]
struct LedgerState {
    decimals: u8,
    balances: Mutex<HashMap<String, u128>>,
    confirms: AtomicBool,
    unavailable: Mutex<Option<String>>,
    submissions: Mutex<Vec<SubmittedTransfer>>,
    next_block: AtomicU64,
}

/// A single-token ledger held in memory.
///
/// Clones share state. Identities are compared case-insensitively. The ledger
/// doubles as its own [`LedgerConnector`], ignoring the endpoint and token it
/// is asked for.
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    state: Arc<LedgerState>,
}

impl InMemoryLedger {
    /// An empty ledger for a token with `decimals` decimals that confirms
    /// every transfer it can cover.
    pub fn new(decimals: u8) -> Self {
        Self {
            state: Arc::new(LedgerState {
                decimals,
                balances: Mutex::new(HashMap::new()),
                confirms: AtomicBool::new(true),
                unavailable: Mutex::new(None),
                submissions: Mutex::new(Vec::new()),
                next_block: AtomicU64::new(1),
            }),
        }
    }

    /// Builder form of [`set_balance`](Self::set_balance).
    #[must_use]
    pub fn with_balance(self, identity: &str, amount: u128) -> Self {
        self.set_balance(identity, amount);
        self
    }

    pub fn set_balance(&self, identity: &str, amount: u128) {
        self.state
            .balances
            .lock()
            .insert(identity.to_ascii_lowercase(), amount);
    }

    pub fn balance(&self, identity: &str) -> u128 {
        self.state
            .balances
            .lock()
            .get(&identity.to_ascii_lowercase())
            .copied()
            .unwrap_or_default()
    }

    /// When false, submitted transfers are mined but reported as reverted.
    pub fn set_confirms(&self, confirms: bool) {
        self.state.confirms.store(confirms, Ordering::SeqCst);
    }

    /// Makes every call fail with an RPC error carrying `reason`, or restores
    /// service with `None`.
    pub fn set_unavailable(&self, reason: Option<String>) {
        *self.state.unavailable.lock() = reason;
    }

    /// Every transfer submitted so far, in order.
    pub fn submissions(&self) -> Vec<SubmittedTransfer> {
        self.state.submissions.lock().clone()
    }

    fn check_available(&self) -> LedgerResult<()> {
        match self.state.unavailable.lock().as_ref() {
            Some(reason) => Err(LedgerError::Rpc(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LedgerService for InMemoryLedger {
    async fn token_decimals(&self) -> LedgerResult<u8> {
        self.check_available()?;
        Ok(self.state.decimals)
    }

    async fn balance_of(&self, identity: &str) -> LedgerResult<u128> {
        self.check_available()?;
        Ok(self.balance(identity))
    }

    async fn submit_transfer(
        &self,
        source: &str,
        target: &str,
        amount: u128,
        credential: &str,
    ) -> LedgerResult<TransferConfirmation> {
        self.check_available()?;
        if credential.is_empty() {
            return Err(LedgerError::Signing("empty credential".to_string()));
        }

        self.state.submissions.lock().push(SubmittedTransfer {
            source: source.to_string(),
            target: target.to_string(),
            amount,
        });

        let succeeded = {
            let mut balances = self.state.balances.lock();
            let source_key = source.to_ascii_lowercase();
            let available = balances.get(&source_key).copied().unwrap_or_default();
            if self.state.confirms.load(Ordering::SeqCst) && available >= amount {
                balances.insert(source_key, available - amount);
                *balances.entry(target.to_ascii_lowercase()).or_default() += amount;
                true
            } else {
                false
            }
        };

        let block_number = self.state.next_block.fetch_add(1, Ordering::SeqCst);
        debug!(block_number, succeeded, "In-memory transfer mined");
        Ok(TransferConfirmation {
            succeeded,
            tx_hash: format!("0x{block_number:064x}"),
            block_number,
            sender: source.to_string(),
            gas_used: 21_000,
            timestamp: u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default(),
        })
    }
}

impl LedgerConnector for InMemoryLedger {
    fn connect(&self, _endpoint: &str, _token: &str) -> LedgerResult<Arc<dyn LedgerService>> {
        Ok(Arc::new(self.clone()))
    }
}
