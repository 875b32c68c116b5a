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

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use async_trait::async_trait;
use tracing::info;

use crate::agent::AgentContext;
use crate::ledger::{abbreviate, format_units};
use crate::traits::{Behavior, LedgerService};

/// Every `interval`, reads a wallet's token balance from the ledger and logs it.
///
/// The fire time is recorded before the ledger is called, so a failed check
/// waits a full interval before it is tried again.
#[derive(Debug)]
pub struct BalanceCheckBehavior {
    ledger: Arc<dyn LedgerService>,
    wallet: String,
    interval: Duration,
    last_fired: Option<Instant>,
    decimals: Option<u8>,
    last_balance: Option<u128>,
}

impl BalanceCheckBehavior {
    pub fn new(ledger: Arc<dyn LedgerService>, wallet: impl Into<String>, interval: Duration) -> Self {
        Self {
            ledger,
            wallet: wallet.into(),
            interval,
            last_fired: None,
            decimals: None,
            last_balance: None,
        }
    }

    /// The balance seen by the most recent successful check.
    pub fn last_balance(&self) -> Option<u128> {
        self.last_balance
    }

    async fn decimals(&mut self) -> anyhow::Result<u8> {
        if let Some(decimals) = self.decimals {
            return Ok(decimals);
        }
        let decimals = self
            .ledger
            .token_decimals()
            .await
            .context("failed to read token decimals")?;
        self.decimals = Some(decimals);
        Ok(decimals)
    }
}

#[async_trait]
impl Behavior for BalanceCheckBehavior {
    fn name(&self) -> &str {
        "balance_check"
    }

    fn should_act(&self, now: Instant) -> bool {
        self.last_fired
            .map_or(true, |fired| now.duration_since(fired) >= self.interval)
    }

    async fn act(&mut self, ctx: &AgentContext) -> anyhow::Result<()> {
        self.last_fired = Some(Instant::now());
        let balance = self
            .ledger
            .balance_of(&self.wallet)
            .await
            .with_context(|| format!("failed to check balance of {}", abbreviate(&self.wallet)))?;
        let decimals = self.decimals().await?;
        self.last_balance = Some(balance);
        info!(
            agent = ctx.name(),
            "Token balance for {}: {} tokens",
            abbreviate(&self.wallet),
            format_units(balance, decimals)
        );
        Ok(())
    }
}
