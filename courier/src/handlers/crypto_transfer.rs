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
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use tracing::{error, info};

use crate::agent::AgentContext;
use crate::common::{AgentSettings, LedgerConfig};
use crate::ledger::{abbreviate, format_units, one_token};
use crate::message::{Message, MessageKind};
use crate::traits::{LedgerService, MessageHandler, TransferBroker};
use crate::transfer::{TransferJob, TransferOutcome};

/// The fixed part of every transfer an agent requests.
#[derive(Clone, PartialEq, Eq)]
pub struct TransferTemplate {
    pub ledger_endpoint: String,
    pub token_identifier: String,
    pub source_identity: String,
    pub target_identity: String,
    pub signing_credential: String,
}

impl TransferTemplate {
    /// Transfers from `agent`'s wallet to the configured target.
    pub fn from_config(ledger: &LedgerConfig, agent: &AgentSettings) -> Self {
        Self {
            ledger_endpoint: ledger.provider_url.clone(),
            token_identifier: ledger.token_address.clone(),
            source_identity: agent.wallet_address.clone(),
            target_identity: ledger.target_address.clone(),
            signing_credential: agent.private_key.clone(),
        }
    }

    fn job(&self, amount: u128, requesting_agent: &str) -> TransferJob {
        TransferJob {
            ledger_endpoint: self.ledger_endpoint.clone(),
            token_identifier: self.token_identifier.clone(),
            source_identity: self.source_identity.clone(),
            target_identity: self.target_identity.clone(),
            signing_credential: self.signing_credential.clone(),
            amount,
            requesting_agent: requesting_agent.to_string(),
        }
    }
}

impl fmt::Debug for TransferTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferTemplate")
            .field("ledger_endpoint", &self.ledger_endpoint)
            .field("token_identifier", &self.token_identifier)
            .field("source_identity", &self.source_identity)
            .field("target_identity", &self.target_identity)
            .field("signing_credential", &"<redacted>")
            .finish()
    }
}

/// Queues a one-token transfer whenever a text message mentions the trigger
/// token.
///
/// Before queueing, the handler drains its agent's status slot and logs the
/// outcome of the previous transfer, if one has arrived. Outcomes are only
/// collected this way, so an agent sees the result of transfer `n` when it
/// queues transfer `n + 1`.
#[derive(Debug)]
pub struct CryptoTransferHandler {
    broker: Arc<dyn TransferBroker>,
    template: TransferTemplate,
    trigger: String,
    amount: u128,
    decimals: u8,
}

impl CryptoTransferHandler {
    /// A handler that requests `amount` smallest units per trigger.
    pub fn new(
        broker: Arc<dyn TransferBroker>,
        template: TransferTemplate,
        amount: u128,
        decimals: u8,
    ) -> Self {
        Self {
            broker,
            template,
            trigger: "crypto".to_string(),
            amount,
            decimals,
        }
    }

    /// A handler that requests one whole token per trigger, with the token's
    /// decimals read from `ledger`.
    ///
    /// # Errors
    ///
    /// Fails when the ledger cannot report decimals, or one whole token does
    /// not fit in a `u128`.
    pub async fn from_ledger(
        broker: Arc<dyn TransferBroker>,
        template: TransferTemplate,
        ledger: &dyn LedgerService,
    ) -> anyhow::Result<Self> {
        let decimals = ledger
            .token_decimals()
            .await
            .context("failed to read token decimals")?;
        Ok(Self::new(broker, template, one_token(decimals)?, decimals))
    }

    #[must_use]
    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = trigger.into();
        self
    }

    /// Amount requested per trigger, in smallest units.
    pub fn amount(&self) -> u128 {
        self.amount
    }

    fn report(&self, agent: &str, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Success(receipt) => {
                match receipt.amount {
                    Some(amount) => info!(
                        "Transfer of {} tokens completed for {agent}!",
                        format_units(amount, self.decimals)
                    ),
                    None => info!("Transfer completed for {agent}!"),
                }
                info!(
                    tx_hash = %receipt.tx_hash,
                    block_number = receipt.block_number,
                    sender = %receipt.sender,
                    gas_used = receipt.gas_used,
                    "Transfer receipt"
                );
            }
            TransferOutcome::Failure { error_message, .. } => {
                error!("Transfer failed for {agent}: {error_message}");
            }
        }
    }
}

#[async_trait]
impl MessageHandler for CryptoTransferHandler {
    fn name(&self) -> &str {
        "crypto_transfer"
    }

    fn supported_kinds(&self) -> &[MessageKind] {
        &[MessageKind::Text]
    }

    fn can_handle(&self, message: &Message) -> bool {
        message.kind() == MessageKind::Text && message.mentions(&self.trigger)
    }

    async fn handle(&mut self, _message: &Message, ctx: &AgentContext) -> anyhow::Result<()> {
        let agent = ctx.name();
        self.broker
            .connect()
            .await
            .context("transfer backend unavailable")?;

        if let Some(outcome) = self
            .broker
            .take(agent)
            .await
            .context("failed to read transfer status")?
        {
            self.report(agent, &outcome);
        }

        let job = self.template.job(self.amount, agent);
        self.broker
            .push(&job)
            .await
            .context("failed to queue transfer")?;

        info!(
            from = %abbreviate(&job.source_identity),
            to = %abbreviate(&job.target_identity),
            token = %abbreviate(&job.token_identifier),
            "Token transfer of {} tokens queued by {agent}",
            format_units(self.amount, self.decimals)
        );
        Ok(())
    }
}
