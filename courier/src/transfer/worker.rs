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
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, trace, warn};

use crate::common::{BackendError, CourierConfig, LedgerResult};
use crate::ledger::abbreviate;
use crate::traits::{LedgerConnector, TransferBroker};
use crate::transfer::{QueuedJob, TransferJob, TransferOutcome, TransferReceipt};

/// Takes transfer jobs off the queue one at a time, executes them against the
/// ledger named in each job, and publishes one outcome per job to the
/// requesting agent's status slot.
///
/// A job's failure never ends the loop: every error met while executing a job
/// is turned into a [`TransferOutcome::Failure`]. Backend errors are logged
/// and retried after a backoff.
#[derive(Debug)]
pub struct TransferWorker {
    broker: Arc<dyn TransferBroker>,
    connector: Arc<dyn LedgerConnector>,
    dequeue_timeout: Duration,
    retry_backoff: Duration,
    cancellation_token: CancellationToken,
}

impl TransferWorker {
    pub fn new(broker: Arc<dyn TransferBroker>, connector: Arc<dyn LedgerConnector>) -> Self {
        Self {
            broker,
            connector,
            dequeue_timeout: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(1),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn from_config(
        broker: Arc<dyn TransferBroker>,
        connector: Arc<dyn LedgerConnector>,
        config: &CourierConfig,
    ) -> Self {
        Self::new(broker, connector).with_timeouts(
            config.dequeue_timeout(),
            config.backend_retry_backoff(),
        )
    }

    #[must_use]
    pub fn with_timeouts(mut self, dequeue_timeout: Duration, retry_backoff: Duration) -> Self {
        self.dequeue_timeout = dequeue_timeout;
        self.retry_backoff = retry_backoff;
        self
    }

    /// A token that stops the loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Asks the loop to exit once the job in progress, if any, is finished.
    /// The backend connection is released when the loop exits.
    pub fn shutdown(&self) {
        self.cancellation_token.cancel();
    }

    /// Runs until [`shutdown`](Self::shutdown).
    ///
    /// The stop request is checked between dequeue attempts, so it takes
    /// effect within one dequeue timeout.
    #[instrument(skip(self))]
    pub async fn run(&self) {
        let token = self.cancellation_token.clone();
        info!("Transfer worker started");

        while !token.is_cancelled() {
            match self.broker.pop(self.dequeue_timeout).await {
                Ok(Some(job)) => {
                    self.process(&job).await;
                }
                Ok(None) => trace!("No transfer job within dequeue timeout"),
                Err(e) => {
                    error!("Transfer worker backend error: {e}");
                    tokio::select! {
                        () = token.cancelled() => {}
                        () = tokio::time::sleep(self.retry_backoff) => {}
                    }
                }
            }
        }

        info!("Transfer worker shutting down");
        self.broker.close().await;
        info!("Transfer worker stopped");
    }

    /// Executes one queued job and publishes its outcome.
    ///
    /// Publishing is retried after the backoff while the backend is
    /// unreachable, until it succeeds or the worker is shut down.
    ///
    /// Returns the outcome, or `None` for a payload that names no requesting
    /// agent and so has nowhere to be reported.
    pub async fn process(&self, queued: &QueuedJob) -> Option<TransferOutcome> {
        let (agent, outcome) = match queued.decode() {
            Ok(job) => {
                let outcome = self.execute(&job).await;
                (job.requesting_agent, outcome)
            }
            Err(e) => {
                let Some(agent) = queued.requesting_agent() else {
                    error!("Dropping transfer job with no requesting agent: {e}");
                    return None;
                };
                error!("Malformed transfer job from {agent}: {e}");
                let outcome = TransferOutcome::failure(
                    queued.source_identity(),
                    format!("Malformed transfer job: {e}"),
                );
                (agent, outcome)
            }
        };

        self.publish(&agent, &outcome).await;
        Some(outcome)
    }

    // Connection failures are retried until published or shut down.
    async fn publish(&self, agent: &str, outcome: &TransferOutcome) {
        loop {
            match self.broker.publish(agent, outcome).await {
                Ok(()) => return,
                Err(BackendError::Connection(e)) if !self.cancellation_token.is_cancelled() => {
                    warn!("Backend unavailable publishing outcome for {agent}, retrying: {e}");
                    tokio::select! {
                        () = self.cancellation_token.cancelled() => {}
                        () = tokio::time::sleep(self.retry_backoff) => {}
                    }
                }
                Err(e) => {
                    error!("Failed to publish transfer outcome for {agent}: {e}");
                    return;
                }
            }
        }
    }

    /// Executes `job`, converting every error into a failure outcome.
    pub async fn execute(&self, job: &TransferJob) -> TransferOutcome {
        let agent = &job.requesting_agent;
        info!(
            from = %abbreviate(&job.source_identity),
            to = %abbreviate(&job.target_identity),
            "Processing transfer request from {agent}"
        );
        match self.try_execute(job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Transfer processing error for {agent}: {e}");
                TransferOutcome::failure(Some(job.source_identity.clone()), e.to_string())
            }
        }
    }

    async fn try_execute(&self, job: &TransferJob) -> LedgerResult<TransferOutcome> {
        let agent = &job.requesting_agent;
        let ledger = self
            .connector
            .connect(&job.ledger_endpoint, &job.token_identifier)?;

        let balance = ledger.balance_of(&job.source_identity).await?;
        if balance < job.amount {
            warn!("Insufficient balance for {agent}: {balance}");
            return Ok(TransferOutcome::failure(
                Some(job.source_identity.clone()),
                format!("Insufficient balance: {balance}"),
            ));
        }

        let confirmation = ledger
            .submit_transfer(
                &job.source_identity,
                &job.target_identity,
                job.amount,
                &job.signing_credential,
            )
            .await?;
        info!(tx_hash = %confirmation.tx_hash, "Transaction sent by {agent}");

        if !confirmation.succeeded {
            error!(tx_hash = %confirmation.tx_hash, "Transfer failed for {agent}!");
            return Ok(TransferOutcome::failure(
                Some(job.source_identity.clone()),
                "Transaction failed",
            ));
        }

        info!(
            block_number = confirmation.block_number,
            sender = %confirmation.sender,
            gas_used = confirmation.gas_used,
            "Transfer completed for {agent}"
        );
        Ok(TransferOutcome::Success(TransferReceipt {
            tx_hash: confirmation.tx_hash,
            block_number: confirmation.block_number,
            sender: confirmation.sender,
            gas_used: confirmation.gas_used,
            amount: Some(job.amount),
            timestamp: confirmation.timestamp,
            source_identity: Some(job.source_identity.clone()),
        }))
    }
}
