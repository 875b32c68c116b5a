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
use std::time::Duration;

use async_trait::async_trait;

use crate::common::BackendResult;
use crate::transfer::{QueuedJob, TransferJob, TransferOutcome};

/// A durable FIFO of pending transfer jobs shared by producers and consumers
/// in different processes.
///
/// Implementations must hand each pushed job to exactly one `pop` caller.
#[async_trait]
pub trait TransferJobQueue: Send + Sync {
    /// Appends an encoded job at the tail.
    async fn push_payload(&self, payload: String) -> BackendResult<()>;

    /// Takes the head, waiting up to `timeout` for one to arrive.
    async fn pop(&self, timeout: Duration) -> BackendResult<Option<QueuedJob>>;

    /// Encodes and appends `job`.
    async fn push(&self, job: &TransferJob) -> BackendResult<()> {
        self.push_payload(job.to_payload()?).await
    }
}

/// Per-agent last-value slot holding the outcome of that agent's most recent
/// transfer.
///
/// This is not a queue. `publish` overwrites whatever is in the slot, so when
/// two transfers for the same agent finish before the agent reads, only the
/// later outcome is delivered. `take` reads and clears in one step.
#[async_trait]
pub trait StatusChannel: Send + Sync {
    /// Stores `outcome` in the slot of `agent`, replacing any unread value.
    async fn publish(&self, agent: &str, outcome: &TransferOutcome) -> BackendResult<()>;

    /// Removes and returns the slot's value.
    async fn take(&self, agent: &str) -> BackendResult<Option<TransferOutcome>>;
}

/// A backend that provides both the job queue and the status slots.
#[async_trait]
pub trait TransferBroker: TransferJobQueue + StatusChannel + Debug {
    /// Establishes the connection if there is none yet.
    async fn connect(&self) -> BackendResult<()>;

    /// Releases the connection; the next operation reconnects.
    async fn close(&self);
}
