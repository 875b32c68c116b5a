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

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::common::{BackendError, BackendResult};
use crate::traits::{StatusChannel, TransferBroker, TransferJobQueue};
use crate::transfer::{QueuedJob, TransferOutcome};

/// A process-local broker with the same delivery semantics as the Redis one.
///
/// Outcomes are stored in their JSON wire form. The broker can be switched
/// into an unavailable state in which every call fails with a connection error.
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    queue: Mutex<VecDeque<String>>,
    statuses: Mutex<HashMap<String, String>>,
    arrivals: Notify,
    unavailable: AtomicBool,
    connected: AtomicBool,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// The unread outcome for `agent`, without clearing it.
    pub fn peek(&self, agent: &str) -> Option<TransferOutcome> {
        let statuses = self.statuses.lock();
        serde_json::from_str(statuses.get(agent)?).ok()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> BackendResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            self.connected.store(false, Ordering::SeqCst);
            return Err(BackendError::Connection("broker unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TransferJobQueue for InMemoryBroker {
    async fn push_payload(&self, payload: String) -> BackendResult<()> {
        self.check_available()?;
        self.queue.lock().push_back(payload);
        self.arrivals.notify_one();
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> BackendResult<Option<QueuedJob>> {
        let deadline = Instant::now() + timeout;
        loop {
            self.check_available()?;
            if let Some(payload) = self.queue.lock().pop_front() {
                return Ok(Some(QueuedJob::new(payload)));
            }
            if tokio::time::timeout_at(deadline, self.arrivals.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }
}

#[async_trait]
impl StatusChannel for InMemoryBroker {
    async fn publish(&self, agent: &str, outcome: &TransferOutcome) -> BackendResult<()> {
        self.check_available()?;
        let value = serde_json::to_string(outcome)?;
        self.statuses.lock().insert(agent.to_string(), value);
        Ok(())
    }

    async fn take(&self, agent: &str) -> BackendResult<Option<TransferOutcome>> {
        self.check_available()?;
        let value = self.statuses.lock().remove(agent);
        value
            .map(|json| serde_json::from_str(&json).map_err(BackendError::from))
            .transpose()
    }
}

#[async_trait]
impl TransferBroker for InMemoryBroker {
    async fn connect(&self) -> BackendResult<()> {
        self.check_available()?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
