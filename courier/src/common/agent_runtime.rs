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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::agent::Agent;
use crate::common::{CourierConfig, TaskHandle};
use crate::transfer::TransferWorker;

/// Owns every agent and worker loop started in this process.
///
/// The runtime is cloneable; clones share the same task registry and root
/// cancellation token.
#[derive(Debug, Clone)]
pub struct AgentRuntime {
    tasks: Arc<DashMap<String, TaskHandle>>,
    next_worker: Arc<AtomicUsize>,
    cancellation_token: CancellationToken,
    config: CourierConfig,
}

impl AgentRuntime {
    pub(crate) fn new(config: CourierConfig) -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            next_worker: Arc::new(AtomicUsize::new(0)),
            cancellation_token: CancellationToken::new(),
            config,
        }
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    /// Cancelled when a shutdown overruns its deadline; every task spawned by
    /// this runtime observes it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Number of tasks started and not yet shut down.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Runs `agent` on its own task.
    ///
    /// An agent that was stopped earlier is restarted.
    pub fn spawn_agent(&self, mut agent: Agent) -> TaskHandle {
        let id = agent.name().to_string();
        agent.rearm();
        let handle = TaskHandle::spawn(
            id.clone(),
            agent.cancellation_token(),
            &self.cancellation_token,
            async move { agent.run_until_cancelled().await },
        );
        trace!(agent = %id, "Spawned agent task");
        self.register(handle)
    }

    /// Runs `worker` on its own task under a name never reused by this runtime.
    pub fn spawn_worker(&self, worker: TransferWorker) -> TaskHandle {
        let id = format!(
            "transfer-worker-{}",
            self.next_worker.fetch_add(1, Ordering::Relaxed)
        );
        let handle = TaskHandle::spawn(
            id.clone(),
            worker.cancellation_token(),
            &self.cancellation_token,
            async move { worker.run().await },
        );
        trace!(worker = %id, "Spawned transfer worker task");
        self.register(handle)
    }

    fn register(&self, handle: TaskHandle) -> TaskHandle {
        if let Some(previous) = self.tasks.insert(handle.id().to_string(), handle.clone()) {
            warn!("Task {} replaced an earlier task of the same name", previous.id());
        }
        handle
    }

    /// Stops every task concurrently and waits for them to finish.
    ///
    /// Waits at most the configured shutdown timeout. On overrun a warning is
    /// logged, the root token is cancelled and the call returns anyway; the
    /// stragglers finish their current iteration on their own.
    pub async fn shutdown_all(&self) -> anyhow::Result<()> {
        info!("Initiating graceful shutdown...");
        let handles: Vec<TaskHandle> = self.tasks.iter().map(|item| item.value().clone()).collect();
        let stop_futures: Vec<_> = handles
            .iter()
            .map(|handle| async move {
                if let Err(e) = handle.stop().await {
                    error!("Error stopping task {}: {e:?}", handle.id());
                }
            })
            .collect();

        let timeout: Duration = self.config.shutdown_timeout();
        if tokio::time::timeout(timeout, join_all(stop_futures))
            .await
            .is_err()
        {
            warn!(
                "Some tasks did not complete within {} ms",
                timeout.as_millis()
            );
            self.cancellation_token.cancel();
        } else {
            trace!("All tasks completed gracefully");
        }

        for handle in &handles {
            if handle.is_finished() {
                self.tasks.remove(handle.id());
            }
        }
        info!("System shutdown complete");
        Ok(())
    }
}
