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

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{instrument, trace};

/// A handle to a loop spawned by the [`AgentRuntime`](crate::common::AgentRuntime).
///
/// Cloning is cheap; all clones refer to the same task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: String,
    cancellation_token: CancellationToken,
    tracker: TaskTracker,
}

impl TaskHandle {
    /// Spawns `task` as a tracked task. `cancellation_token` is the token the
    /// task observes to stop, and is also cancelled when `parent` is.
    pub(crate) fn spawn<F>(
        id: impl Into<String>,
        cancellation_token: CancellationToken,
        parent: &CancellationToken,
        task: F,
    ) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tracker = TaskTracker::new();
        let forward = {
            let parent = parent.clone();
            let token = cancellation_token.clone();
            async move {
                tokio::select! {
                    () = parent.cancelled() => token.cancel(),
                    () = token.cancelled() => {}
                }
            }
        };
        tracker.spawn(forward);
        tracker.spawn(task);
        tracker.close();

        Self {
            id: id.into(),
            cancellation_token,
            tracker,
        }
    }

    /// The name the task was spawned under.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True once the task has returned.
    pub fn is_finished(&self) -> bool {
        self.tracker.is_closed() && self.tracker.is_empty()
    }

    /// Requests a stop and waits for the task to return.
    #[instrument(skip(self), fields(task = %self.id))]
    pub async fn stop(&self) -> anyhow::Result<()> {
        trace!("Cancelling task");
        self.cancellation_token.cancel();
        self.tracker.wait().await;
        trace!("Task stopped");
        Ok(())
    }
}
