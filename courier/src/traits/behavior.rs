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
use std::time::Instant;

use async_trait::async_trait;

use crate::agent::AgentContext;

/// A self-scheduling unit of proactive work, polled once per agent tick.
///
/// `should_act` is a pure time check; `act` performs the effect and records
/// the time it fired. A failure from `act` is logged by the
/// [`BehaviorRegistry`](crate::agent::BehaviorRegistry) and retried only when
/// the behavior next becomes due.
#[async_trait]
pub trait Behavior: Debug + Send {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// True when the behavior is due at `now`.
    fn should_act(&self, now: Instant) -> bool;

    /// Performs the behavior on behalf of the agent behind `ctx`.
    async fn act(&mut self, ctx: &AgentContext) -> anyhow::Result<()>;
}
