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

use async_trait::async_trait;

use crate::agent::AgentContext;
use crate::message::{Message, MessageKind};

/// A reactive unit of work triggered by incoming messages of the kinds it
/// supports.
///
/// The [`HandlerRegistry`](crate::agent::HandlerRegistry) only offers a message
/// to handlers registered for its kind, and only calls `handle` when
/// `can_handle` accepts it.
#[async_trait]
pub trait MessageHandler: Debug + Send {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// The message kinds this handler registers for.
    fn supported_kinds(&self) -> &[MessageKind];

    /// Whether this handler wants `message`.
    fn can_handle(&self, message: &Message) -> bool;

    /// Reacts to `message` on behalf of the agent behind `ctx`.
    async fn handle(&mut self, message: &Message, ctx: &AgentContext) -> anyhow::Result<()>;
}
