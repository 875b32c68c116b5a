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
use std::time::Instant;

use tracing::{error, trace, warn};

use crate::agent::AgentContext;
use crate::message::{Message, MessageKind};
use crate::traits::{Behavior, MessageHandler};

/// Dispatch table from message kind to the handlers registered for it.
///
/// Built once while an agent is configured; entries are never removed. A handler
/// that supports several kinds is stored once and indexed under each kind.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn MessageHandler>>,
    by_kind: HashMap<MessageKind, Vec<usize>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handler` under every kind it supports, after any handler already
    /// registered for that kind.
    pub fn register(&mut self, handler: Box<dyn MessageHandler>) {
        let index = self.handlers.len();
        for kind in handler.supported_kinds() {
            let indices = self.by_kind.entry(*kind).or_default();
            if !indices.contains(&index) {
                indices.push(index);
            }
        }
        trace!(handler = handler.name(), "Registered message handler");
        self.handlers.push(handler);
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Offers `message` to each handler registered for its kind, in
    /// registration order, and runs `handle` on every one that accepts it.
    ///
    /// A handler that fails is logged and skipped; the remaining handlers still
    /// see the message. Returns how many handlers were invoked.
    pub async fn process_message(&mut self, message: &Message, ctx: &AgentContext) -> usize {
        let Some(indices) = self.by_kind.get(&message.kind()) else {
            trace!(kind = %message.kind(), "No handler registered for message kind");
            return 0;
        };

        let mut invoked = 0;
        for &index in indices {
            let handler = &mut self.handlers[index];
            if !handler.can_handle(message) {
                continue;
            }
            invoked += 1;
            if let Err(e) = handler.handle(message, ctx).await {
                error!(
                    agent = ctx.name(),
                    handler = handler.name(),
                    "Message handler failed: {e:#}"
                );
            }
        }
        invoked
    }
}

/// Ordered list of behaviors polled on every agent tick.
#[derive(Debug, Default)]
pub struct BehaviorRegistry {
    behaviors: Vec<Box<dyn Behavior>>,
}

impl BehaviorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `behavior`.
    pub fn register(&mut self, behavior: Box<dyn Behavior>) {
        trace!(behavior = behavior.name(), "Registered behavior");
        self.behaviors.push(behavior);
    }

    /// Number of registered behaviors.
    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    /// True when no behavior is registered.
    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// Runs `act` on every behavior that is due, in registration order.
    ///
    /// Failures are logged and not retried within this tick. Returns how many
    /// behaviors acted.
    pub async fn run_behaviors(&mut self, ctx: &AgentContext) -> usize {
        let mut acted = 0;
        for behavior in &mut self.behaviors {
            if !behavior.should_act(Instant::now()) {
                continue;
            }
            acted += 1;
            if let Err(e) = behavior.act(ctx).await {
                warn!(
                    agent = ctx.name(),
                    behavior = behavior.name(),
                    "Behavior failed: {e:#}"
                );
            }
        }
        acted
    }
}
