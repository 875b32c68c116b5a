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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, trace};

use crate::agent::{BehaviorRegistry, HandlerRegistry};
use crate::message::{Message, MessageBox};
use crate::traits::{Behavior, MessageHandler};

/// Default pause between two iterations of the agent loop.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// What handlers and behaviors see of the agent they run in.
#[derive(Debug, Clone)]
pub struct AgentContext {
    name: String,
    inbox: MessageBox,
    outbox: MessageBox,
}

impl AgentContext {
    /// The agent's name, which is also its status channel identity.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The agent's own inbox.
    #[inline]
    pub const fn inbox(&self) -> &MessageBox {
        &self.inbox
    }

    /// Where the agent's outgoing messages go.
    #[inline]
    pub const fn outbox(&self) -> &MessageBox {
        &self.outbox
    }

    /// Puts `message` into the outbox.
    pub fn send(&self, message: Message) {
        self.outbox.put(message);
    }
}

/// Lifecycle state of an [`Agent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentState {
    /// The loop is not running.
    Stopped,
    /// The loop is running.
    Running,
}

/// An independently scheduled actor with an inbox, an outbox, message handlers
/// and periodic behaviors.
///
/// Each iteration of [`Agent::run`] takes at most one message from the inbox and
/// dispatches it, then polls every behavior once, then pauses for the tick
/// interval. Stopping is cooperative: the loop finishes the iteration in
/// progress and exits before starting another.
pub struct Agent {
    context: AgentContext,
    handlers: HandlerRegistry,
    behaviors: BehaviorRegistry,
    tick_interval: Duration,
    cancellation_token: CancellationToken,
    running: Arc<AtomicBool>,
}

impl Agent {
    /// Creates a stopped agent with its own empty inbox and outbox.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        info!("Agent {name} initialized");
        Self {
            context: AgentContext {
                name,
                inbox: MessageBox::new(),
                outbox: MessageBox::new(),
            },
            handlers: HandlerRegistry::new(),
            behaviors: BehaviorRegistry::new(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            cancellation_token: CancellationToken::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the pause between loop iterations.
    #[must_use]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Registers a message handler.
    pub fn register_handler(&mut self, handler: impl MessageHandler + 'static) -> &mut Self {
        self.handlers.register(Box::new(handler));
        self
    }

    /// Registers a behavior.
    pub fn register_behavior(&mut self, behavior: impl Behavior + 'static) -> &mut Self {
        self.behaviors.register(Box::new(behavior));
        self
    }

    /// Replaces the outbox, typically with another agent's inbox.
    pub fn set_outbox(&mut self, outbox: MessageBox) {
        self.context.outbox = outbox;
    }

    /// The agent's name.
    #[inline]
    pub fn name(&self) -> &str {
        self.context.name()
    }

    /// The context handed to handlers and behaviors.
    #[inline]
    pub const fn context(&self) -> &AgentContext {
        &self.context
    }

    /// The agent's inbox.
    #[inline]
    pub const fn inbox(&self) -> &MessageBox {
        &self.context.inbox
    }

    /// The agent's outbox.
    #[inline]
    pub const fn outbox(&self) -> &MessageBox {
        &self.context.outbox
    }

    /// Registered handlers.
    #[inline]
    pub const fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Registered behaviors.
    #[inline]
    pub const fn behaviors(&self) -> &BehaviorRegistry {
        &self.behaviors
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AgentState {
        if self.running.load(Ordering::SeqCst) {
            AgentState::Running
        } else {
            AgentState::Stopped
        }
    }

    /// A token that stops the loop when cancelled.
    ///
    /// Cancelling is equivalent to [`Agent::stop`] and can be done from another
    /// task while [`Agent::run`] holds the agent. A stopped agent is given a
    /// fresh token when it is run again, so fetch the token after each stop.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Replaces a cancelled token so the next run starts from Stopped.
    pub(crate) fn rearm(&mut self) {
        if self.cancellation_token.is_cancelled() {
            trace!(agent = self.name(), "Rearming cancellation token");
            self.cancellation_token = CancellationToken::new();
        }
    }

    /// Asks the loop to exit after its current iteration.
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }

    /// Dispatches `message` through the handler registry and returns how many
    /// handlers ran.
    pub async fn process_message(&mut self, message: &Message) -> usize {
        self.handlers.process_message(message, &self.context).await
    }

    /// Runs every due behavior once.
    pub async fn run_behaviors(&mut self) -> usize {
        self.behaviors.run_behaviors(&self.context).await
    }

    /// One loop iteration without the trailing pause.
    pub async fn tick(&mut self) {
        if let Some(message) = self.context.inbox.get() {
            trace!(agent = self.name(), kind = %message.kind(), "Dispatching message");
            self.process_message(&message).await;
        }
        self.run_behaviors().await;
    }

    /// Runs the agent loop until the agent is stopped.
    ///
    /// The pause between iterations ends early when a stop is requested; a
    /// dispatch or behavior already in progress always completes. An agent
    /// stopped earlier starts running again.
    pub async fn run(&mut self) {
        self.rearm();
        self.run_until_cancelled().await;
    }

    // Loop body without rearming; the runtime rearms before handing out the
    // token it stops the task with.
    #[instrument(skip(self), fields(agent = %self.context.name))]
    pub(crate) async fn run_until_cancelled(&mut self) {
        let token = self.cancellation_token.clone();
        self.running.store(true, Ordering::SeqCst);
        info!("Agent {} started", self.name());

        while !token.is_cancelled() {
            self.tick().await;
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(self.tick_interval) => {}
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Agent {} stopped", self.name());
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.context.name)
            .field("state", &self.state())
            .field("handlers", &self.handlers.len())
            .field("behaviors", &self.behaviors.len())
            .finish_non_exhaustive()
    }
}

/// Connects two agents into a closed loop: each one's outbox becomes the
/// other's inbox.
pub fn wire_ring(first: &mut Agent, second: &mut Agent) {
    first.set_outbox(second.inbox().clone());
    second.set_outbox(first.inbox().clone());
}
