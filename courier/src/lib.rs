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

#![forbid(unsafe_code)]

//! # Courier
//!
//! Cooperative message-passing agents that hand token transfers off to a
//! background worker through a durable queue.
//!
//! ## Key Concepts
//!
//! - **Agents (`Agent`)**: each owns an inbox and an outbox and runs a loop that
//!   dispatches at most one inbound message per tick to its handlers, then polls
//!   every behavior.
//! - **Handlers and behaviors**: `MessageHandler` reacts to messages of the kinds
//!   it registers for; `Behavior` does periodic work on its own schedule.
//! - **Transfers**: `CryptoTransferHandler` queues a `TransferJob`; a
//!   `TransferWorker`, usually in another process, executes it against a
//!   `LedgerService` and leaves a `TransferOutcome` in the requesting agent's
//!   status slot.
//! - **Brokers**: `TransferBroker` backends carry jobs and outcomes between
//!   processes. `RedisBroker` is the production backend; `InMemoryBroker`
//!   serves tests and single-process demos.
//! - **Runtime (`AgentRuntime`)**: spawns agents and workers as tracked tasks
//!   and shuts them down within a deadline.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! let mut first = Agent::new("Agent1");
//! let mut second = Agent::new("Agent2");
//! first.register_handler(GreetingHandler::default());
//! second.register_behavior(RandomMessageBehavior::from_config(&BehaviorConfig::default()));
//! wire_ring(&mut first, &mut second);
//!
//! let runtime = CourierApp::launch();
//! runtime.spawn_agent(first);
//! runtime.spawn_agent(second);
//! runtime.shutdown_all().await?;
//! ```

/// Agents, their loop, and their dispatch tables.
pub mod agent;

/// Transfer broker backends.
pub mod backend;

/// Periodic behaviors.
pub mod behaviors;

/// Configuration, errors, logging, and the task runtime.
pub mod common;

/// Message handlers.
pub mod handlers;

/// Ledger services and amount helpers.
pub mod ledger;

/// Messages and message boxes.
pub mod message;

/// Capability traits.
pub mod traits;

/// Transfer jobs, outcomes, and the worker.
pub mod transfer;

/// Commonly used items in one import.
pub mod prelude {
    pub use async_trait::async_trait;

    pub use crate::agent::{wire_ring, Agent, AgentContext, AgentState, BehaviorRegistry, HandlerRegistry};
    pub use crate::backend::{InMemoryBroker, RedisBroker};
    pub use crate::behaviors::{BalanceCheckBehavior, RandomMessageBehavior};
    pub use crate::common::{
        AgentRuntime, AgentSettings, BackendError, BehaviorConfig, CourierApp, CourierConfig,
        LedgerError, TaskHandle, CONFIG,
    };
    pub use crate::handlers::{CryptoTransferHandler, GreetingHandler, TransferTemplate};
    pub use crate::ledger::{format_units, InMemoryLedger, RpcLedger, RpcLedgerConnector};
    pub use crate::message::{Message, MessageBox, MessageKind};
    pub use crate::traits::{
        Behavior, LedgerConnector, LedgerService, MessageHandler, StatusChannel,
        TransferBroker, TransferConfirmation, TransferJobQueue,
    };
    pub use crate::transfer::{QueuedJob, TransferJob, TransferOutcome, TransferReceipt, TransferWorker};
}
