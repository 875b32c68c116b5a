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

//! Capability traits at the seams between agents, the transfer backend and
//! the ledger.

pub use behavior::Behavior;
pub use ledger::{LedgerConnector, LedgerService, TransferConfirmation};
pub use message_handler::MessageHandler;
pub use transfer_broker::{StatusChannel, TransferBroker, TransferJobQueue};

mod behavior;
mod ledger;
mod message_handler;
mod transfer_broker;
