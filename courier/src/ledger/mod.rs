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

//! Ledger services: an EVM JSON-RPC client for real chains and an in-memory
//! ledger for tests and demos.

pub use memory::{InMemoryLedger, SubmittedTransfer};
pub use rpc::{RpcLedger, RpcLedgerConnector, RpcSettings};
pub use units::{abbreviate, format_units, one_token};

mod memory;
mod rpc;
pub mod transaction;
mod units;
