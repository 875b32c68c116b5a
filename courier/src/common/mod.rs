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

//! Configuration, errors, logging, and the runtime that hosts agents and
//! workers.

pub use agent_runtime::AgentRuntime;
pub use config::{
    AgentSettings, BackendConfig, BehaviorConfig, ConfigSource, CourierConfig, LedgerConfig,
    LoggingConfig, TimeoutConfig, CONFIG, DEFAULT_VOCABULARY,
};
pub use courier_app::CourierApp;
pub use error::{BackendError, BackendResult, ConfigError, LedgerError, LedgerResult};
pub use logging::init_tracing;
pub use task_handle::TaskHandle;

mod agent_runtime;
mod config;
mod courier_app;
mod error;
mod logging;
mod task_handle;
