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

use std::path::{Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::common::ConfigError;

/// Configuration for a Courier deployment.
///
/// Loaded from TOML in XDG-compliant directories, then overridden from the
/// environment (see [`CourierConfig::apply_env`]).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CourierConfig {
    /// Loop timing and shutdown deadlines
    pub timeouts: TimeoutConfig,
    /// Queue and status backend location
    pub backend: BackendConfig,
    /// Periodic behavior and handler settings
    pub behaviors: BehaviorConfig,
    /// Ledger endpoint and token
    pub ledger: LedgerConfig,
    /// The agents to start, in ring order
    pub agents: Vec<AgentSettings>,
    /// Log output
    pub logging: LoggingConfig,
}

/// Timing configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Pause between two iterations of an agent loop, in milliseconds
    pub tick_interval_ms: u64,
    /// How long system shutdown waits for tasks to go quiet, in milliseconds
    pub shutdown_timeout_ms: u64,
    /// Blocking dequeue timeout used by the worker, in seconds
    pub dequeue_timeout_secs: u64,
    /// Pause after a backend failure before the worker retries, in milliseconds
    pub backend_retry_backoff_ms: u64,
    /// Maximum wait for a transaction receipt, in seconds
    pub receipt_timeout_secs: u64,
    /// Receipt polling period, in milliseconds
    pub receipt_poll_interval_ms: u64,
}

/// Queue/status backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Name of the list holding pending transfer jobs
    pub queue_name: String,
    /// Prefix of the per-agent status keys
    pub status_key_prefix: String,
}

/// Behavior and handler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Interval of the random message behavior, in milliseconds
    pub random_message_interval_ms: u64,
    /// Interval of the balance check behavior, in milliseconds
    pub balance_check_interval_ms: u64,
    /// Words the random message behavior samples from
    pub vocabulary: Vec<String>,
    /// Word that makes the greeting handler react
    pub greeting_token: String,
    /// Word that makes the transfer handler queue a transfer
    pub transfer_trigger_token: String,
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the chain node
    pub provider_url: String,
    /// Address of the ERC-20 token contract
    pub token_address: String,
    /// Recipient of every queued transfer
    pub target_address: String,
    /// Gas limit attached to transfer transactions
    pub gas_limit: u64,
    /// Gas price paid relative to the node's quote, in percent
    pub gas_price_multiplier_percent: u64,
}

/// Identity and wallet of one agent
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentSettings {
    /// Agent name, also its status channel identity
    pub name: String,
    /// Wallet the agent monitors and transfers from
    pub wallet_address: String,
    /// Hex-encoded secp256k1 key of the wallet
    pub private_key: String,
}

impl std::fmt::Debug for AgentSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSettings")
            .field("name", &self.name)
            .field("wallet_address", &self.wallet_address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// When set, logs are also written to a daily rolling file in this directory
    pub log_directory: Option<String>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            shutdown_timeout_ms: 5_000,
            dequeue_timeout_secs: 1,
            backend_retry_backoff_ms: 1_000,
            receipt_timeout_secs: 120,
            receipt_poll_interval_ms: 1_000,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            queue_name: "crypto_transfers".to_string(),
            status_key_prefix: "transfer_status_".to_string(),
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            random_message_interval_ms: 2_000,
            balance_check_interval_ms: 10_000,
            vocabulary: DEFAULT_VOCABULARY.iter().map(ToString::to_string).collect(),
            greeting_token: "hello".to_string(),
            transfer_trigger_token: "crypto".to_string(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            provider_url: "http://localhost:8545".to_string(),
            token_address: String::new(),
            target_address: String::new(),
            gas_limit: 1_000_000,
            gas_price_multiplier_percent: 110,
        }
    }
}

/// Words sampled by the random message behavior unless configured otherwise.
pub const DEFAULT_VOCABULARY: [&str; 10] = [
    "hello", "sun", "world", "space", "moon", "crypto", "sky", "ocean", "universe", "human",
];

fn default_agents() -> Vec<AgentSettings> {
    ["Agent1", "Agent2"]
        .into_iter()
        .map(|name| AgentSettings {
            name: name.to_string(),
            ..AgentSettings::default()
        })
        .collect()
}

impl CourierConfig {
    /// Loop pause between agent iterations.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.timeouts.tick_interval_ms)
    }

    /// Deadline for system-wide shutdown.
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.shutdown_timeout_ms)
    }

    /// Blocking dequeue timeout for the worker.
    pub const fn dequeue_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.dequeue_timeout_secs)
    }

    /// Backoff after a backend failure.
    pub const fn backend_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.timeouts.backend_retry_backoff_ms)
    }

    /// The agents to start, falling back to the default `Agent1`/`Agent2` pair.
    pub fn agent_settings(&self) -> Vec<AgentSettings> {
        if self.agents.is_empty() {
            default_agents()
        } else {
            self.agents.clone()
        }
    }

    /// Parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or is not valid TOML.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load configuration from XDG-compliant locations
    ///
    /// Looks for `courier/config.toml` under `$XDG_CONFIG_HOME` and the XDG
    /// config directories. A missing file yields the defaults; an unreadable
    /// or malformed file is logged and also yields the defaults. Environment
    /// overrides are applied in every case.
    pub fn load() -> Self {
        let (config, source) = Self::load_with_source();
        source.log();
        config
    }

    /// Like [`load`](Self::load), but returns where the configuration came
    /// from instead of logging it, for callers that install tracing after
    /// reading the configuration.
    pub fn load_with_source() -> (Self, ConfigSource) {
        let (mut config, source) = match xdg::BaseDirectories::with_prefix("courier") {
            Ok(dirs) => match dirs.find_config_file("config.toml") {
                Some(path) => match Self::load_from_path(&path) {
                    Ok(config) => (config, ConfigSource::File(path)),
                    Err(e) => (Self::default(), ConfigSource::Fallback(e.to_string())),
                },
                None => (Self::default(), ConfigSource::Defaults),
            },
            Err(e) => (
                Self::default(),
                ConfigSource::Fallback(format!("Failed to initialize XDG directories: {e}")),
            ),
        };
        config.apply_env();
        (config, source)
    }

    /// Overrides settings from the process environment.
    ///
    /// A `.env` file in the working directory is read first if present.
    /// Recognised variables: `REDIS_URL`, `WEB3_PROVIDER_URL`, `TOKEN_ADDRESS`,
    /// `TARGET_ADDRESS`, and `WALLET<n>_ADDRESS` / `PRIVATE_KEY<n>` for the
    /// n-th agent (1-based).
    pub fn apply_env(&mut self) {
        let _ = dotenvy::dotenv();
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("REDIS_URL") {
            self.backend.redis_url = url;
        }
        if let Some(url) = lookup("WEB3_PROVIDER_URL") {
            self.ledger.provider_url = url;
        }
        if let Some(token) = lookup("TOKEN_ADDRESS") {
            self.ledger.token_address = token;
        }
        if let Some(target) = lookup("TARGET_ADDRESS") {
            self.ledger.target_address = target;
        }
        if self.agents.is_empty() {
            self.agents = default_agents();
        }
        for (index, agent) in self.agents.iter_mut().enumerate() {
            let n = index + 1;
            if let Some(wallet) = lookup(&format!("WALLET{n}_ADDRESS")) {
                agent.wallet_address = wallet;
            }
            if let Some(key) = lookup(&format!("PRIVATE_KEY{n}")) {
                agent.private_key = key;
            }
        }
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from this file.
    File(PathBuf),
    /// No file was found.
    Defaults,
    /// A file or directory could not be used; defaults were taken instead.
    Fallback(String),
}

impl ConfigSource {
    /// Logs where the configuration came from.
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loading configuration from: {}", path.display()),
            ConfigSource::Defaults => info!("No configuration file found, using defaults"),
            ConfigSource::Fallback(reason) => error!("{reason}; using defaults"),
        }
    }
}

lazy_static! {
    /// Global configuration instance loaded from XDG-compliant locations and the environment
    pub static ref CONFIG: CourierConfig = CourierConfig::load();
}
