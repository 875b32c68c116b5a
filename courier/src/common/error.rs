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

use thiserror::Error;

/// Failures talking to the queue/status backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached or the connection dropped.
    #[error("backend connection error: {0}")]
    Connection(String),

    /// The backend accepted the connection but rejected a command.
    #[error("backend command error: {0}")]
    Command(String),

    /// A record could not be encoded for, or decoded from, the backend.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<redis::RedisError> for BackendError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_dropped() || e.is_connection_refusal() || e.is_io_error() {
            BackendError::Connection(e.to_string())
        } else {
            BackendError::Command(e.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Serialization(e.to_string())
    }
}

/// The single error kind surfaced by a ledger service.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Transport or JSON-RPC level failure.
    #[error("ledger rpc error: {0}")]
    Rpc(String),

    /// The ledger answered with something that could not be interpreted.
    #[error("ledger response could not be decoded: {0}")]
    Decode(String),

    /// The transaction could not be signed with the supplied credential.
    #[error("signing failed: {0}")]
    Signing(String),

    /// An identity, token, or amount was not acceptable.
    #[error("invalid ledger input: {0}")]
    InvalidInput(String),

    /// A submitted transaction was not confirmed in time.
    #[error("timed out waiting for confirmation of {0}")]
    ConfirmationTimeout(String),
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        LedgerError::Rpc(e.to_string())
    }
}

/// Problems loading configuration from disk.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that failed.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`CourierConfig`](crate::common::CourierConfig).
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that failed.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
