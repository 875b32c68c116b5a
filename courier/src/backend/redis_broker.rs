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

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::common::{BackendConfig, BackendError, BackendResult};
use crate::traits::{StatusChannel, TransferBroker, TransferJobQueue};
use crate::transfer::{QueuedJob, TransferOutcome};

/// Queue and status slots kept in Redis.
///
/// Jobs are `LPUSH`ed onto a list and taken with `BRPOP`, which gives FIFO
/// order and hands each job to exactly one consumer. Outcomes are plain string
/// keys `<status_key_prefix><agent>`; reading one runs `GET` and `DEL` in a
/// single `MULTI`/`EXEC` transaction.
///
/// The connection is opened lazily and dropped after a connection-level
/// failure so the next call reconnects. A blocking `pop` occupies the shared
/// connection until it returns, so consumers should own their broker.
#[derive(Debug)]
pub struct RedisBroker {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    queue_name: String,
    status_key_prefix: String,
}

impl RedisBroker {
    /// # Errors
    ///
    /// Fails when `redis_url` is not a valid Redis URL.
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            queue_name: config.queue_name.clone(),
            status_key_prefix: config.status_key_prefix.clone(),
        })
    }

    pub fn status_key(&self, agent: &str) -> String {
        format!("{}{agent}", self.status_key_prefix)
    }

    async fn connection(&self) -> BackendResult<MultiplexedConnection> {
        let mut slot = self.connection.lock().await;
        if let Some(connection) = slot.as_ref() {
            return Ok(connection.clone());
        }
        let connection = self.client.get_multiplexed_async_connection().await?;
        debug!(queue = %self.queue_name, "Connected to Redis");
        *slot = Some(connection.clone());
        Ok(connection)
    }

    async fn observe<T>(&self, result: redis::RedisResult<T>) -> BackendResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                let error = BackendError::from(e);
                if matches!(error, BackendError::Connection(_)) {
                    self.connection.lock().await.take();
                }
                Err(error)
            }
        }
    }
}

#[async_trait]
impl TransferJobQueue for RedisBroker {
    async fn push_payload(&self, payload: String) -> BackendResult<()> {
        let mut connection = self.connection().await?;
        let result = connection.lpush::<_, _, ()>(&self.queue_name, payload).await;
        self.observe(result).await
    }

    async fn pop(&self, timeout: Duration) -> BackendResult<Option<QueuedJob>> {
        let mut connection = self.connection().await?;
        // BRPOP treats 0 as "block forever".
        let seconds = timeout.as_secs().max(1);
        let result: redis::RedisResult<Option<(String, String)>> = redis::cmd("BRPOP")
            .arg(&self.queue_name)
            .arg(seconds)
            .query_async(&mut connection)
            .await;
        let popped = self.observe(result).await?;
        Ok(popped.map(|(_, payload)| {
            trace!(queue = %self.queue_name, "Popped transfer job");
            QueuedJob::new(payload)
        }))
    }
}

#[async_trait]
impl StatusChannel for RedisBroker {
    async fn publish(&self, agent: &str, outcome: &TransferOutcome) -> BackendResult<()> {
        let value = serde_json::to_string(outcome)?;
        let mut connection = self.connection().await?;
        let result = connection
            .set::<_, _, ()>(self.status_key(agent), value)
            .await;
        self.observe(result).await
    }

    async fn take(&self, agent: &str) -> BackendResult<Option<TransferOutcome>> {
        let key = self.status_key(agent);
        let mut connection = self.connection().await?;
        let result: redis::RedisResult<(Option<String>, i64)> = redis::pipe()
            .atomic()
            .get(&key)
            .del(&key)
            .query_async(&mut connection)
            .await;
        let (value, _) = self.observe(result).await?;
        value
            .map(|json| serde_json::from_str(&json).map_err(BackendError::from))
            .transpose()
    }
}

#[async_trait]
impl TransferBroker for RedisBroker {
    async fn connect(&self) -> BackendResult<()> {
        self.connection().await.map(|_| ())
    }

    async fn close(&self) {
        if self.connection.lock().await.take().is_some() {
            debug!(queue = %self.queue_name, "Closed Redis connection");
        }
    }
}
