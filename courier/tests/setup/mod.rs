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

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use anyhow::bail;
use courier::prelude::*;
use parking_lot::Mutex;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Ensures tracing initialization happens only once across all tests.
static INIT: Once = Once::new();

/// Initializes the global tracing subscriber for tests, writing to
/// `logs/courier_tests.txt`.
pub fn initialize_tracing() {
    INIT.call_once(|| {
        std::fs::create_dir_all("logs").expect("could not create logs dir");

        let file_appender = RollingFileAppender::new(Rotation::NEVER, "logs", "courier_tests.txt");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leak the guard so the non-blocking writer is not dropped before process exit
        Box::leak(Box::new(guard));

        let filter = EnvFilter::new("info")
            .add_directive("courier=trace".parse().unwrap())
            .add_directive("agent_tests=trace".parse().unwrap())
            .add_directive("transfer_tests=trace".parse().unwrap());

        let subscriber = FmtSubscriber::builder()
            .with_span_events(FmtSpan::NONE)
            .with_max_level(Level::TRACE)
            .compact()
            .with_line_number(true)
            .without_time()
            .with_target(true)
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("setting default subscriber failed");
    });
}

/// A handler that records the text of every message it handles.
#[derive(Debug, Clone)]
pub struct RecordingHandler {
    pub name: String,
    pub kinds: Vec<MessageKind>,
    pub accept_token: Option<String>,
    pub fail: bool,
    pub handled: Arc<Mutex<Vec<String>>>,
    pub offered: Arc<AtomicUsize>,
}

impl RecordingHandler {
    pub fn new(name: &str, kinds: &[MessageKind]) -> Self {
        Self {
            name: name.to_string(),
            kinds: kinds.to_vec(),
            accept_token: None,
            fail: false,
            handled: Arc::new(Mutex::new(Vec::new())),
            offered: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Only accepts messages mentioning `token`.
    pub fn accepting(mut self, token: &str) -> Self {
        self.accept_token = Some(token.to_string());
        self
    }

    /// Fails every `handle` call after recording the message.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn handled(&self) -> Vec<String> {
        self.handled.lock().clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_kinds(&self) -> &[MessageKind] {
        &self.kinds
    }

    fn can_handle(&self, message: &Message) -> bool {
        self.offered.fetch_add(1, Ordering::SeqCst);
        self.accept_token
            .as_deref()
            .map_or(true, |token| message.mentions(token))
    }

    async fn handle(&mut self, message: &Message, _ctx: &AgentContext) -> anyhow::Result<()> {
        let text = message
            .text_content()
            .map_or_else(|| message.payload().to_string(), ToString::to_string);
        self.handled.lock().push(format!("{}:{text}", self.name));
        if self.fail {
            bail!("{} refused the message", self.name);
        }
        Ok(())
    }
}

/// A behavior that counts how often it acted.
#[derive(Debug, Clone)]
pub struct CountingBehavior {
    pub name: String,
    pub interval: Duration,
    pub last_fired: Option<Instant>,
    pub fail: bool,
    pub acted: Arc<AtomicUsize>,
}

impl CountingBehavior {
    pub fn new(name: &str, interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            interval,
            last_fired: None,
            fail: false,
            acted: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn count(&self) -> usize {
        self.acted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Behavior for CountingBehavior {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_act(&self, now: Instant) -> bool {
        self.last_fired
            .map_or(true, |fired| now.duration_since(fired) >= self.interval)
    }

    async fn act(&mut self, _ctx: &AgentContext) -> anyhow::Result<()> {
        self.last_fired = Some(Instant::now());
        self.acted.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("{} failed", self.name);
        }
        Ok(())
    }
}

pub const SOURCE: &str = "0x1111111111111111111111111111111111111111";
pub const TARGET: &str = "0x2222222222222222222222222222222222222222";
pub const TOKEN: &str = "0x3333333333333333333333333333333333333333";

/// A job from `SOURCE` to `TARGET` on behalf of `agent`.
pub fn transfer_job(agent: &str, amount: u128) -> TransferJob {
    TransferJob {
        ledger_endpoint: "http://localhost:8545".to_string(),
        token_identifier: TOKEN.to_string(),
        source_identity: SOURCE.to_string(),
        target_identity: TARGET.to_string(),
        signing_credential: "0xsecret".to_string(),
        amount,
        requesting_agent: agent.to_string(),
    }
}

pub fn template() -> TransferTemplate {
    TransferTemplate {
        ledger_endpoint: "http://localhost:8545".to_string(),
        token_identifier: TOKEN.to_string(),
        source_identity: SOURCE.to_string(),
        target_identity: TARGET.to_string(),
        signing_credential: "0xsecret".to_string(),
    }
}

/// Polls `condition` every 10 ms until it holds or `limit` elapses.
pub async fn eventually(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
