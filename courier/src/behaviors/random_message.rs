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

use std::time::{Duration, Instant};

use anyhow::bail;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use tracing::info;

use crate::agent::AgentContext;
use crate::common::BehaviorConfig;
use crate::message::Message;
use crate::traits::Behavior;

/// Every `interval`, sends the peer a text message made of two distinct words
/// sampled from a vocabulary.
#[derive(Debug)]
pub struct RandomMessageBehavior {
    interval: Duration,
    last_fired: Option<Instant>,
    vocabulary: Vec<String>,
    rng: StdRng,
}

impl RandomMessageBehavior {
    pub fn new(interval: Duration, vocabulary: Vec<String>) -> Self {
        Self {
            interval,
            last_fired: None,
            vocabulary,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn from_config(config: &BehaviorConfig) -> Self {
        Self::new(
            Duration::from_millis(config.random_message_interval_ms),
            config.vocabulary.clone(),
        )
    }

    /// Makes the word sequence reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Samples the next message without sending it.
    pub fn compose(&mut self) -> anyhow::Result<Message> {
        if self.vocabulary.len() < 2 {
            bail!(
                "vocabulary needs at least two words, has {}",
                self.vocabulary.len()
            );
        }
        let words: Vec<&str> = self
            .vocabulary
            .choose_multiple(&mut self.rng, 2)
            .map(String::as_str)
            .collect();
        Ok(Message::text(words.join(" ")))
    }
}

#[async_trait]
impl Behavior for RandomMessageBehavior {
    fn name(&self) -> &str {
        "random_message"
    }

    fn should_act(&self, now: Instant) -> bool {
        self.last_fired
            .map_or(true, |fired| now.duration_since(fired) >= self.interval)
    }

    async fn act(&mut self, ctx: &AgentContext) -> anyhow::Result<()> {
        self.last_fired = Some(Instant::now());
        let message = self.compose()?;
        info!(
            "Agent {} generated message: '{}'",
            ctx.name(),
            message.text_content().unwrap_or_default()
        );
        ctx.send(message);
        Ok(())
    }
}
