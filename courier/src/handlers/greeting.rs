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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::agent::AgentContext;
use crate::message::{Message, MessageKind};
use crate::traits::MessageHandler;

/// Logs every text message that mentions the greeting token.
#[derive(Debug, Clone)]
pub struct GreetingHandler {
    token: String,
    greetings: Arc<AtomicUsize>,
}

impl GreetingHandler {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            greetings: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A shared counter of the greetings handled so far. It stays valid after
    /// the handler has been moved into an agent.
    pub fn greetings(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.greetings)
    }
}

impl Default for GreetingHandler {
    fn default() -> Self {
        Self::new("hello")
    }
}

#[async_trait]
impl MessageHandler for GreetingHandler {
    fn name(&self) -> &str {
        "greeting"
    }

    fn supported_kinds(&self) -> &[MessageKind] {
        &[MessageKind::Text]
    }

    fn can_handle(&self, message: &Message) -> bool {
        message.kind() == MessageKind::Text && message.mentions(&self.token)
    }

    async fn handle(&mut self, message: &Message, ctx: &AgentContext) -> anyhow::Result<()> {
        self.greetings.fetch_add(1, Ordering::SeqCst);
        info!(
            "Hello message received by {}: '{}'",
            ctx.name(),
            message.text_content().unwrap_or_default()
        );
        Ok(())
    }
}
