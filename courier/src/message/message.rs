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

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind tag every [`Message`] carries; handlers register against kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Free-form text exchanged between agents.
    Text,
    /// A request to move tokens.
    #[serde(rename = "transaction")]
    TransactionRequest,
    /// A request to look up a balance.
    BalanceCheck,
}

impl MessageKind {
    /// Every kind, in declaration order.
    pub const ALL: [MessageKind; 3] = [
        MessageKind::Text,
        MessageKind::TransactionRequest,
        MessageKind::BalanceCheck,
    ];
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Text => "text",
            MessageKind::TransactionRequest => "transaction",
            MessageKind::BalanceCheck => "balance_check",
        };
        f.write_str(name)
    }
}

/// An immutable record passed between agents.
///
/// The payload is opaque to the messaging layer; handlers decide how to read
/// it. Fields are private so a message cannot change after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    kind: MessageKind,
    payload: Value,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a message stamped with the current time.
    pub fn new(kind: MessageKind, payload: impl Into<Value>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            created_at: Utc::now(),
        }
    }

    /// Creates a [`MessageKind::Text`] message.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Text, Value::String(content.into()))
    }

    /// The message's kind.
    #[inline]
    pub const fn kind(&self) -> MessageKind {
        self.kind
    }

    /// The raw payload.
    #[inline]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// The payload as text, when it is a string.
    pub fn text_content(&self) -> Option<&str> {
        self.payload.as_str()
    }

    /// When the message was created.
    #[inline]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True when the payload is text containing `token`, ignoring case.
    pub fn mentions(&self, token: &str) -> bool {
        self.text_content()
            .is_some_and(|text| text.to_lowercase().contains(&token.to_lowercase()))
    }
}
