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

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::message::Message;

/// An unbounded FIFO buffer of [`Message`]s shared between agents.
///
/// Cloning a `MessageBox` yields another handle to the same buffer; this is how
/// one agent's inbox becomes its peer's outbox. `put` and `get` each take the
/// lock for a single push or pop and never wait on anything else while holding it.
#[derive(Debug, Clone, Default)]
pub struct MessageBox {
    messages: Arc<Mutex<VecDeque<Message>>>,
}

impl MessageBox {
    /// Creates an empty box.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message at the tail.
    pub fn put(&self, message: Message) {
        self.messages.lock().push_back(message);
    }

    /// Removes and returns the head, or `None` when the box is empty.
    pub fn get(&self) -> Option<Message> {
        self.messages.lock().pop_front()
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// True when both handles refer to the same underlying buffer.
    pub fn same_box(&self, other: &MessageBox) -> bool {
        Arc::ptr_eq(&self.messages, &other.messages)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn get_returns_messages_in_put_order() {
        let inbox = MessageBox::new();
        for word in ["one", "two", "three"] {
            inbox.put(Message::text(word));
        }
        let drained: Vec<_> = std::iter::from_fn(|| inbox.get())
            .map(|m| m.text_content().unwrap().to_string())
            .collect();
        assert_eq!(drained, vec!["one", "two", "three"]);
    }

    #[test]
    fn get_on_empty_box_returns_none() {
        let inbox = MessageBox::new();
        assert!(inbox.get().is_none());
        assert!(inbox.is_empty());
    }

    #[test]
    fn clones_share_one_buffer() {
        let inbox = MessageBox::new();
        let peer_outbox = inbox.clone();
        peer_outbox.put(Message::text("ping"));
        assert!(inbox.same_box(&peer_outbox));
        assert_eq!(inbox.get().unwrap().text_content(), Some("ping"));
    }

    #[test]
    fn concurrent_producers_keep_per_producer_order() {
        let inbox = MessageBox::new();
        let producers: Vec<_> = (0..4)
            .map(|producer| {
                let outbox = inbox.clone();
                thread::spawn(move || {
                    for n in 0..250 {
                        outbox.put(Message::new(
                            crate::message::MessageKind::Text,
                            serde_json::json!([producer, n]),
                        ));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        assert_eq!(inbox.len(), 1_000);
        let mut last_seen = [-1_i64; 4];
        while let Some(message) = inbox.get() {
            let producer = message.payload()[0].as_u64().unwrap() as usize;
            let n = message.payload()[1].as_i64().unwrap();
            assert!(n > last_seen[producer]);
            last_seen[producer] = n;
        }
        assert_eq!(last_seen, [249; 4]);
    }
}
