use std::sync::Arc;

use super::{run_blocking, ChatMessage, MessageStore, RelayError};

/// Persistence side of the relay: writes chat messages and reads history.
#[derive(Clone)]
pub struct MessageRelay {
    store: Arc<dyn MessageStore>,
}

impl MessageRelay {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    pub async fn persist(&self, from: &str, to: &str, text: &str) -> Result<ChatMessage, RelayError> {
        let store = self.store.clone();
        let (f, t, body) = (from.to_string(), to.to_string(), text.to_string());
        let sent_at = run_blocking(move || store.save(&f, &t, &body)).await?;

        Ok(ChatMessage {
            from: from.to_string(),
            to: to.to_string(),
            text: text.to_string(),
            sent_at,
        })
    }

    /// The `limit` messages between `a` and `b` that precede the `skip` most
    /// recent ones, oldest first.
    pub async fn history(
        &self,
        a: &str,
        b: &str,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RelayError> {
        let store = self.store.clone();
        let (a, b) = (a.to_string(), b.to_string());
        let mut messages = run_blocking(move || store.query(&a, &b, skip, limit)).await?;

        // The store windows newest-first; callers read oldest-first.
        // Reversing first keeps insertion order among equal timestamps.
        messages.reverse();
        messages.sort_by_key(|m| m.sent_at);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::testing::MemoryStore;

    #[tokio::test]
    async fn test_persist_stamps_message() {
        let store = MemoryStore::with_users(&["alice", "bob"]);
        let relay = MessageRelay::new(store.clone());

        let message = relay.persist("bob", "alice", "hi").await.unwrap();

        assert_eq!(message.from, "bob");
        assert_eq!(message.to, "alice");
        assert_eq!(message.text, "hi");
        assert_eq!(store.messages(), vec![message]);
    }

    #[tokio::test]
    async fn test_persist_unknown_receiver_fails() {
        let store = MemoryStore::with_users(&["bob"]);
        let relay = MessageRelay::new(store.clone());

        let err = relay.persist("bob", "zzz", "hi").await.unwrap_err();

        assert!(matches!(err, RelayError::UnknownUser(ref login) if login == "zzz"));
        assert!(store.messages().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_oldest_first_and_short() {
        let store = MemoryStore::with_users(&["alice", "bob", "carol"]);
        let relay = MessageRelay::new(store.clone());
        for text in ["one", "two", "three"] {
            relay.persist("alice", "bob", text).await.unwrap();
        }
        relay.persist("carol", "bob", "elsewhere").await.unwrap();
        relay.persist("bob", "alice", "four").await.unwrap();

        let history = relay.history("alice", "bob", 0, 10).await.unwrap();

        let texts: Vec<_> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three", "four"]);
        assert!(history.windows(2).all(|w| w[0].sent_at <= w[1].sent_at));
    }

    #[tokio::test]
    async fn test_history_window_skips_newest() {
        let store = MemoryStore::with_users(&["alice", "bob"]);
        let relay = MessageRelay::new(store);
        for i in 0..6 {
            relay.persist("alice", "bob", &format!("m{}", i)).await.unwrap();
        }

        let history = relay.history("bob", "alice", 2, 3).await.unwrap();

        let texts: Vec<_> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["m1", "m2", "m3"]);
    }
}
