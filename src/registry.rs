//! Concurrent subscriber registry.
//!
//! Shared by the poll loop, the Telegram handlers, and the OAuth
//! callback surface; passed around as an `Arc` rather than living in a
//! process-wide static. Field updates are atomic per subscriber under
//! the registry lock; no cross-subscriber transaction exists or is
//! needed.

use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::RegistryError;
use crate::models::Subscriber;
use crate::oauth::OAuthTokens;

#[derive(Default)]
pub struct SubscriberRegistry {
    inner: RwLock<HashMap<String, Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a subscriber keyed by account id.
    ///
    /// Re-registering the same account replaces its record. A chat
    /// destination held by a *different* account is rejected; callers
    /// remove the stale mapping first (logout-before-login invariant).
    pub async fn put(&self, sub: Subscriber) -> Result<(), RegistryError> {
        let mut map = self.inner.write().await;
        let collision = map
            .values()
            .any(|s| s.chat_id == sub.chat_id && s.account_id != sub.account_id);
        if collision {
            return Err(RegistryError::DestinationInUse(sub.chat_id));
        }
        map.insert(sub.account_id.clone(), sub);
        Ok(())
    }

    pub async fn get(&self, account_id: &str) -> Option<Subscriber> {
        self.inner.read().await.get(account_id).cloned()
    }

    pub async fn get_by_chat(&self, chat_id: i64) -> Option<Subscriber> {
        self.inner
            .read()
            .await
            .values()
            .find(|s| s.chat_id == chat_id)
            .cloned()
    }

    pub async fn remove(&self, account_id: &str) -> Option<Subscriber> {
        self.inner.write().await.remove(account_id)
    }

    pub async fn remove_by_chat(&self, chat_id: i64) -> Option<Subscriber> {
        let mut map = self.inner.write().await;
        let account_id = map
            .values()
            .find(|s| s.chat_id == chat_id)
            .map(|s| s.account_id.clone())?;
        map.remove(&account_id)
    }

    /// Defensive copy for safe iteration while the map keeps mutating.
    /// Ordered by connection time so cycles visit subscribers stably.
    pub async fn snapshot(&self) -> Vec<Subscriber> {
        let mut subs: Vec<Subscriber> = self.inner.read().await.values().cloned().collect();
        subs.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.account_id.cmp(&b.account_id))
        });
        subs
    }

    /// In-place updates below are silently ignored for subscribers
    /// removed while a scan of them was in flight; a removed subscriber
    /// is never resurrected by late results.
    pub async fn set_credential(&self, account_id: &str, tokens: OAuthTokens) -> bool {
        match self.inner.write().await.get_mut(account_id) {
            Some(sub) => {
                sub.credential = tokens;
                true
            }
            None => false,
        }
    }

    pub async fn add_seen(&self, account_id: &str, message_id: &str) -> bool {
        match self.inner.write().await.get_mut(account_id) {
            Some(sub) => {
                sub.seen.insert(message_id.to_string());
                true
            }
            None => false,
        }
    }

    pub async fn increment_otp_count(&self, account_id: &str) -> bool {
        match self.inner.write().await.get_mut(account_id) {
            Some(sub) => {
                sub.otp_count += 1;
                true
            }
            None => false,
        }
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }
}
