use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::oauth::OAuthTokens;

/// One connected account: its notification destination, refreshable
/// credential, dedup state, and delivery counter.
///
/// `account_id` (normalized email) is the primary key; `chat_id` is
/// unique among currently registered subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub account_id: String,
    pub chat_id: i64,
    pub credential: OAuthTokens,
    /// Message ids already relayed; membership is the dedup gate.
    pub seen: HashSet<String>,
    pub otp_count: u64,
    pub connected_at: i64,
}

impl Subscriber {
    pub fn new(account_id: String, chat_id: i64, credential: OAuthTokens) -> Self {
        Self {
            account_id,
            chat_id,
            credential,
            seen: HashSet::new(),
            otp_count: 0,
            connected_at: chrono::Utc::now().timestamp(),
        }
    }
}
