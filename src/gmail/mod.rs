//! Mailbox API boundary.
//!
//! The scanner only sees [`MailboxApi`]; [`GmailClient`] implements it
//! against the Gmail REST v1 surface. All three calls are fallible
//! remote calls and surface as [`ScanError`].

pub mod types;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::error::ScanError;
use types::{FullMessage, MailMessage, MessageList};

#[async_trait]
pub trait MailboxApi: Send + Sync {
    /// List ids of unread messages received on or after `since_unix`
    /// (seconds), newest first, capped at `max_results`.
    async fn list_unread(
        &self,
        access_token: &str,
        since_unix: i64,
        max_results: u32,
    ) -> Result<Vec<String>, ScanError>;

    async fn get_message(&self, access_token: &str, id: &str) -> Result<MailMessage, ScanError>;

    /// Clear the unread flag. Best-effort from the scanner's point of
    /// view; callers log and continue on failure.
    async fn mark_read(&self, access_token: &str, id: &str) -> Result<(), ScanError>;
}

pub struct GmailClient {
    http: Client,
    base_url: String,
}

impl GmailClient {
    pub fn new() -> Self {
        Self::with_base_url("https://gmail.googleapis.com".to_string())
    }

    /// Point the client at a custom base URL (for testing).
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }
}

impl Default for GmailClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailboxApi for GmailClient {
    async fn list_unread(
        &self,
        access_token: &str,
        since_unix: i64,
        max_results: u32,
    ) -> Result<Vec<String>, ScanError> {
        let url = format!("{}/gmail/v1/users/me/messages", self.base_url);
        let query = format!("is:unread after:{since_unix}");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("q", query.as_str()),
                ("maxResults", &max_results.to_string()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ScanError::Api(format!("list returned {}", resp.status())));
        }

        let list: MessageList = resp.json().await?;
        debug!(count = list.messages.len(), "listed unread messages");
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_message(&self, access_token: &str, id: &str) -> Result<MailMessage, ScanError> {
        let url = format!("{}/gmail/v1/users/me/messages/{}", self.base_url, id);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("format", "full")])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ScanError::Api(format!(
                "get message {id} returned {}",
                resp.status()
            )));
        }

        let full: FullMessage = resp.json().await?;
        Ok(full.into())
    }

    async fn mark_read(&self, access_token: &str, id: &str) -> Result<(), ScanError> {
        let url = format!("{}/gmail/v1/users/me/messages/{}/modify", self.base_url, id);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "removeLabelIds": ["UNREAD"] }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ScanError::Api(format!(
                "modify {id} returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
