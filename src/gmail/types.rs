//! Wire types for the Gmail REST v1 subset this service consumes.

use serde::Deserialize;

/// `users/me/messages` list response. `messages` is absent entirely
/// when the query matches nothing.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageList {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub headers: Vec<MessageHeader>,
}

/// `users/me/messages/{id}?format=full` response, trimmed to the
/// fields the scanner reads. `internalDate` arrives as a decimal
/// string of epoch milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullMessage {
    pub id: String,
    #[serde(default)]
    pub snippet: String,
    pub internal_date: Option<String>,
    pub payload: Option<MessagePayload>,
}

/// Domain view of a fetched message, decoupled from the wire shape.
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub id: String,
    pub headers: Vec<(String, String)>,
    pub snippet: String,
    /// Epoch milliseconds.
    pub internal_ts: i64,
}

impl MailMessage {
    /// Case-insensitive header lookup (RFC header names are not
    /// case-normalized by Gmail).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl From<FullMessage> for MailMessage {
    fn from(msg: FullMessage) -> Self {
        let headers = msg
            .payload
            .map(|p| p.headers.into_iter().map(|h| (h.name, h.value)).collect())
            .unwrap_or_default();
        let internal_ts = msg
            .internal_date
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(0);
        MailMessage {
            id: msg.id,
            headers,
            snippet: msg.snippet,
            internal_ts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_empty_list() {
        let list: MessageList = serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(list.messages.is_empty());
    }

    #[test]
    fn deserialize_list_with_messages() {
        let json = r#"{
            "messages": [
                {"id": "m1", "threadId": "t1"},
                {"id": "m2", "threadId": "t2"}
            ],
            "resultSizeEstimate": 2
        }"#;
        let list: MessageList = serde_json::from_str(json).unwrap();
        assert_eq!(list.messages.len(), 2);
        assert_eq!(list.messages[0].id, "m1");
    }

    #[test]
    fn full_message_maps_to_mail_message() {
        let json = r#"{
            "id": "m1",
            "snippet": "Your code is 824193, thanks",
            "internalDate": "1700000000123",
            "payload": {
                "headers": [
                    {"name": "From", "value": "noreply@service.example"},
                    {"name": "SUBJECT", "value": "Your verification code"}
                ]
            }
        }"#;
        let full: FullMessage = serde_json::from_str(json).unwrap();
        let msg = MailMessage::from(full);
        assert_eq!(msg.internal_ts, 1_700_000_000_123);
        assert_eq!(msg.header("from"), Some("noreply@service.example"));
        assert_eq!(msg.header("subject"), Some("Your verification code"));
        assert_eq!(msg.header("to"), None);
    }

    #[test]
    fn message_without_payload_or_date() {
        let full: FullMessage = serde_json::from_str(r#"{"id": "m9"}"#).unwrap();
        let msg = MailMessage::from(full);
        assert!(msg.headers.is_empty());
        assert_eq!(msg.internal_ts, 0);
        assert_eq!(msg.snippet, "");
    }
}
