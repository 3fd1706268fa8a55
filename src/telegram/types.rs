//! Telegram Bot API types for the subset this service uses.

use serde::{Deserialize, Serialize};

/// Wrapper for all Bot API responses:
/// `{ ok: bool, result?: T, description?: String }`.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

/// A single update from the `getUpdates` long-polling endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
    pub username: Option<String>,
}

/// Inline-keyboard button press.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    /// The message the pressed keyboard was attached to.
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl InlineKeyboardButton {
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: Some(url.into()),
            callback_data: None,
        }
    }

    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
            callback_data: Some(data.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditMessageTextRequest {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_error_response() {
        let json = r#"{"ok": false, "description": "Unauthorized"}"#;
        let resp: TelegramResponse<User> = serde_json::from_str(json).unwrap();
        assert!(!resp.ok);
        assert!(resp.result.is_none());
        assert_eq!(resp.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn deserialize_update_with_message() {
        let json = r#"{
            "update_id": 100,
            "message": {
                "message_id": 42,
                "from": {"id": 999, "is_bot": false, "first_name": "Alice"},
                "chat": {"id": 999, "type": "private"},
                "text": "/start",
                "date": 1700000000
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert_eq!(update.update_id, 100);
        let msg = update.message.unwrap();
        assert_eq!(msg.text.as_deref(), Some("/start"));
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn deserialize_update_with_callback_query() {
        let json = r#"{
            "update_id": 101,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 999, "is_bot": false, "first_name": "Alice"},
                "message": {
                    "message_id": 7,
                    "chat": {"id": 999, "type": "private"},
                    "date": 1700000001
                },
                "data": "refresh_otp"
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let cb = update.callback_query.unwrap();
        assert_eq!(cb.data.as_deref(), Some("refresh_otp"));
        assert_eq!(cb.message.unwrap().chat.id, 999);
    }

    #[test]
    fn serialize_send_request_skips_absent_options() {
        let req = SendMessageRequest {
            chat_id: 42,
            text: "hello".into(),
            parse_mode: None,
            reply_markup: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["chat_id"], 42);
        assert!(json.get("parse_mode").is_none());
        assert!(json.get("reply_markup").is_none());
    }

    #[test]
    fn serialize_inline_keyboard() {
        let req = SendMessageRequest {
            chat_id: 1,
            text: "menu".into(),
            parse_mode: Some("Markdown".into()),
            reply_markup: Some(InlineKeyboardMarkup {
                inline_keyboard: vec![vec![
                    InlineKeyboardButton::callback("Stats", "stats"),
                    InlineKeyboardButton::url("Connect", "https://example.com/connect/1"),
                ]],
            }),
        };
        let json = serde_json::to_value(&req).unwrap();
        let row = &json["reply_markup"]["inline_keyboard"][0];
        assert_eq!(row[0]["callback_data"], "stats");
        assert!(row[0].get("url").is_none());
        assert_eq!(row[1]["url"], "https://example.com/connect/1");
        assert!(row[1].get("callback_data").is_none());
    }
}
