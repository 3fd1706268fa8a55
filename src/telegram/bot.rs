//! Inbound update loop and chat command/button handlers.
//!
//! Long-polls `getUpdates` and hands each update to its own task; all
//! outbound traffic goes back through the dispatcher handle, so the
//! channel run-context stays the single owner of outbound I/O.

use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::gmail::MailboxApi;
use crate::oauth::OAuthManager;
use crate::registry::SubscriberRegistry;
use crate::services::scan_service;

use super::client::BotApi;
use super::dispatch::DispatcherHandle;
use super::types::{
    CallbackQuery, EditMessageTextRequest, InlineKeyboardButton, InlineKeyboardMarkup, Message,
    SendMessageRequest, Update,
};

const POLL_TIMEOUT_SECS: u64 = 30;
const ERROR_RETRY_DELAY_SECS: u64 = 5;
/// Inbound user messages are cleaned up after this long.
const INBOUND_DELETE_SECS: u64 = 30;
/// Menus and status replies stick around a bit longer.
const MENU_DELETE_SECS: u64 = 120;
/// Result cap for on-demand latest-OTP lookups.
const ON_DEMAND_MAX_RESULTS: u32 = 5;

pub struct BotContext {
    pub registry: Arc<SubscriberRegistry>,
    pub oauth: Arc<OAuthManager>,
    pub mailbox: Arc<dyn MailboxApi>,
    pub dispatcher: DispatcherHandle,
    /// Public base URL for the connect link.
    pub base_url: String,
    pub lookback: Duration,
}

/// Spawn the inbound long-polling loop.
pub fn start(api: Arc<dyn BotApi>, ctx: BotContext) {
    let ctx = Arc::new(ctx);
    tokio::spawn(async move {
        let mut offset: i64 = 0;
        info!("starting telegram update loop");
        loop {
            match api.get_updates(Some(offset), POLL_TIMEOUT_SECS).await {
                Ok(updates) => {
                    for update in updates {
                        // advance past this update whether or not
                        // handling succeeds
                        offset = update.update_id + 1;
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            handle_update(update, ctx).await;
                        });
                    }
                }
                Err(e) => {
                    warn!(error = %e, "getUpdates failed");
                    tokio::time::sleep(Duration::from_secs(ERROR_RETRY_DELAY_SECS)).await;
                }
            }
        }
    });
}

async fn handle_update(update: Update, ctx: Arc<BotContext>) {
    if let Some(msg) = update.message {
        handle_message(msg, &ctx).await;
    } else if let Some(cb) = update.callback_query {
        handle_callback(cb, &ctx).await;
    }
}

async fn handle_message(msg: Message, ctx: &BotContext) {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text.as_deref() else {
        return;
    };

    if text.starts_with("/start") {
        // the /start command itself gets cleaned up quickly
        let _ = ctx
            .dispatcher
            .schedule_delete(
                chat_id,
                msg.message_id,
                Duration::from_secs(INBOUND_DELETE_SECS),
            )
            .await;
        send_main_menu(ctx, chat_id).await;
    } else if !text.starts_with('/') {
        // stray chatter is swept away, nothing else to do with it
        let _ = ctx
            .dispatcher
            .schedule_delete(
                chat_id,
                msg.message_id,
                Duration::from_secs(INBOUND_DELETE_SECS),
            )
            .await;
    }
}

async fn send_main_menu(ctx: &BotContext, chat_id: i64) {
    let req = match ctx.registry.get_by_chat(chat_id).await {
        Some(sub) => SendMessageRequest {
            chat_id,
            text: format!(
                "Welcome back!\n\n\u{1F4E7} Connected account: `{}`",
                sub.account_id
            ),
            parse_mode: Some("Markdown".into()),
            reply_markup: Some(main_menu_keyboard()),
        },
        None => SendMessageRequest {
            chat_id,
            text: "OTP relay\n\nConnect your Gmail account and one-time \
                   passcodes from your inbox will be forwarded here, then \
                   auto-deleted."
                .into(),
            parse_mode: None,
            reply_markup: Some(connect_keyboard(&ctx.base_url, chat_id)),
        },
    };
    if let Err(e) = ctx
        .dispatcher
        .send(req, Some(Duration::from_secs(MENU_DELETE_SECS)))
        .await
    {
        warn!(chat_id, error = %e, "menu delivery failed");
    }
}

async fn handle_callback(cb: CallbackQuery, ctx: &BotContext) {
    let _ = ctx.dispatcher.answer_callback(&cb.id).await;

    let Some(msg) = cb.message else {
        return;
    };
    let chat_id = msg.chat.id;
    let message_id = msg.message_id;
    let data = cb.data.as_deref().unwrap_or_default();

    match data {
        "generate_connected" => {
            let text = match ctx.registry.get_by_chat(chat_id).await {
                Some(sub) => format!(
                    "\u{1F4E7} Address: `{}`\n\u{1F500} Mixed case: `{}`\n\n\
                     Gmail treats both as the same inbox.",
                    sub.account_id,
                    mixed_case_variation(&sub.account_id)
                ),
                None => "No account connected. Use /start to connect.".to_string(),
            };
            edit(ctx, chat_id, message_id, text, Some(main_menu_keyboard())).await;
        }
        "refresh_otp" => {
            edit(
                ctx,
                chat_id,
                message_id,
                "\u{1F50D} Scanning for the latest OTP\u{2026}".into(),
                None,
            )
            .await;
            let text = latest_otp_text(ctx, chat_id).await;
            edit(ctx, chat_id, message_id, text, Some(main_menu_keyboard())).await;
        }
        "stats" => {
            let text = match ctx.registry.get_by_chat(chat_id).await {
                Some(sub) => format!(
                    "\u{1F4CA} Stats\n\n\u{1F4E7} Account: `{}`\n\u{1F522} OTPs delivered: `{}`",
                    sub.account_id, sub.otp_count
                ),
                None => "No account data found.".to_string(),
            };
            edit(
                ctx,
                chat_id,
                message_id,
                text,
                Some(back_keyboard()),
            )
            .await;
        }
        "logout" => match ctx.registry.remove_by_chat(chat_id).await {
            Some(sub) => {
                info!(account = %sub.account_id, chat_id, "subscriber logged out");
                edit(
                    ctx,
                    chat_id,
                    message_id,
                    "\u{2705} Disconnected. Your account is no longer watched.".into(),
                    Some(connect_keyboard(&ctx.base_url, chat_id)),
                )
                .await;
            }
            None => {
                edit(
                    ctx,
                    chat_id,
                    message_id,
                    "No account to disconnect.".into(),
                    None,
                )
                .await;
            }
        },
        "help" => {
            edit(
                ctx,
                chat_id,
                message_id,
                "How it works:\n\n1. Connect your Gmail account\n2. Codes \
                 from unread mail are forwarded here automatically\n3. \
                 Forwarded messages self-delete after a couple of minutes"
                    .into(),
                Some(back_keyboard()),
            )
            .await;
        }
        "back_main" => {
            let (text, keyboard) = match ctx.registry.get_by_chat(chat_id).await {
                Some(sub) => (
                    format!("\u{1F4E7} Connected account: `{}`", sub.account_id),
                    main_menu_keyboard(),
                ),
                None => (
                    "Connect your Gmail account to start.".to_string(),
                    connect_keyboard(&ctx.base_url, chat_id),
                ),
            };
            edit(ctx, chat_id, message_id, text, Some(keyboard)).await;
        }
        other => {
            warn!(chat_id, data = other, "unknown callback data");
        }
    }
}

/// On-demand lookup of the most recent OTP in the lookback window.
/// Ignores the dedup set and leaves it untouched.
async fn latest_otp_text(ctx: &BotContext, chat_id: i64) -> String {
    let Some(sub) = ctx.registry.get_by_chat(chat_id).await else {
        return "No account connected. Use /start to connect.".to_string();
    };

    let tokens = match ctx.oauth.ensure_valid(&sub.credential).await {
        Ok((tokens, changed)) => {
            if changed {
                ctx.registry
                    .set_credential(&sub.account_id, tokens.clone())
                    .await;
            }
            tokens
        }
        Err(e) => {
            warn!(account = %sub.account_id, error = %e, "credential check failed");
            return "Could not reach your mailbox; try reconnecting via /start.".to_string();
        }
    };

    let window_start = chrono::Utc::now().timestamp() - ctx.lookback.as_secs() as i64;
    let hits = match scan_service::scan_mailbox(
        ctx.mailbox.as_ref(),
        &tokens.access_token,
        window_start,
        &HashSet::new(),
        ON_DEMAND_MAX_RESULTS,
    )
    .await
    {
        Ok(hits) => hits,
        Err(e) => {
            warn!(account = %sub.account_id, error = %e, "on-demand scan failed");
            return "Mailbox scan failed; try again in a moment.".to_string();
        }
    };

    match hits.into_iter().max_by_key(|h| h.internal_ts) {
        Some(hit) => {
            let mut text = format!("\u{2705} OTP found\n\n\u{1F522} Code: `{}`", hit.code);
            if !hit.sender.is_empty() {
                text.push_str(&format!("\n\u{1F4E8} From: {}", hit.sender));
            }
            if !hit.subject.is_empty() {
                text.push_str(&format!("\n\u{1F4DD} Subject: {}", hit.subject));
            }
            text
        }
        None => format!(
            "\u{1F4E7} `{}`\n\nNo new OTPs found in the last hour.",
            sub.account_id
        ),
    }
}

async fn edit(
    ctx: &BotContext,
    chat_id: i64,
    message_id: i64,
    text: String,
    reply_markup: Option<InlineKeyboardMarkup>,
) {
    let req = EditMessageTextRequest {
        chat_id,
        message_id,
        text,
        parse_mode: Some("Markdown".into()),
        reply_markup,
    };
    if let Err(e) = ctx.dispatcher.edit(req).await {
        warn!(chat_id, error = %e, "edit enqueue failed");
    }
}

pub fn main_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![InlineKeyboardButton::callback(
                "\u{1F500} Mixed-case address",
                "generate_connected",
            )],
            vec![InlineKeyboardButton::callback(
                "\u{1F50D} Check latest OTP",
                "refresh_otp",
            )],
            vec![InlineKeyboardButton::callback("\u{1F4CA} Stats", "stats")],
            vec![InlineKeyboardButton::callback("\u{1F6AA} Logout", "logout")],
        ],
    }
}

pub fn connect_keyboard(base_url: &str, chat_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![InlineKeyboardButton::url(
                "\u{1F517} Connect Google account",
                format!("{}/connect/{}", base_url.trim_end_matches('/'), chat_id),
            )],
            vec![InlineKeyboardButton::callback("\u{2139} How to use", "help")],
        ],
    }
}

fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![InlineKeyboardButton::callback(
            "\u{1F519} Back",
            "back_main",
        )]],
    }
}

/// Randomly upper/lower-case an address. Gmail addresses are
/// case-insensitive, so the variation lands in the same inbox while
/// looking distinct to whoever it is handed out to.
pub fn mixed_case_variation(email: &str) -> String {
    let mut rng = rand::thread_rng();
    email
        .chars()
        .map(|c| {
            if rng.gen_bool(0.5) {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_case_preserves_the_address() {
        let varied = mixed_case_variation("user@gmail.com");
        assert_eq!(varied.to_lowercase(), "user@gmail.com");
        assert_eq!(varied.len(), "user@gmail.com".len());
    }

    #[test]
    fn connect_keyboard_links_to_the_chat() {
        let kb = connect_keyboard("http://localhost:5000/", 42);
        let url = kb.inline_keyboard[0][0].url.as_deref().unwrap();
        assert_eq!(url, "http://localhost:5000/connect/42");
    }
}
