//! OAuth bootstrap surface: consent redirect and callback.

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect};
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::Subscriber;
use crate::telegram::bot::main_menu_keyboard;
use crate::telegram::types::SendMessageRequest;

use super::AppState;

/// Kick off the consent flow for a chat.
pub async fn start_oauth(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
) -> impl IntoResponse {
    match state.oauth.start_auth_flow(chat_id).await {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(e) => {
            warn!(chat_id, error = %e, "failed to start oauth flow");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to start authorization. Try again from Telegram.",
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct CallbackParams {
    code: String,
    state: String,
}

/// Exchange the authorization code, register the subscriber, and tell
/// the chat it is connected.
pub async fn oauth_callback(
    State(app): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    match connect_subscriber(&app, params).await {
        Ok(email) => Html(success_page(&email)).into_response(),
        Err(e) => {
            warn!(error = %e, "oauth callback failed");
            (
                StatusCode::BAD_REQUEST,
                format!("Authentication failed: {e}"),
            )
                .into_response()
        }
    }
}

async fn connect_subscriber(app: &AppState, params: CallbackParams) -> Result<String> {
    let (chat_id, tokens) = app.oauth.handle_callback(params.code, params.state).await?;
    let email = app.oauth.fetch_account_email(&tokens.access_token).await?;
    let account_id = email.trim().to_lowercase();

    // a chat re-connecting (possibly to a different account) drops its
    // stale mapping before the new subscriber lands
    if let Some(old) = app.registry.remove_by_chat(chat_id).await {
        info!(
            previous = %old.account_id,
            chat_id,
            "replacing existing subscriber for chat"
        );
    }
    app.registry
        .put(Subscriber::new(account_id.clone(), chat_id, tokens))
        .await?;
    info!(account = %account_id, chat_id, "subscriber connected");

    let req = SendMessageRequest {
        chat_id,
        text: format!("\u{2705} Connected\n\n\u{1F4E7} `{email}`"),
        parse_mode: Some("Markdown".into()),
        reply_markup: Some(main_menu_keyboard()),
    };
    if let Err(e) = app.dispatcher.send(req, None).await {
        warn!(chat_id, error = %e, "connected notice failed");
    }

    Ok(email)
}

fn success_page(email: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Connected</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
  <h1>Connected</h1>
  <p><code>{email}</code> is now watched for one-time passcodes.</p>
  <p>You can close this tab and return to Telegram.</p>
</body>
</html>"#
    )
}
