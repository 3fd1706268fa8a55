use anyhow::Result;
use std::sync::Arc;

use otp_relay_hub::config::Config;
use otp_relay_hub::gmail::{GmailClient, MailboxApi};
use otp_relay_hub::oauth::{OAuthConfig, OAuthManager};
use otp_relay_hub::registry::SubscriberRegistry;
use otp_relay_hub::routes::{self, AppState};
use otp_relay_hub::services::poll_service::{self, PollContext};
use otp_relay_hub::telegram::bot::BotContext;
use otp_relay_hub::telegram::{bot, dispatch, BotApi, TelegramClient};
use otp_relay_hub::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::from_env()?;

    let registry = Arc::new(SubscriberRegistry::new());
    let oauth = Arc::new(OAuthManager::new(OAuthConfig::google(
        cfg.google_client_id.clone(),
        cfg.google_client_secret.clone(),
        &cfg.base_url,
    ))?);
    let mailbox: Arc<dyn MailboxApi> =
        Arc::new(GmailClient::with_base_url(cfg.gmail_base_url.clone()));

    let api: Arc<dyn BotApi> = Arc::new(TelegramClient::new(&cfg.bot_token));
    let me = api
        .get_me()
        .await
        .map_err(|e| anyhow::anyhow!("telegram bot token rejected: {e}"))?;
    tracing::info!(bot = %me.first_name, "telegram bot authenticated");

    let dispatcher = dispatch::spawn(api.clone());

    bot::start(
        api,
        BotContext {
            registry: registry.clone(),
            oauth: oauth.clone(),
            mailbox: mailbox.clone(),
            dispatcher: dispatcher.clone(),
            base_url: cfg.base_url.clone(),
            lookback: cfg.lookback,
        },
    );

    poll_service::start(PollContext {
        registry: registry.clone(),
        oauth: oauth.clone(),
        mailbox,
        dispatcher: dispatcher.clone(),
        interval: cfg.poll_interval,
        lookback: cfg.lookback,
        max_results: cfg.max_results,
        delete_after: cfg.delete_after,
    });

    let state = AppState {
        registry,
        oauth,
        dispatcher,
    };
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!(addr = %cfg.bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
