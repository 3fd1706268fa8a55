//! Poll Scheduler: drives the Mailbox Scanner across all registered
//! subscribers on a fixed period.
//!
//! Each cycle snapshots the registry and fans out one task per
//! subscriber, bounded by a semaphore so a slow mailbox cannot pile up
//! unbounded work. Every per-subscriber failure is caught at the
//! subscriber boundary; the cycle and the process always continue.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::gmail::MailboxApi;
use crate::models::Subscriber;
use crate::oauth::OAuthManager;
use crate::registry::SubscriberRegistry;
use crate::services::scan_service::{self, OtpHit};
use crate::telegram::types::SendMessageRequest;
use crate::telegram::DispatcherHandle;

const MAX_CONCURRENT_SCANS: usize = 8;

pub struct PollContext {
    pub registry: Arc<SubscriberRegistry>,
    pub oauth: Arc<OAuthManager>,
    pub mailbox: Arc<dyn MailboxApi>,
    pub dispatcher: DispatcherHandle,
    pub interval: Duration,
    pub lookback: Duration,
    pub max_results: u32,
    pub delete_after: Duration,
}

/// Start the scheduler loop for the process lifetime.
pub fn start(ctx: PollContext) {
    let ctx = Arc::new(ctx);
    tokio::spawn(async move {
        let limit = Arc::new(Semaphore::new(MAX_CONCURRENT_SCANS));
        info!(
            interval_secs = ctx.interval.as_secs(),
            "starting otp poll scheduler"
        );
        loop {
            let tick_start = Instant::now();
            run_cycle(ctx.clone(), limit.clone()).await;
            // sleep whatever remains of the fixed interval
            let sleep = ctx.interval.saturating_sub(tick_start.elapsed());
            tokio::time::sleep(sleep.max(Duration::from_millis(1))).await;
        }
    });
}

/// Run a single poll cycle over a snapshot of the registry.
pub async fn run_cycle(ctx: Arc<PollContext>, limit: Arc<Semaphore>) {
    let subs = ctx.registry.snapshot().await;
    let mut tasks = Vec::with_capacity(subs.len());

    for sub in subs {
        let ctx = ctx.clone();
        let limit = limit.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = match limit.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            if let Err(e) = process_subscriber(&ctx, &sub).await {
                warn!(account = %sub.account_id, error = %e, "poll failed for subscriber");
            }
        }));
    }

    for task in tasks {
        let _ = task.await;
    }
}

async fn process_subscriber(ctx: &PollContext, sub: &Subscriber) -> anyhow::Result<()> {
    let (tokens, changed) = ctx.oauth.ensure_valid(&sub.credential).await?;
    if changed {
        ctx.registry
            .set_credential(&sub.account_id, tokens.clone())
            .await;
    }

    let window_start = chrono::Utc::now().timestamp() - ctx.lookback.as_secs() as i64;
    let hits = scan_service::scan_mailbox(
        ctx.mailbox.as_ref(),
        &tokens.access_token,
        window_start,
        &sub.seen,
        ctx.max_results,
    )
    .await?;

    // in mailbox order for this subscriber; no ordering across subscribers
    for hit in hits {
        let req = SendMessageRequest {
            chat_id: sub.chat_id,
            text: notification_text(&hit, ctx.delete_after),
            parse_mode: Some("Markdown".into()),
            reply_markup: None,
        };
        match ctx.dispatcher.send_and_wait(req, Some(ctx.delete_after)).await {
            Ok(message_id) => {
                // seen and counter merge only after the channel accepted
                // the notification; a failed dispatch retries next cycle.
                // Both updates are no-ops if the subscriber logged out
                // while this scan was in flight.
                ctx.registry.increment_otp_count(&sub.account_id).await;
                ctx.registry.add_seen(&sub.account_id, &hit.message_id).await;
                tracing::debug!(
                    account = %sub.account_id,
                    message_id,
                    "otp relayed"
                );
            }
            Err(e) => {
                warn!(
                    account = %sub.account_id,
                    error = %e,
                    "otp delivery failed, will retry next cycle"
                );
            }
        }
    }

    Ok(())
}

fn notification_text(hit: &OtpHit, delete_after: Duration) -> String {
    let mut text = format!("\u{1F6A8} New OTP received\n\n\u{1F522} Code: `{}`", hit.code);
    if !hit.sender.is_empty() {
        text.push_str(&format!("\n\u{1F4E8} From: {}", hit.sender));
    }
    if !hit.subject.is_empty() {
        text.push_str(&format!("\n\u{1F4DD} Subject: {}", hit.subject));
    }
    text.push_str(&format!(
        "\n\n\u{23F0} Auto-deletes in {} seconds",
        delete_after.as_secs()
    ));
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_text_includes_code_and_headers() {
        let hit = OtpHit {
            message_id: "m1".into(),
            code: "824193".into(),
            sender: "noreply@service.example".into(),
            subject: "Your code".into(),
            internal_ts: 0,
        };
        let text = notification_text(&hit, Duration::from_secs(120));
        assert!(text.contains("`824193`"));
        assert!(text.contains("noreply@service.example"));
        assert!(text.contains("Your code"));
        assert!(text.contains("120 seconds"));
    }

    #[test]
    fn notification_text_omits_empty_headers() {
        let hit = OtpHit {
            message_id: "m1".into(),
            code: "4321".into(),
            sender: String::new(),
            subject: String::new(),
            internal_ts: 0,
        };
        let text = notification_text(&hit, Duration::from_secs(60));
        assert!(!text.contains("From:"));
        assert!(!text.contains("Subject:"));
    }
}
