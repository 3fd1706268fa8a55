//! Mailbox Scanner: turns one subscriber's unread mail into OTP hits.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::gmail::MailboxApi;
use crate::otp;

/// One relayable passcode found in the mailbox.
#[derive(Debug, Clone)]
pub struct OtpHit {
    pub message_id: String,
    pub code: String,
    pub sender: String,
    pub subject: String,
    /// Epoch milliseconds from the mailbox.
    pub internal_ts: i64,
}

/// Scan unread messages newer than `window_start` (unix seconds),
/// skipping ids already in `seen`.
///
/// The first extracted candidate of a message wins. Matched messages
/// are marked read best-effort; a mark-read failure neither aborts the
/// scan nor drops the hit. Messages with no candidate stay unread and
/// are not reported, so a later amendment within the window can still
/// match. Merging returned ids into the subscriber's seen set is the
/// caller's job, after dispatch.
pub async fn scan_mailbox(
    mailbox: &dyn MailboxApi,
    access_token: &str,
    window_start: i64,
    seen: &HashSet<String>,
    max_results: u32,
) -> Result<Vec<OtpHit>, ScanError> {
    let ids = mailbox
        .list_unread(access_token, window_start, max_results)
        .await?;

    let mut hits = Vec::new();
    for id in ids {
        if seen.contains(&id) {
            continue;
        }

        let msg = mailbox.get_message(access_token, &id).await?;

        let Some(code) = otp::extract(&msg.snippet).into_iter().next() else {
            debug!(message_id = %id, "no otp candidate, leaving unread");
            continue;
        };

        if let Err(e) = mailbox.mark_read(access_token, &id).await {
            warn!(message_id = %id, error = %e, "mark-read failed, continuing");
        }

        hits.push(OtpHit {
            sender: msg.header("from").unwrap_or_default().to_string(),
            subject: msg.header("subject").unwrap_or_default().to_string(),
            internal_ts: msg.internal_ts,
            message_id: msg.id,
            code,
        });
    }

    Ok(hits)
}
