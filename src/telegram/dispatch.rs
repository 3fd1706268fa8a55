//! Notification dispatcher.
//!
//! A single run-context task owns all outbound channel I/O and every
//! delayed-deletion timer. Producers (poll loop, OAuth callback, bot
//! handlers) hold a clonable [`DispatcherHandle`] and enqueue jobs onto
//! a bounded queue; `send` returns once the job is accepted, and
//! `send_and_wait` blocks only on the oneshot reply for its own unit of
//! work, never on unrelated queued jobs.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::DeliveryError;
use super::client::BotApi;
use super::types::{EditMessageTextRequest, SendMessageRequest};

const QUEUE_DEPTH: usize = 64;

enum Job {
    Send {
        req: SendMessageRequest,
        delete_after: Option<Duration>,
        reply: Option<oneshot::Sender<Result<i64, DeliveryError>>>,
    },
    Edit {
        req: EditMessageTextRequest,
    },
    Delete {
        chat_id: i64,
        message_id: i64,
        delay: Duration,
    },
    AnswerCallback {
        callback_id: String,
    },
}

#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Job>,
}

impl DispatcherHandle {
    /// Fire-and-forget delivery. Returns once the job is queued.
    pub async fn send(
        &self,
        req: SendMessageRequest,
        delete_after: Option<Duration>,
    ) -> Result<(), DeliveryError> {
        self.tx
            .send(Job::Send {
                req,
                delete_after,
                reply: None,
            })
            .await
            .map_err(|_| DeliveryError::Closed)
    }

    /// Deliver and wait for the resulting message handle.
    pub async fn send_and_wait(
        &self,
        req: SendMessageRequest,
        delete_after: Option<Duration>,
    ) -> Result<i64, DeliveryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Job::Send {
                req,
                delete_after,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| DeliveryError::Closed)?;
        reply_rx.await.map_err(|_| DeliveryError::Closed)?
    }

    pub async fn edit(&self, req: EditMessageTextRequest) -> Result<(), DeliveryError> {
        self.tx
            .send(Job::Edit { req })
            .await
            .map_err(|_| DeliveryError::Closed)
    }

    /// Register a one-shot deferred deletion of a delivered message.
    pub async fn schedule_delete(
        &self,
        chat_id: i64,
        message_id: i64,
        delay: Duration,
    ) -> Result<(), DeliveryError> {
        self.tx
            .send(Job::Delete {
                chat_id,
                message_id,
                delay,
            })
            .await
            .map_err(|_| DeliveryError::Closed)
    }

    pub async fn answer_callback(&self, callback_id: &str) -> Result<(), DeliveryError> {
        self.tx
            .send(Job::AnswerCallback {
                callback_id: callback_id.to_string(),
            })
            .await
            .map_err(|_| DeliveryError::Closed)
    }
}

/// Start the run-context consumer task and return the producer handle.
pub fn spawn(api: Arc<dyn BotApi>) -> DispatcherHandle {
    let (tx, mut rx) = mpsc::channel::<Job>(QUEUE_DEPTH);

    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            match job {
                Job::Send {
                    req,
                    delete_after,
                    reply,
                } => {
                    let chat_id = req.chat_id;
                    let res = api.send_message(&req).await;
                    match &res {
                        Ok(msg) => {
                            if let Some(delay) = delete_after {
                                spawn_delete(api.clone(), chat_id, msg.message_id, delay);
                            }
                        }
                        Err(e) => warn!(chat_id, error = %e, "message delivery failed"),
                    }
                    if let Some(reply) = reply {
                        // receiver may have given up waiting; that's fine
                        let _ = reply.send(res.map(|m| m.message_id));
                    }
                }
                Job::Edit { req } => {
                    if let Err(e) = api.edit_message_text(&req).await {
                        warn!(chat_id = req.chat_id, error = %e, "message edit failed");
                    }
                }
                Job::Delete {
                    chat_id,
                    message_id,
                    delay,
                } => spawn_delete(api.clone(), chat_id, message_id, delay),
                Job::AnswerCallback { callback_id } => {
                    if let Err(e) = api.answer_callback_query(&callback_id).await {
                        debug!(error = %e, "answer callback failed");
                    }
                }
            }
        }
        info!("notification dispatcher stopped");
    });

    DispatcherHandle { tx }
}

/// One-shot deletion timer. Fires once; a failure (message already
/// gone, permission lost) is swallowed and never retried.
fn spawn_delete(api: Arc<dyn BotApi>, chat_id: i64, message_id: i64, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = api.delete_message(chat_id, message_id).await {
            debug!(chat_id, message_id, error = %e, "auto-delete skipped");
        }
    });
}
