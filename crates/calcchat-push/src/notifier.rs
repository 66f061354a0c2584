use std::sync::Arc;

use calcchat_db::Database;
use calcchat_types::models::Message;
use calcchat_types::participants::Participants;
use futures_util::future::join_all;
use tracing::{debug, error, info, warn};

use crate::sender::{PushError, PushPayload, PushSender};

/// Outcome of one fan-out, mostly for logging and tests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failed: usize,
    /// Endpoints dropped from the registry because the push service reported them gone.
    pub pruned: usize,
}

/// Resolves the counterpart of a message's sender and pushes to each of their devices.
#[derive(Clone)]
pub struct Notifier {
    db: Arc<Database>,
    sender: Arc<dyn PushSender>,
    participants: Participants,
}

impl Notifier {
    pub fn new(db: Arc<Database>, sender: Arc<dyn PushSender>, participants: Participants) -> Self {
        Self {
            db,
            sender,
            participants,
        }
    }

    pub async fn notify_new_message(&self, msg: &Message) -> FanOutReport {
        let Some(recipient) = self.participants.counterpart(&msg.sender_id) else {
            warn!("No counterpart for sender {}, skipping push", msg.sender_id);
            return FanOutReport::default();
        };

        let db = self.db.clone();
        let rid = recipient.id.clone();
        let endpoints: Vec<String> =
            match tokio::task::spawn_blocking(move || db.subscriptions_for(&rid)).await {
                Ok(Ok(rows)) => rows.into_iter().map(|r| r.endpoint).collect(),
                Ok(Err(e)) => {
                    error!("Failed to load subscriptions for {}: {}", recipient.id, e);
                    return FanOutReport::default();
                }
                Err(e) => {
                    error!("spawn_blocking join error: {}", e);
                    return FanOutReport::default();
                }
            };

        if endpoints.is_empty() {
            debug!("{} has no push subscriptions", recipient.id);
            return FanOutReport::default();
        }

        let payload = PushPayload::for_message(msg);
        let results = fan_out(self.sender.as_ref(), &endpoints, &payload).await;

        let mut report = FanOutReport::default();
        let mut gone = Vec::new();
        for (endpoint, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(PushError::Gone) => {
                    report.failed += 1;
                    gone.push(endpoint);
                }
                Err(_) => report.failed += 1,
            }
        }

        if !gone.is_empty() {
            let db = self.db.clone();
            let pruned = tokio::task::spawn_blocking(move || {
                gone.iter()
                    .filter(|endpoint| match db.remove_subscription(endpoint) {
                        Ok(removed) => removed,
                        Err(e) => {
                            error!("Failed to prune subscription: {}", e);
                            false
                        }
                    })
                    .count()
            })
            .await;
            match pruned {
                Ok(n) => report.pruned = n,
                Err(e) => error!("spawn_blocking join error: {}", e),
            }
        }

        info!(
            "Push for message {} to {}: {} delivered, {} failed, {} pruned",
            msg.id, recipient.id, report.delivered, report.failed, report.pruned
        );
        report
    }
}

/// Send `payload` to every endpoint concurrently. Each target's failure is
/// logged and kept to itself; it never stops delivery to the others.
pub async fn fan_out(
    sender: &dyn PushSender,
    endpoints: &[String],
    payload: &PushPayload,
) -> Vec<(String, Result<(), PushError>)> {
    let sends = endpoints.iter().map(|endpoint| async move {
        let result = sender.send(endpoint, payload).await;
        if let Err(e) = &result {
            warn!("Push to {} failed: {}", redact(endpoint), e);
        }
        (endpoint.clone(), result)
    });

    join_all(sends).await
}

/// Device tokens are credentials of a sort; only log their head.
fn redact(endpoint: &str) -> &str {
    match endpoint.char_indices().nth(12) {
        Some((cut, _)) => &endpoint[..cut],
        None => endpoint,
    }
}
