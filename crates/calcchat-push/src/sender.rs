use calcchat_types::models::Message;
use futures_util::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Longest body shown in a notification, in characters.
const MAX_BODY_CHARS: usize = 120;

/// Body used when a message carries only an image.
pub const IMAGE_PLACEHOLDER: &str = "📷 Photo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
}

impl PushPayload {
    pub fn for_message(msg: &Message) -> Self {
        let body = match msg.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => truncate(text, MAX_BODY_CHARS),
            _ => IMAGE_PLACEHOLDER.to_string(),
        };
        Self {
            title: msg.sender_name.clone(),
            body,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[derive(Debug, Error)]
pub enum PushError {
    /// The push service says this endpoint will never accept deliveries again.
    #[error("endpoint is no longer registered")]
    Gone,
    #[error("push service rejected delivery ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("push service authentication failed: {0}")]
    Auth(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Delivers one payload to one endpoint/device token.
pub trait PushSender: Send + Sync {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        payload: &'a PushPayload,
    ) -> BoxFuture<'a, Result<(), PushError>>;
}

/// Used when no push credentials are configured.
pub struct NoopSender;

impl PushSender for NoopSender {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        payload: &'a PushPayload,
    ) -> BoxFuture<'a, Result<(), PushError>> {
        Box::pin(async move {
            debug!("Push disabled, dropping '{}' for {}", payload.title, endpoint);
            Ok(())
        })
    }
}
