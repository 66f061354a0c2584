//! Push-notification fan-out to the participant who did not send the message.

pub mod fcm;
pub mod notifier;
pub mod sender;

pub use notifier::Notifier;
pub use sender::{NoopSender, PushError, PushPayload, PushSender};
