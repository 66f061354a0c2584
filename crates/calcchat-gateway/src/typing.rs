use std::time::Duration;

use tracing::debug;

use crate::dispatcher::Dispatcher;

/// Background task that clears typing indicators whose sender stopped renewing them.
pub async fn run_typing_sweeper(dispatcher: Dispatcher, interval: Duration) {
    let mut interval = tokio::time::interval(interval);

    loop {
        interval.tick().await;

        let expired = dispatcher.expire_typing().await;
        if !expired.is_empty() {
            debug!("Typing expired for {:?}", expired);
        }
    }
}
