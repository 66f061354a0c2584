use std::sync::Arc;

use calcchat_gateway::Hub;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub hub: Hub,
    /// Window returned by `GET /messages` when no `limit` is given.
    pub history_limit: u32,
}
