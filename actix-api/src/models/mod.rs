use std::sync::Arc;

use actix::Addr;

use crate::actors::meeting_server::MeetingServer;
use crate::config::Config;

/// Shared state handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub server: Addr<MeetingServer>,
    pub config: Arc<Config>,
}
