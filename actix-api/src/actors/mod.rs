pub mod meeting_server;
pub mod ws_session;
