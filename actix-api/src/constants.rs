use std::time::Duration;

/// How often a session actor pings its client.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// How long a client may go without a pong before it is disconnected.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum WebSocket frame size accepted from a client.
pub const MAX_FRAME_BYTES: usize = 1_000_000;

/// Allowed shape for meeting ids arriving in client events.
pub const VALID_ID_PATTERN: &str = r"^[a-zA-Z0-9_\-]{1,64}$";

/// How many chat entries the `meeting-joined` snapshot carries.
pub const CHAT_TAIL_LEN: usize = 50;
