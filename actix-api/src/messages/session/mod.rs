use actix::Message as ActixMessage;
use tutorhall_meeting_types::ServerEvent;

/// An event on its way out to one client. The session actor serializes it
/// into a JSON text frame.
#[derive(Debug, Clone, ActixMessage)]
#[rtype(result = "()")]
pub struct OutboundEvent(pub ServerEvent);
