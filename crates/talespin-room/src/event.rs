use crate::message::ServerMessage;

/// Who an outgoing event is addressed to. The engine never touches a
/// session directly (see crate-level design notes); it only names
/// recipients by member name, and the room actor resolves those to
/// sockets.
#[derive(Debug, Clone)]
pub enum Recipient {
    Broadcast,
    Member(String),
    AllExcept(String),
}

/// A `ServerMessage` paired with its intended audience, the unit the
/// engine hands back to its caller after processing a command.
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub to: Recipient,
    pub message: ServerMessage,
}

impl Outgoing {
    pub fn broadcast(message: ServerMessage) -> Self {
        Self { to: Recipient::Broadcast, message }
    }

    pub fn to(member: impl Into<String>, message: ServerMessage) -> Self {
        Self { to: Recipient::Member(member.into()), message }
    }

    pub fn all_except(member: impl Into<String>, message: ServerMessage) -> Self {
        Self { to: Recipient::AllExcept(member.into()), message }
    }
}
