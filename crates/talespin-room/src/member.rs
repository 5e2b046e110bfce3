/// Whether a member currently occupies a playing seat or is watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Active,
    Observer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnStatus {
    Connected,
    Disconnected,
}

/// A room participant. `name` is unique per room (case-sensitive) and
/// doubles as the membership key; `client_token` is an opaque,
/// self-asserted bearer value the client chooses on first join and
/// presents again to reattach after a disconnect.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub client_token: String,
    pub kind: MemberKind,
    pub status: ConnStatus,
    pub points: i64,
    pub ready: bool,
    /// Set when an observer asked to rejoin during an atomic stage; honored
    /// the next time the engine enters `ActiveChooses`.
    pub auto_join_on_next_round: bool,
}

impl Member {
    pub fn new(name: String, client_token: String, kind: MemberKind) -> Self {
        Self {
            name,
            client_token,
            kind,
            status: ConnStatus::Connected,
            points: 0,
            ready: false,
            auto_join_on_next_round: false,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.kind, MemberKind::Active)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.status, ConnStatus::Connected)
    }
}
