use tickwire::Remote;

#[derive(Debug, Clone)]
pub enum RelayEvent {
    PeerConnected {
        remote: Remote,
    },
    PeerDisconnected {
        remote: Remote,
        reason: DisconnectReason,
    },
    Kicking {
        remote: Remote,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The transport closed the connection (peer left or timed out).
    Closed,
    /// The relay drained and stopped the connection.
    Kicked,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Closed => "disconnected",
            DisconnectReason::Kicked => "kicked",
        }
    }
}
