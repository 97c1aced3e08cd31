use serde::{Deserialize, Serialize};

pub const CHANNEL_COUNT: usize = 2;

/// Logical delivery class multiplexed over one peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Reliable,
    Unreliable,
}

impl Channel {
    /// Fixed dispatch order.
    pub const ALL: [Channel; CHANNEL_COUNT] = [Channel::Reliable, Channel::Unreliable];

    /// Out-of-range ids fall back to the reliable channel.
    pub fn from_id(id: u8) -> Self {
        match id {
            1 => Self::Unreliable,
            _ => Self::Reliable,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Self::Reliable => 0,
            Self::Unreliable => 1,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.id() as usize
    }

    pub fn is_reliable(self) -> bool {
        matches!(self, Self::Reliable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// The other end of a connection: the server (seen from a client) or one of
/// the server's peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Remote {
    Server,
    Peer(PeerId),
}

impl Remote {
    pub fn direction(self) -> Direction {
        match self {
            Self::Server => Direction::ToServer,
            Self::Peer(_) => Direction::ToPeers,
        }
    }
}

impl std::fmt::Display for Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Peer(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ToServer,
    ToPeers,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::ToServer, Direction::ToPeers];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::ToServer => 0,
            Self::ToPeers => 1,
        }
    }
}
