pub mod channel;
pub mod config;
pub mod degrader;
pub mod dispatch;
pub mod error;
pub mod fragment;
pub mod frame;
pub mod outbox;
pub mod packet;
pub mod session;
pub mod stats;
pub mod tick;
pub mod transport;

pub use channel::{CHANNEL_COUNT, Channel, Direction, PeerId, Remote};
pub use config::{DEFAULT_MAX_FRAGMENTS, DEFAULT_TICK_RATE, LinkConditionerConfig, SessionConfig};
pub use degrader::{LinkDegrader, Released};
pub use dispatch::{DirtyList, DisconnectDrainQueue, DrainEntry};
pub use error::WireError;
pub use fragment::{Fragmenter, Reassembler};
pub use frame::{BufferPool, FrameBuffer, FrameSequence, PoolStats, ReserveLayout, TICK_BYTES};
pub use outbox::PeerOutbox;
pub use packet::{Item, ItemReader, MAX_MESSAGE_LEN, PacketId, SplitHeader};
pub use session::{MessageHandler, NetworkSession};
pub use stats::{DegraderStats, DispatchStats, TransportStats};
pub use tick::{FixedTimestep, tick_greater_than, tick_reached, ticks_for};
pub use transport::{
    ConnectionManager, MAX_DATAGRAM_SIZE, MemoryNetwork, MemoryTransport, PeerConnection,
    Transport, TransportEvent, UdpTransport,
};
