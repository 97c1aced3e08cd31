mod connection;
mod memory;
mod udp;

pub use connection::{ConnectionManager, PeerConnection};
pub use memory::{MemoryNetwork, MemoryTransport};
pub use udp::{UdpTransport, MAX_DATAGRAM_SIZE};

use crate::channel::{Channel, Direction, Remote};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected(Remote),
    Disconnected(Remote),
    Data {
        remote: Remote,
        channel: Channel,
        payload: Vec<u8>,
    },
}

/// Datagram transport underneath the batching layer.
///
/// The reliable channel is expected to deliver in order; the unreliable one
/// gives no guarantees.
pub trait Transport {
    /// Fire-and-forget send of one frame.
    fn send(&mut self, channel: Channel, payload: &[u8], remote: Remote);

    fn mtu(&self, channel: Channel) -> usize;

    /// Hard-stops the connection to `remote`.
    fn stop_connection(&mut self, remote: Remote);

    /// Lifecycle changes and frames received since the last call.
    fn iterate_incoming(&mut self) -> Vec<TransportEvent>;

    fn iterate_outgoing(&mut self, _direction: Direction) {}
}
