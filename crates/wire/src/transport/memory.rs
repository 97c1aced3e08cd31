//! In-process transport: one server end and any number of client ends sharing
//! queues on the tick thread. Delivery is loss-free and ordered.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use crate::channel::{CHANNEL_COUNT, Channel, PeerId, Remote};

use super::{Transport, TransportEvent};

#[derive(Debug)]
struct Shared {
    mtu: [usize; CHANNEL_COUNT],
    server_inbox: VecDeque<TransportEvent>,
    client_inboxes: HashMap<PeerId, VecDeque<TransportEvent>>,
    connected: HashSet<PeerId>,
    next_peer_id: u32,
    frames_sent: u64,
}

#[derive(Debug, Clone)]
pub struct MemoryNetwork {
    shared: Rc<RefCell<Shared>>,
}

impl MemoryNetwork {
    pub fn new(mtu: usize) -> Self {
        Self::with_mtus([mtu; CHANNEL_COUNT])
    }

    pub fn with_mtus(mtu: [usize; CHANNEL_COUNT]) -> Self {
        Self {
            shared: Rc::new(RefCell::new(Shared {
                mtu,
                server_inbox: VecDeque::new(),
                client_inboxes: HashMap::new(),
                connected: HashSet::new(),
                next_peer_id: 1,
                frames_sent: 0,
            })),
        }
    }

    pub fn server(&self) -> MemoryTransport {
        MemoryTransport {
            shared: Rc::clone(&self.shared),
            role: Role::Server,
        }
    }

    /// Opens a new client end; both sides see a `Connected` event.
    pub fn connect(&self) -> (PeerId, MemoryTransport) {
        let mut shared = self.shared.borrow_mut();
        let peer = PeerId(shared.next_peer_id);
        shared.next_peer_id += 1;

        shared.connected.insert(peer);
        shared
            .server_inbox
            .push_back(TransportEvent::Connected(Remote::Peer(peer)));
        shared
            .client_inboxes
            .entry(peer)
            .or_default()
            .push_back(TransportEvent::Connected(Remote::Server));

        let transport = MemoryTransport {
            shared: Rc::clone(&self.shared),
            role: Role::Client(peer),
        };
        (peer, transport)
    }

    pub fn frames_sent(&self) -> u64 {
        self.shared.borrow().frames_sent
    }

    pub fn is_connected(&self, peer: PeerId) -> bool {
        self.shared.borrow().connected.contains(&peer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Server,
    Client(PeerId),
}

#[derive(Debug)]
pub struct MemoryTransport {
    shared: Rc<RefCell<Shared>>,
    role: Role,
}

impl MemoryTransport {
    fn disconnect(shared: &mut Shared, peer: PeerId) {
        if !shared.connected.remove(&peer) {
            return;
        }
        shared
            .server_inbox
            .push_back(TransportEvent::Disconnected(Remote::Peer(peer)));
        if let Some(inbox) = shared.client_inboxes.get_mut(&peer) {
            inbox.push_back(TransportEvent::Disconnected(Remote::Server));
        }
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, channel: Channel, payload: &[u8], remote: Remote) {
        let mut shared = self.shared.borrow_mut();
        match (self.role, remote) {
            (Role::Server, Remote::Peer(peer)) => {
                if !shared.connected.contains(&peer) {
                    log::debug!("dropping frame for disconnected {}", peer);
                    return;
                }
                shared.frames_sent += 1;
                if let Some(inbox) = shared.client_inboxes.get_mut(&peer) {
                    inbox.push_back(TransportEvent::Data {
                        remote: Remote::Server,
                        channel,
                        payload: payload.to_vec(),
                    });
                }
            }
            (Role::Client(me), Remote::Server) => {
                if !shared.connected.contains(&me) {
                    log::debug!("dropping frame from disconnected {}", me);
                    return;
                }
                shared.frames_sent += 1;
                shared.server_inbox.push_back(TransportEvent::Data {
                    remote: Remote::Peer(me),
                    channel,
                    payload: payload.to_vec(),
                });
            }
            (role, remote) => {
                log::warn!("{:?} end cannot send to {}", role, remote);
            }
        }
    }

    fn mtu(&self, channel: Channel) -> usize {
        self.shared.borrow().mtu[channel.index()]
    }

    fn stop_connection(&mut self, remote: Remote) {
        let mut shared = self.shared.borrow_mut();
        match (self.role, remote) {
            (Role::Server, Remote::Peer(peer)) => Self::disconnect(&mut shared, peer),
            (Role::Client(me), Remote::Server) => Self::disconnect(&mut shared, me),
            (role, remote) => log::warn!("{:?} end cannot stop {}", role, remote),
        }
    }

    fn iterate_incoming(&mut self) -> Vec<TransportEvent> {
        let mut shared = self.shared.borrow_mut();
        match self.role {
            Role::Server => shared.server_inbox.drain(..).collect(),
            Role::Client(me) => shared
                .client_inboxes
                .get_mut(&me)
                .map(|inbox| inbox.drain(..).collect())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_cross_between_ends() {
        let network = MemoryNetwork::new(1200);
        let mut server = network.server();
        let (peer, mut client) = network.connect();

        assert_eq!(
            server.iterate_incoming(),
            vec![TransportEvent::Connected(Remote::Peer(peer))]
        );
        assert_eq!(
            client.iterate_incoming(),
            vec![TransportEvent::Connected(Remote::Server)]
        );

        client.send(Channel::Reliable, &[1, 2, 3], Remote::Server);
        server.send(Channel::Unreliable, &[4], Remote::Peer(peer));

        assert_eq!(
            server.iterate_incoming(),
            vec![TransportEvent::Data {
                remote: Remote::Peer(peer),
                channel: Channel::Reliable,
                payload: vec![1, 2, 3],
            }]
        );
        assert_eq!(
            client.iterate_incoming(),
            vec![TransportEvent::Data {
                remote: Remote::Server,
                channel: Channel::Unreliable,
                payload: vec![4],
            }]
        );
        assert_eq!(network.frames_sent(), 2);
    }

    #[test]
    fn stop_notifies_both_sides() {
        let network = MemoryNetwork::new(1200);
        let mut server = network.server();
        let (peer, mut client) = network.connect();
        server.iterate_incoming();
        client.iterate_incoming();

        server.send(Channel::Reliable, &[9], Remote::Peer(peer));
        server.stop_connection(Remote::Peer(peer));
        server.send(Channel::Reliable, &[10], Remote::Peer(peer));

        assert!(!network.is_connected(peer));
        assert_eq!(
            server.iterate_incoming(),
            vec![TransportEvent::Disconnected(Remote::Peer(peer))]
        );
        let events = client.iterate_incoming();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], TransportEvent::Disconnected(Remote::Server));
    }
}
