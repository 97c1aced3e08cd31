use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::channel::PeerId;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug)]
pub struct PeerConnection {
    pub addr: SocketAddr,
    pub peer_id: PeerId,
    pub connected_at: Instant,
    pub last_receive_time: Instant,
}

impl PeerConnection {
    pub fn new(addr: SocketAddr, peer_id: PeerId) -> Self {
        let now = Instant::now();
        Self {
            addr,
            peer_id,
            connected_at: now,
            last_receive_time: now,
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_receive_time.elapsed() > timeout
    }

    pub fn touch(&mut self) {
        self.last_receive_time = Instant::now();
    }
}

/// Address-to-peer bookkeeping for a connectionless socket.
#[derive(Debug)]
pub struct ConnectionManager {
    peers_by_addr: HashMap<SocketAddr, PeerId>,
    peers: HashMap<PeerId, PeerConnection>,
    next_peer_id: u32,
    max_peers: usize,
    timeout: Duration,
}

impl ConnectionManager {
    pub fn new(max_peers: usize) -> Self {
        Self::with_timeout(max_peers, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(max_peers: usize, timeout: Duration) -> Self {
        Self {
            peers_by_addr: HashMap::new(),
            peers: HashMap::new(),
            next_peer_id: 1,
            max_peers,
            timeout,
        }
    }

    /// Returns the peer for `addr` and whether it was newly admitted.
    pub fn get_or_admit(&mut self, addr: SocketAddr) -> Result<(PeerId, bool), &'static str> {
        if let Some(&peer_id) = self.peers_by_addr.get(&addr) {
            return Ok((peer_id, false));
        }

        if self.peers.len() >= self.max_peers {
            return Err("Server full");
        }

        let peer_id = PeerId(self.next_peer_id);
        self.next_peer_id += 1;

        self.peers.insert(peer_id, PeerConnection::new(addr, peer_id));
        self.peers_by_addr.insert(addr, peer_id);

        Ok((peer_id, true))
    }

    pub fn peer_for_addr(&self, addr: &SocketAddr) -> Option<PeerId> {
        self.peers_by_addr.get(addr).copied()
    }

    pub fn get(&self, peer_id: PeerId) -> Option<&PeerConnection> {
        self.peers.get(&peer_id)
    }

    pub fn get_mut(&mut self, peer_id: PeerId) -> Option<&mut PeerConnection> {
        self.peers.get_mut(&peer_id)
    }

    pub fn addr_of(&self, peer_id: PeerId) -> Option<SocketAddr> {
        self.peers.get(&peer_id).map(|p| p.addr)
    }

    pub fn remove(&mut self, peer_id: PeerId) -> Option<PeerConnection> {
        let conn = self.peers.remove(&peer_id)?;
        self.peers_by_addr.remove(&conn.addr);
        Some(conn)
    }

    pub fn remove_by_addr(&mut self, addr: &SocketAddr) -> Option<PeerConnection> {
        let peer_id = self.peers_by_addr.remove(addr)?;
        self.peers.remove(&peer_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerConnection> {
        self.peers.values()
    }

    pub fn cleanup_timed_out(&mut self) -> Vec<PeerId> {
        let timed_out: Vec<PeerId> = self
            .peers
            .iter()
            .filter(|(_, c)| c.is_timed_out(self.timeout))
            .map(|(&id, _)| id)
            .collect();

        for id in &timed_out {
            self.remove(*id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
