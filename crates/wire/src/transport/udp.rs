//! Non-blocking UDP transport.
//!
//! Each datagram is `[tag: u8][frame]`. Tags 0 and 1 carry reliable and
//! unreliable frames, `TAG_CONNECT` doubles as a keepalive and
//! `TAG_DISCONNECT` ends a connection. Raw UDP does not retransmit, so the
//! reliable channel is only as reliable as the link; this transport is meant
//! for loopback tooling and tests.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use crate::channel::{Channel, Direction, Remote};
use crate::stats::TransportStats;

use super::connection::ConnectionManager;
use super::{Transport, TransportEvent};

pub const MAX_DATAGRAM_SIZE: usize = 1200;

const TAG_CONNECT: u8 = 0xFE;
const TAG_DISCONNECT: u8 = 0xFF;
const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
enum Mode {
    Server {
        connections: ConnectionManager,
    },
    Client {
        server_addr: SocketAddr,
        connected: bool,
        last_send_time: Instant,
    },
}

pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    mode: Mode,
    stats: TransportStats,
    recv_buffer: [u8; MAX_DATAGRAM_SIZE],
    send_buffer: Vec<u8>,
    pending_events: Vec<TransportEvent>,
}

impl UdpTransport {
    pub fn bind_server<A: ToSocketAddrs>(
        addr: A,
        max_peers: usize,
        timeout: Duration,
    ) -> io::Result<Self> {
        let connections = ConnectionManager::with_timeout(max_peers, timeout);
        Self::bind(addr, Mode::Server { connections })
    }

    pub fn connect<A: ToSocketAddrs>(server_addr: A) -> io::Result<Self> {
        let server_addr = server_addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "No server address"))?;

        let bind_addr = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };

        let mut transport = Self::bind(
            bind_addr,
            Mode::Client {
                server_addr,
                connected: true,
                last_send_time: Instant::now(),
            },
        )?;

        transport.send_control(TAG_CONNECT, server_addr)?;
        transport
            .pending_events
            .push(TransportEvent::Connected(Remote::Server));
        log::info!("Connecting to {}", server_addr);

        Ok(transport)
    }

    fn bind<A: ToSocketAddrs>(addr: A, mode: Mode) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            mode,
            stats: TransportStats::default(),
            recv_buffer: [0u8; MAX_DATAGRAM_SIZE],
            send_buffer: Vec::with_capacity(MAX_DATAGRAM_SIZE),
            pending_events: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    pub fn connections(&self) -> Option<&ConnectionManager> {
        match &self.mode {
            Mode::Server { connections } => Some(connections),
            Mode::Client { .. } => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        match &self.mode {
            Mode::Server { .. } => true,
            Mode::Client { connected, .. } => *connected,
        }
    }

    fn resolve(&self, remote: Remote) -> Option<SocketAddr> {
        match (&self.mode, remote) {
            (Mode::Server { connections }, Remote::Peer(peer)) => connections.addr_of(peer),
            (Mode::Client {
                server_addr,
                connected: true,
                ..
            }, Remote::Server) => Some(*server_addr),
            _ => None,
        }
    }

    fn send_control(&mut self, tag: u8, addr: SocketAddr) -> io::Result<()> {
        send_tag(&self.socket, &mut self.stats, tag, addr)
    }

    fn handle_datagram(&mut self, size: usize, addr: SocketAddr) {
        let tag = self.recv_buffer[0];
        let body = &self.recv_buffer[1..size];

        match &mut self.mode {
            Mode::Server { connections } => {
                if tag == TAG_DISCONNECT {
                    if let Some(conn) = connections.remove_by_addr(&addr) {
                        log::debug!("{} at {} disconnected", conn.peer_id, addr);
                        self.pending_events
                            .push(TransportEvent::Disconnected(Remote::Peer(conn.peer_id)));
                    }
                    return;
                }

                let peer_id = match connections.get_or_admit(addr) {
                    Ok((peer_id, true)) => {
                        log::debug!("{} connected from {}", peer_id, addr);
                        self.pending_events
                            .push(TransportEvent::Connected(Remote::Peer(peer_id)));
                        peer_id
                    }
                    Ok((peer_id, false)) => peer_id,
                    Err(reason) => {
                        log::warn!("Connection denied to {}: {}", addr, reason);
                        if let Err(e) =
                            send_tag(&self.socket, &mut self.stats, TAG_DISCONNECT, addr)
                        {
                            log::warn!("denial notice to {} failed: {}", addr, e);
                        }
                        return;
                    }
                };
                if let Some(conn) = connections.get_mut(peer_id) {
                    conn.touch();
                }

                if tag != TAG_CONNECT {
                    self.pending_events.push(TransportEvent::Data {
                        remote: Remote::Peer(peer_id),
                        channel: Channel::from_id(tag),
                        payload: body.to_vec(),
                    });
                }
            }
            Mode::Client {
                server_addr,
                connected,
                ..
            } => {
                if addr != *server_addr || !*connected {
                    return;
                }
                match tag {
                    TAG_CONNECT => {}
                    TAG_DISCONNECT => {
                        *connected = false;
                        self.pending_events
                            .push(TransportEvent::Disconnected(Remote::Server));
                    }
                    _ => self.pending_events.push(TransportEvent::Data {
                        remote: Remote::Server,
                        channel: Channel::from_id(tag),
                        payload: body.to_vec(),
                    }),
                }
            }
        }
    }
}

/// Sends a one-byte control datagram, counting it or the failure.
fn send_tag(
    socket: &UdpSocket,
    stats: &mut TransportStats,
    tag: u8,
    addr: SocketAddr,
) -> io::Result<()> {
    match socket.send_to(&[tag], addr) {
        Ok(bytes) => {
            stats.packets_sent += 1;
            stats.bytes_sent += bytes as u64;
            Ok(())
        }
        Err(e) => {
            stats.send_errors += 1;
            Err(e)
        }
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, channel: Channel, payload: &[u8], remote: Remote) {
        let Some(addr) = self.resolve(remote) else {
            log::debug!("dropping frame for unknown remote {}", remote);
            return;
        };

        self.send_buffer.clear();
        self.send_buffer.push(channel.id());
        self.send_buffer.extend_from_slice(payload);

        if self.send_buffer.len() > MAX_DATAGRAM_SIZE {
            log::error!(
                "frame of {} bytes exceeds datagram size {}",
                payload.len(),
                MAX_DATAGRAM_SIZE
            );
            self.stats.send_errors += 1;
            return;
        }

        match self.socket.send_to(&self.send_buffer, addr) {
            Ok(bytes) => {
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += bytes as u64;
                if let Mode::Client { last_send_time, .. } = &mut self.mode {
                    *last_send_time = Instant::now();
                }
            }
            Err(e) => {
                log::warn!("send to {} failed: {}", addr, e);
                self.stats.send_errors += 1;
            }
        }
    }

    fn mtu(&self, _channel: Channel) -> usize {
        MAX_DATAGRAM_SIZE - 1
    }

    fn stop_connection(&mut self, remote: Remote) {
        let Some(addr) = self.resolve(remote) else {
            return;
        };
        if let Err(e) = self.send_control(TAG_DISCONNECT, addr) {
            log::warn!("disconnect notice to {} failed: {}", addr, e);
        }

        match (&mut self.mode, remote) {
            (Mode::Server { connections }, Remote::Peer(peer)) => {
                connections.remove(peer);
            }
            (Mode::Client { connected, .. }, Remote::Server) => {
                *connected = false;
            }
            _ => {}
        }
    }

    fn iterate_incoming(&mut self) -> Vec<TransportEvent> {
        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => {
                    if size == 0 {
                        continue;
                    }
                    self.stats.packets_received += 1;
                    self.stats.bytes_received += size as u64;
                    self.handle_datagram(size, addr);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("receive failed: {}", e);
                    break;
                }
            }
        }

        if let Mode::Server { connections } = &mut self.mode {
            for peer in connections.cleanup_timed_out() {
                log::debug!("{} timed out", peer);
                self.pending_events
                    .push(TransportEvent::Disconnected(Remote::Peer(peer)));
            }
        }

        std::mem::take(&mut self.pending_events)
    }

    fn iterate_outgoing(&mut self, direction: Direction) {
        if direction != Direction::ToServer {
            return;
        }
        let Mode::Client {
            server_addr,
            connected: true,
            last_send_time,
        } = &self.mode
        else {
            return;
        };

        if last_send_time.elapsed() >= KEEPALIVE_INTERVAL {
            let addr = *server_addr;
            match self.send_control(TAG_CONNECT, addr) {
                Ok(()) => {
                    if let Mode::Client { last_send_time, .. } = &mut self.mode {
                        *last_send_time = Instant::now();
                    }
                }
                Err(e) => log::warn!("keepalive to {} failed: {}", addr, e),
            }
        }
    }
}
