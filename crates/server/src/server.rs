use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tickwire::{
    Channel, Direction, DispatchStats, FixedTimestep, MessageHandler, NetworkSession, Remote,
    Transport, UdpTransport,
};

use crate::config::RelayConfig;
use crate::events::{DisconnectReason, RelayEvent};
use crate::protocol::RelayMessage;

#[derive(Debug, Default)]
struct Inbox {
    messages: Vec<(Remote, Channel, Vec<u8>)>,
    connected: Vec<Remote>,
    disconnected: Vec<Remote>,
}

impl MessageHandler for Inbox {
    fn on_message_received(&mut self, remote: Remote, channel: Channel, payload: &[u8]) {
        self.messages.push((remote, channel, payload.to_vec()));
    }

    fn on_connected(&mut self, remote: Remote) {
        self.connected.push(remote);
    }

    fn on_disconnected(&mut self, remote: Remote) {
        self.disconnected.push(remote);
    }
}

/// Echoes every message back to its sender on the tick after it arrives.
pub struct RelayServer<T: Transport> {
    transport: T,
    session: NetworkSession,
    timestep: FixedTimestep,
    last_tick_time: Instant,
    running: Arc<AtomicBool>,
    inbox: Inbox,
    pending_events: VecDeque<RelayEvent>,
    echoed: u64,
}

impl RelayServer<UdpTransport> {
    pub fn bind(bind_addr: &str, config: RelayConfig) -> io::Result<Self> {
        let transport =
            UdpTransport::bind_server(bind_addr, config.max_peers, config.peer_timeout)?;
        Ok(Self::with_transport(transport, config))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }
}

impl<T: Transport> RelayServer<T> {
    pub fn with_transport(transport: T, config: RelayConfig) -> Self {
        Self {
            transport,
            session: NetworkSession::new(config.session_config()),
            timestep: FixedTimestep::new(config.tick_rate),
            last_tick_time: Instant::now(),
            running: Arc::new(AtomicBool::new(true)),
            inbox: Inbox::default(),
            pending_events: VecDeque::new(),
            echoed: 0,
        }
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = RelayEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn session(&self) -> &NetworkSession {
        &self.session
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            for event in self.drain_events().collect::<Vec<_>>() {
                log_event(&event);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown_connections();
    }

    /// Reads the network and runs as many ticks as wall time allows.
    pub fn tick_once(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_tick_time;
        self.last_tick_time = now;
        self.timestep.advance(delta);

        self.process_network();

        while self.timestep.consume_tick() {
            self.tick(now);
        }
    }

    /// Reads the network and runs exactly one tick.
    pub fn step(&mut self, now: Instant) {
        self.process_network();
        self.tick(now);
    }

    fn process_network(&mut self) {
        self.session
            .iterate_incoming(&mut self.transport, &mut self.inbox);

        for remote in self.inbox.connected.drain(..) {
            self.pending_events
                .push_back(RelayEvent::PeerConnected { remote });
        }
        for remote in self.inbox.disconnected.drain(..) {
            self.pending_events.push_back(RelayEvent::PeerDisconnected {
                remote,
                reason: DisconnectReason::Closed,
            });
        }

        let messages = std::mem::take(&mut self.inbox.messages);
        for (remote, channel, payload) in messages {
            self.session.enqueue(remote, channel, &payload, false);
            self.echoed += 1;

            match RelayMessage::decode(&payload) {
                Ok(RelayMessage::Leave) => self.kick(remote),
                Ok(RelayMessage::Probe { sequence, .. }) => {
                    log::trace!("echoing probe {} for {}", sequence, remote);
                }
                Err(_) => log::trace!("echoing {} opaque bytes for {}", payload.len(), remote),
            }
        }
    }

    fn tick(&mut self, now: Instant) {
        self.session.advance_tick();
        self.session
            .iterate_outgoing(Direction::ToPeers, &mut self.transport, now);

        for remote in self.session.process_disconnects(&mut self.transport) {
            self.pending_events.push_back(RelayEvent::PeerDisconnected {
                remote,
                reason: DisconnectReason::Kicked,
            });
        }
    }

    /// Starts a graceful disconnect; queued echoes still go out first.
    pub fn kick(&mut self, remote: Remote) {
        if self.session.is_disconnecting(remote) {
            return;
        }
        if self.session.mark_disconnecting(remote) {
            self.pending_events.push_back(RelayEvent::Kicking { remote });
        }
    }

    pub fn shutdown_connections(&mut self) {
        let remotes: Vec<Remote> = self.session.remotes().collect();
        for remote in remotes {
            self.kick(remote);
        }

        let ticks = self.session.config().disconnect_drain_ticks() + 1;
        for _ in 0..ticks {
            if self.session.remotes().next().is_none() {
                break;
            }
            self.tick(Instant::now());
        }
        for event in self.drain_events().collect::<Vec<_>>() {
            log_event(&event);
        }
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            tick: self.session.tick(),
            peer_count: self.session.remotes().count(),
            echoed: self.echoed,
            dispatch: self.session.stats().clone(),
        }
    }
}

pub fn log_event(event: &RelayEvent) {
    match event {
        RelayEvent::PeerConnected { remote } => log::info!("{} connected", remote),
        RelayEvent::PeerDisconnected { remote, reason } => {
            log::info!("{} {}", remote, reason.as_str())
        }
        RelayEvent::Kicking { remote } => log::info!("draining {}", remote),
    }
}

#[derive(Debug, Clone)]
pub struct RelayStats {
    pub tick: u32,
    pub peer_count: usize,
    pub echoed: u64,
    pub dispatch: DispatchStats,
}
