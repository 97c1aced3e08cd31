use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use tickwire::{
    Channel, Direction, FixedTimestep, MessageHandler, NetworkSession, Remote, SessionConfig,
    UdpTransport,
};

use crate::protocol::RelayMessage;

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub server: String,
    pub count: u32,
    pub size: usize,
    pub channel: Channel,
    pub timeout: Duration,
    pub tick_rate: u32,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub sent: u32,
    pub received: u32,
    pub mismatched: u32,
    pub unexpected: u32,
    pub closed_by_relay: bool,
}

impl ProbeReport {
    pub fn is_clean(&self) -> bool {
        self.received == self.sent && self.mismatched == 0 && self.unexpected == 0
    }
}

/// Matches echoes against the encoded probes still in flight.
#[derive(Debug, Default)]
pub struct ProbeTracker {
    in_flight: HashMap<u32, Vec<u8>>,
    report: ProbeReport,
}

impl ProbeTracker {
    pub fn record_sent(&mut self, sequence: u32, encoded: Vec<u8>) {
        self.in_flight.insert(sequence, encoded);
        self.report.sent += 1;
    }

    pub fn record_echo(&mut self, payload: &[u8]) {
        match RelayMessage::decode(payload) {
            Ok(RelayMessage::Probe { sequence, .. }) => match self.in_flight.remove(&sequence) {
                Some(expected) if expected == payload => self.report.received += 1,
                Some(_) => {
                    log::warn!("echo of probe {} differs from what was sent", sequence);
                    self.report.mismatched += 1;
                }
                None => {
                    log::warn!("echo of probe {} was not expected", sequence);
                    self.report.unexpected += 1;
                }
            },
            Ok(RelayMessage::Leave) => {}
            Err(e) => {
                log::warn!("undecodable echo of {} bytes: {}", payload.len(), e);
                self.report.mismatched += 1;
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn report(&self) -> &ProbeReport {
        &self.report
    }
}

#[derive(Default)]
struct Inbox {
    echoes: Vec<Vec<u8>>,
    disconnected: bool,
}

impl MessageHandler for Inbox {
    fn on_message_received(&mut self, _remote: Remote, _channel: Channel, payload: &[u8]) {
        self.echoes.push(payload.to_vec());
    }

    fn on_disconnected(&mut self, _remote: Remote) {
        self.disconnected = true;
    }
}

/// Sends one probe per tick, waits for every echo, then asks the relay to
/// close the connection and waits for it to do so.
pub fn run(config: &ProbeConfig) -> Result<ProbeReport> {
    let mut transport = UdpTransport::connect(config.server.as_str())
        .with_context(|| format!("connecting to {}", config.server))?;
    let mut session = NetworkSession::new(SessionConfig {
        tick_rate: config.tick_rate,
        ..config.session.clone()
    });
    let mut timestep = FixedTimestep::new(config.tick_rate);
    let mut tracker = ProbeTracker::default();
    let mut inbox = Inbox::default();

    let deadline = Instant::now() + config.timeout;
    let mut last_tick_time = Instant::now();
    let mut next_sequence = 0u32;
    let mut leave_sent = false;

    log::info!(
        "Probing {} with {} messages of {} filler bytes on {:?}",
        config.server,
        config.count,
        config.size,
        config.channel
    );

    while Instant::now() < deadline {
        session.iterate_incoming(&mut transport, &mut inbox);
        for echo in inbox.echoes.drain(..) {
            tracker.record_echo(&echo);
        }
        if inbox.disconnected {
            break;
        }

        let now = Instant::now();
        timestep.advance(now - last_tick_time);
        last_tick_time = now;

        while timestep.consume_tick() {
            session.advance_tick();

            if next_sequence < config.count {
                let encoded = RelayMessage::probe(next_sequence, config.size)
                    .encode()
                    .context("encoding probe")?;
                session.enqueue(Remote::Server, config.channel, &encoded, false);
                tracker.record_sent(next_sequence, encoded);
                next_sequence += 1;
            } else if tracker.in_flight() == 0 && !leave_sent {
                let leave = RelayMessage::Leave.encode().context("encoding leave")?;
                session.enqueue(Remote::Server, Channel::Reliable, &leave, false);
                leave_sent = true;
            }

            session.iterate_outgoing(Direction::ToServer, &mut transport, now);
        }

        std::thread::sleep(Duration::from_millis(1));
    }

    let mut report = tracker.report().clone();
    report.closed_by_relay = inbox.disconnected;
    if !report.closed_by_relay {
        log::warn!("relay did not close the connection before the deadline");
    }

    let stats = session.stats();
    log::info!(
        "Sent {} frames ({} bytes), received {} frames ({} bytes), {} fragmented messages",
        stats.frames_sent,
        stats.bytes_sent,
        stats.frames_received,
        stats.bytes_received,
        stats.messages_fragmented
    );

    Ok(report)
}
