use std::collections::HashMap;
use std::time::Instant;

use crate::channel::{CHANNEL_COUNT, Channel, Direction, Remote};
use crate::config::{LinkConditionerConfig, SessionConfig};
use crate::degrader::LinkDegrader;
use crate::dispatch::{DirtyList, DisconnectDrainQueue};
use crate::error::WireError;
use crate::fragment::{Fragmenter, Reassembler};
use crate::frame::{BufferPool, ReserveLayout};
use crate::outbox::PeerOutbox;
use crate::packet::{Item, ItemReader, MAX_MESSAGE_LEN, MESSAGE_HEADER_LEN, encode_message};
use crate::stats::DispatchStats;
use crate::transport::{Transport, TransportEvent};

/// Receives messages once they are whole. Fragmented and unfragmented
/// messages arrive the same way.
pub trait MessageHandler {
    fn on_message_received(&mut self, remote: Remote, channel: Channel, payload: &[u8]);

    fn on_connected(&mut self, _remote: Remote) {}

    fn on_disconnected(&mut self, _remote: Remote) {}
}

impl<F> MessageHandler for F
where
    F: FnMut(Remote, Channel, &[u8]),
{
    fn on_message_received(&mut self, remote: Remote, channel: Channel, payload: &[u8]) {
        self(remote, channel, payload)
    }
}

#[derive(Debug)]
struct PeerState {
    outbox: PeerOutbox,
    reassemblers: [Reassembler; CHANNEL_COUNT],
    disconnecting: bool,
}

/// Batching, fragmentation and dispatch for every connected remote.
pub struct NetworkSession {
    config: SessionConfig,
    layout: ReserveLayout,
    fragmenter: Fragmenter,
    peers: HashMap<Remote, PeerState>,
    pool: BufferPool,
    dirty: [DirtyList; 2],
    drain: DisconnectDrainQueue,
    degrader: Option<LinkDegrader>,
    scratch: Vec<u8>,
    tick: u32,
    stats: DispatchStats,
}

impl NetworkSession {
    pub fn new(config: SessionConfig) -> Self {
        let degrader = config
            .link_conditioner
            .clone()
            .filter(|c| c.enabled)
            .map(LinkDegrader::new);

        Self {
            layout: config.reserve_layout(),
            fragmenter: Fragmenter::new(config.max_fragments),
            peers: HashMap::new(),
            pool: BufferPool::new(),
            dirty: Default::default(),
            drain: DisconnectDrainQueue::new(),
            degrader,
            scratch: Vec::new(),
            tick: 0,
            stats: DispatchStats::default(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn set_tick(&mut self, tick: u32) {
        self.tick = tick;
    }

    pub fn advance_tick(&mut self) -> u32 {
        self.tick = self.tick.wrapping_add(1);
        self.tick
    }

    pub fn degrader(&self) -> Option<&LinkDegrader> {
        self.degrader.as_ref()
    }

    pub fn set_link_conditioner(&mut self, config: Option<LinkConditionerConfig>) {
        let config = config.filter(|c| c.enabled);
        match (&mut self.degrader, config) {
            (Some(degrader), Some(config)) => degrader.set_config(config),
            (slot, Some(config)) => *slot = Some(LinkDegrader::new(config)),
            (slot, None) => {
                if slot.is_some() {
                    log::debug!("link conditioner disabled, held frames dropped");
                }
                *slot = None;
            }
        }
    }

    pub fn is_connected(&self, remote: Remote) -> bool {
        self.peers.contains_key(&remote)
    }

    pub fn remotes(&self) -> impl Iterator<Item = Remote> + '_ {
        self.peers.keys().copied()
    }

    pub fn is_dirty(&self, remote: Remote) -> bool {
        self.peers
            .get(&remote)
            .is_some_and(|p| p.outbox.is_dirty())
    }

    pub fn is_disconnecting(&self, remote: Remote) -> bool {
        self.peers.get(&remote).is_some_and(|p| p.disconnecting)
    }

    pub fn written_count(&self, remote: Remote, channel: Channel) -> usize {
        self.peers
            .get(&remote)
            .map_or(0, |p| p.outbox.sequence(channel).written_count())
    }

    pub fn drain_queue(&self) -> &DisconnectDrainQueue {
        &self.drain
    }

    /// Creates outgoing and reassembly state for a new connection.
    pub fn add_remote(
        &mut self,
        remote: Remote,
        mtus: [usize; CHANNEL_COUNT],
    ) -> Result<(), WireError> {
        if self.peers.contains_key(&remote) {
            log::debug!("{} already connected", remote);
            return Ok(());
        }

        let outbox = PeerOutbox::new(mtus, self.layout, &mut self.pool)?;
        let max_fragments = self.config.max_fragments;
        let reassemblers = [
            Reassembler::new(mtus[Channel::Reliable.index()], max_fragments),
            Reassembler::new(mtus[Channel::Unreliable.index()], max_fragments),
        ];

        self.peers.insert(
            remote,
            PeerState {
                outbox,
                reassemblers,
                disconnecting: false,
            },
        );
        log::debug!("{} connected (mtu {:?})", remote, mtus);
        Ok(())
    }

    /// Tears down a connection's state, returning its frames to the pool.
    pub fn remove_remote(&mut self, remote: Remote) -> bool {
        let Some(peer) = self.peers.remove(&remote) else {
            return false;
        };

        peer.outbox.teardown(&mut self.pool);
        self.dirty[remote.direction().index()].remove(remote);
        self.drain.remove(remote);
        if let Some(degrader) = &mut self.degrader {
            degrader.forget(remote);
        }
        log::debug!("{} removed", remote);
        true
    }

    /// Queues `payload` for `remote`. Failures are logged and the payload
    /// dropped; see [`NetworkSession::try_enqueue`].
    pub fn enqueue(
        &mut self,
        remote: Remote,
        channel: Channel,
        payload: &[u8],
        force_new_buffer: bool,
    ) {
        if let Err(e) = self.try_enqueue(remote, channel, payload, force_new_buffer) {
            match e {
                WireError::UnknownRemote(_) => log::warn!(
                    "dropping {} byte message: {}",
                    payload.len(),
                    e
                ),
                _ => log::error!(
                    "dropping {} byte message for {}: {}",
                    payload.len(),
                    remote,
                    e
                ),
            }
            self.stats.writes_dropped += 1;
        }
    }

    /// Queues `payload` for `remote`, marking it dirty. Payloads that do not
    /// fit one frame are fragmented onto the reliable channel.
    pub fn try_enqueue(
        &mut self,
        remote: Remote,
        channel: Channel,
        payload: &[u8],
        force_new_buffer: bool,
    ) -> Result<(), WireError> {
        let peer = self
            .peers
            .get_mut(&remote)
            .ok_or(WireError::UnknownRemote(remote))?;
        if payload.is_empty() {
            return Ok(());
        }

        let fits = |max_payload: usize| {
            payload.len() <= MAX_MESSAGE_LEN && MESSAGE_HEADER_LEN + payload.len() <= max_payload
        };

        let target = if fits(peer.outbox.sequence(channel).max_payload()) {
            Some(channel)
        } else if fits(peer.outbox.sequence(Channel::Reliable).max_payload()) {
            Some(Channel::Reliable)
        } else {
            None
        };

        match target {
            Some(target) => {
                self.scratch.clear();
                encode_message(payload, &mut self.scratch);
                peer.outbox.sequence_mut(target).write(
                    self.tick,
                    &self.scratch,
                    force_new_buffer,
                    &mut self.pool,
                )?;
            }
            None => {
                if !channel.is_reliable() {
                    log::debug!(
                        "{} byte unreliable message for {} sent as reliable fragments",
                        payload.len(),
                        remote
                    );
                }
                let count = self.fragmenter.split(
                    self.tick,
                    payload,
                    peer.outbox.sequence_mut(Channel::Reliable),
                    &mut self.pool,
                )?;
                self.stats.messages_fragmented += 1;
                self.stats.fragments_written += count as u64;
            }
        }

        self.stats.messages_enqueued += 1;
        if peer.outbox.mark_dirty() {
            self.dirty[remote.direction().index()].push(remote);
        }
        Ok(())
    }

    /// Drops everything queued for `remote` without sending it. A remote
    /// that is disconnecting stays queued so its drain window still starts.
    pub fn clear_outbox(&mut self, remote: Remote) {
        let Some(peer) = self.peers.get_mut(&remote) else {
            return;
        };

        peer.outbox.clear();
        let dirty = &mut self.dirty[remote.direction().index()];
        if peer.disconnecting {
            peer.outbox.mark_dirty();
            if !dirty.contains(remote) {
                dirty.push(remote);
            }
        } else {
            dirty.remove(remote);
        }
    }

    /// Flags `remote` for a graceful disconnect. Its queued data keeps
    /// flushing until the drain window has passed.
    pub fn mark_disconnecting(&mut self, remote: Remote) -> bool {
        let Some(peer) = self.peers.get_mut(&remote) else {
            return false;
        };

        peer.disconnecting = true;
        if peer.outbox.mark_dirty() {
            self.dirty[remote.direction().index()].push(remote);
        }
        log::debug!("{} marked disconnecting at tick {}", remote, self.tick);
        true
    }

    /// Sends every queued frame for dirty remotes in `direction`, then
    /// releases any frames the link degrader is due to deliver. Returns the
    /// number of frames taken from outboxes.
    pub fn iterate_outgoing<T: Transport + ?Sized>(
        &mut self,
        direction: Direction,
        transport: &mut T,
        now: Instant,
    ) -> usize {
        let dirty = &mut self.dirty[direction.index()];
        let queued = dirty.len();
        let mut sent = 0;

        for i in 0..queued {
            let Some(remote) = dirty.get(i) else {
                break;
            };
            let Some(peer) = self.peers.get_mut(&remote) else {
                continue;
            };

            for channel in Channel::ALL {
                let sequence = peer.outbox.sequence_mut(channel);
                let count = sequence.written_count();
                if count == 0 {
                    continue;
                }

                for index in 0..count {
                    let frame = match sequence.get_buffer(index) {
                        Ok(frame) => frame,
                        Err(e) => {
                            log::warn!("nothing to send for {}: {}", remote, e);
                            continue;
                        }
                    };
                    if !frame.has_data() {
                        continue;
                    }

                    let bytes = frame.as_bytes();
                    sent += 1;

                    match &mut self.degrader {
                        Some(degrader) => degrader.enqueue(channel, bytes, direction, remote, now),
                        None => {
                            transport.send(channel, bytes, remote);
                            self.stats.frames_sent += 1;
                            self.stats.bytes_sent += bytes.len() as u64;
                        }
                    }
                }

                sequence.reset();
            }

            peer.outbox.clear_dirty();

            if peer.disconnecting && !self.drain.contains(remote) {
                let after = self
                    .tick
                    .wrapping_add(self.config.disconnect_drain_ticks());
                self.drain.push(remote, after);
                log::debug!("{} will be stopped at tick {}", remote, after);
            }
        }

        dirty.finish_pass(queued);

        if let Some(degrader) = &mut self.degrader {
            let released = degrader.flush(direction, now, transport);
            self.stats.frames_sent += released.frames as u64;
            self.stats.bytes_sent += released.bytes as u64;
        }
        transport.iterate_outgoing(direction);

        sent
    }

    /// Hard-stops every disconnecting remote whose drain window has passed.
    /// Frames the link degrader still holds for it are sent first.
    pub fn process_disconnects<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Vec<Remote> {
        let due = self.drain.take_due(self.tick);
        for remote in &due {
            if let Some(degrader) = &mut self.degrader {
                let released = degrader.release_remote(*remote, transport);
                if released.frames > 0 {
                    log::debug!(
                        "released {} held frames for {} before stopping",
                        released.frames,
                        remote
                    );
                }
                self.stats.frames_sent += released.frames as u64;
                self.stats.bytes_sent += released.bytes as u64;
            }
            transport.stop_connection(*remote);
            self.remove_remote(*remote);
            self.stats.disconnects_completed += 1;
            log::debug!("{} stopped at tick {}", remote, self.tick);
        }
        due
    }

    /// Pumps the transport's incoming side: lifecycle events and frames.
    /// Returns the number of messages delivered to `handler`.
    pub fn iterate_incoming<T, H>(&mut self, transport: &mut T, handler: &mut H) -> usize
    where
        T: Transport + ?Sized,
        H: MessageHandler + ?Sized,
    {
        let mtus = [
            transport.mtu(Channel::Reliable),
            transport.mtu(Channel::Unreliable),
        ];
        let mut delivered = 0;

        for event in transport.iterate_incoming() {
            match event {
                TransportEvent::Connected(remote) => match self.add_remote(remote, mtus) {
                    Ok(()) => handler.on_connected(remote),
                    Err(e) => log::error!("cannot track {}: {}", remote, e),
                },
                TransportEvent::Disconnected(remote) => {
                    if self.remove_remote(remote) {
                        handler.on_disconnected(remote);
                    }
                }
                TransportEvent::Data {
                    remote,
                    channel,
                    payload,
                } => {
                    delivered += self.receive_frame(remote, channel, &payload, handler);
                }
            }
        }

        delivered
    }

    /// Splits one received frame into messages, routing fragments through the
    /// remote's reassembler.
    pub fn receive_frame<H: MessageHandler + ?Sized>(
        &mut self,
        remote: Remote,
        channel: Channel,
        frame: &[u8],
        handler: &mut H,
    ) -> usize {
        let Some(peer) = self.peers.get_mut(&remote) else {
            log::warn!("dropping {} byte frame from unknown {}", frame.len(), remote);
            return 0;
        };

        self.stats.frames_received += 1;
        self.stats.bytes_received += frame.len() as u64;

        let Some(tick) = self.layout.read_tick(frame) else {
            log::warn!("frame from {} shorter than reserve", remote);
            self.stats.frames_malformed += 1;
            return 0;
        };

        let mut delivered = 0;
        for item in ItemReader::new(&frame[self.layout.len()..]) {
            match item {
                Ok(Item::Message(body)) => {
                    handler.on_message_received(remote, channel, body);
                    delivered += 1;
                }
                Ok(Item::Split {
                    fragment_count,
                    chunk,
                }) => {
                    let reassembler = &mut peer.reassemblers[channel.index()];
                    match reassembler.read(tick, fragment_count, chunk) {
                        Ok(Some(message)) => {
                            handler.on_message_received(remote, channel, message);
                            delivered += 1;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            log::warn!("reassembly failed for {}: {}", remote, e);
                            self.stats.reassembly_failures += 1;
                        }
                    }
                }
                Err(e) => {
                    log::warn!("malformed frame from {}: {}", remote, e);
                    self.stats.frames_malformed += 1;
                    break;
                }
            }
        }

        self.stats.messages_delivered += delivered as u64;
        delivered
    }

    /// Tears down every connection and returns all frames to the pool.
    pub fn shutdown(&mut self) {
        let remotes: Vec<Remote> = self.peers.keys().copied().collect();
        for remote in remotes {
            self.remove_remote(remote);
        }
    }
}
