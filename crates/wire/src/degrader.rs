//! Link degrader: holds outgoing frames back to simulate latency, loss and
//! one-step reordering. Test instrumentation only.

use std::collections::VecDeque;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::channel::{CHANNEL_COUNT, Channel, Direction, Remote};
use crate::config::LinkConditionerConfig;
use crate::stats::DegraderStats;
use crate::transport::Transport;

#[derive(Debug)]
struct DelayedFrame {
    release_time: Instant,
    remote: Remote,
    payload: Vec<u8>,
}

/// Frames and bytes handed to the transport by one release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Released {
    pub frames: usize,
    pub bytes: usize,
}

impl Released {
    fn add(&mut self, payload: &[u8]) {
        self.frames += 1;
        self.bytes += payload.len();
    }
}

pub struct LinkDegrader {
    config: LinkConditionerConfig,
    rng: StdRng,
    // [direction][channel]
    pending: [[VecDeque<DelayedFrame>; CHANNEL_COUNT]; 2],
    stats: DegraderStats,
}

impl LinkDegrader {
    pub fn new(config: LinkConditionerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            config,
            rng,
            pending: Default::default(),
            stats: DegraderStats::default(),
        }
    }

    pub fn config(&self) -> &LinkConditionerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: LinkConditionerConfig) {
        if let Some(seed) = config.seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.config = config;
    }

    pub fn stats(&self) -> &DegraderStats {
        &self.stats
    }

    fn roll(&mut self, percent: f32) -> bool {
        if percent <= 0.0 {
            return false;
        }
        self.rng.random::<f32>() * 100.0 < percent
    }

    pub fn enqueue(
        &mut self,
        channel: Channel,
        payload: &[u8],
        direction: Direction,
        remote: Remote,
        now: Instant,
    ) {
        let mut release_time = now + self.config.latency();

        if self.roll(self.config.loss_percent) {
            if !channel.is_reliable() {
                self.stats.frames_dropped += 1;
                return;
            }
            release_time += self.config.resend_penalty();
            self.stats.frames_resent += 1;
        }

        let frame = DelayedFrame {
            release_time,
            remote,
            payload: payload.to_vec(),
        };
        self.stats.frames_delayed += 1;

        let reorder = !channel.is_reliable() && self.roll(self.config.reorder_percent);
        let queue = &mut self.pending[direction.index()][channel.index()];

        if reorder && !queue.is_empty() {
            queue.insert(queue.len() - 1, frame);
            self.stats.frames_reordered += 1;
        } else {
            queue.push_back(frame);
        }
    }

    /// Hands every due frame for `direction` to the transport, oldest first,
    /// stopping at the first frame still held back on each channel.
    pub fn flush<T: Transport + ?Sized>(
        &mut self,
        direction: Direction,
        now: Instant,
        transport: &mut T,
    ) -> Released {
        let mut released = Released::default();

        for channel in Channel::ALL {
            let queue = &mut self.pending[direction.index()][channel.index()];
            while queue.front().is_some_and(|f| f.release_time <= now) {
                if let Some(frame) = queue.pop_front() {
                    transport.send(channel, &frame.payload, frame.remote);
                    released.add(&frame.payload);
                }
            }
        }

        self.stats.frames_released += released.frames as u64;
        released
    }

    /// Sends everything still held for `remote` right away, keeping the
    /// per-channel order. Used before a connection is stopped.
    pub fn release_remote<T: Transport + ?Sized>(
        &mut self,
        remote: Remote,
        transport: &mut T,
    ) -> Released {
        let mut released = Released::default();

        for direction in self.pending.iter_mut() {
            for channel in Channel::ALL {
                let queue = &mut direction[channel.index()];
                let (held, kept): (VecDeque<_>, VecDeque<_>) =
                    queue.drain(..).partition(|f| f.remote == remote);
                *queue = kept;
                for frame in held {
                    transport.send(channel, &frame.payload, frame.remote);
                    released.add(&frame.payload);
                }
            }
        }

        self.stats.frames_released += released.frames as u64;
        released
    }

    pub fn pending_for(&self, remote: Remote) -> usize {
        self.pending
            .iter()
            .flatten()
            .map(|q| q.iter().filter(|f| f.remote == remote).count())
            .sum()
    }

    pub fn pending_len(&self, direction: Direction) -> usize {
        self.pending[direction.index()].iter().map(VecDeque::len).sum()
    }

    /// Drops frames still held for `remote`.
    pub fn forget(&mut self, remote: Remote) {
        for queue in self.pending.iter_mut().flatten() {
            queue.retain(|f| f.remote != remote);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PeerId;
    use crate::transport::TransportEvent;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<(Channel, Vec<u8>, Remote)>,
    }

    impl Transport for Recorder {
        fn send(&mut self, channel: Channel, payload: &[u8], remote: Remote) {
            self.sent.push((channel, payload.to_vec(), remote));
        }

        fn mtu(&self, _channel: Channel) -> usize {
            1200
        }

        fn stop_connection(&mut self, _remote: Remote) {}

        fn iterate_incoming(&mut self) -> Vec<TransportEvent> {
            Vec::new()
        }
    }

    fn config(latency_ms: u32, loss_percent: f32, reorder_percent: f32) -> LinkConditionerConfig {
        LinkConditionerConfig {
            enabled: true,
            latency_ms,
            loss_percent,
            reorder_percent,
            seed: Some(7),
        }
    }

    const PEER: Remote = Remote::Peer(PeerId(1));

    #[test]
    fn frames_wait_for_latency() {
        let mut degrader = LinkDegrader::new(config(50, 0.0, 0.0));
        let mut transport = Recorder::default();
        let start = Instant::now();

        degrader.enqueue(Channel::Reliable, &[1], Direction::ToPeers, PEER, start);
        degrader.enqueue(
            Channel::Unreliable,
            &[2],
            Direction::ToPeers,
            PEER,
            start + Duration::from_millis(10),
        );

        assert_eq!(degrader.flush(Direction::ToPeers, start, &mut transport).frames, 0);
        let released = degrader.flush(
            Direction::ToPeers,
            start + Duration::from_millis(50),
            &mut transport,
        );
        assert_eq!(released, Released { frames: 1, bytes: 1 });
        assert_eq!(transport.sent[0].1, vec![1]);

        let released = degrader.flush(
            Direction::ToPeers,
            start + Duration::from_millis(60),
            &mut transport,
        );
        assert_eq!(released.frames, 1);
        assert_eq!(degrader.pending_len(Direction::ToPeers), 0);
    }

    #[test]
    fn directions_are_independent() {
        let mut degrader = LinkDegrader::new(config(0, 0.0, 0.0));
        let mut transport = Recorder::default();
        let now = Instant::now();

        degrader.enqueue(Channel::Reliable, &[1], Direction::ToServer, Remote::Server, now);
        assert_eq!(degrader.flush(Direction::ToPeers, now, &mut transport).frames, 0);
        assert_eq!(degrader.flush(Direction::ToServer, now, &mut transport).frames, 1);
        assert_eq!(transport.sent[0].2, Remote::Server);
    }

    #[test]
    fn total_loss_drops_unreliable_but_delays_reliable() {
        let mut degrader = LinkDegrader::new(config(10, 100.0, 0.0));
        let mut transport = Recorder::default();
        let now = Instant::now();

        degrader.enqueue(Channel::Unreliable, &[1], Direction::ToPeers, PEER, now);
        degrader.enqueue(Channel::Reliable, &[2], Direction::ToPeers, PEER, now);

        assert_eq!(degrader.stats().frames_dropped, 1);
        assert_eq!(degrader.stats().frames_resent, 1);
        assert_eq!(degrader.pending_len(Direction::ToPeers), 1);

        let after_latency = now + Duration::from_millis(10);
        assert_eq!(
            degrader.flush(Direction::ToPeers, after_latency, &mut transport).frames,
            0
        );
        let after_resend = now + Duration::from_millis(30);
        assert_eq!(
            degrader.flush(Direction::ToPeers, after_resend, &mut transport).frames,
            1
        );
        assert_eq!(transport.sent, vec![(Channel::Reliable, vec![2], PEER)]);
    }

    #[test]
    fn total_reorder_swaps_with_tail() {
        let mut degrader = LinkDegrader::new(config(0, 0.0, 100.0));
        let mut transport = Recorder::default();
        let now = Instant::now();

        for byte in 1..=3u8 {
            degrader.enqueue(Channel::Unreliable, &[byte], Direction::ToPeers, PEER, now);
        }
        degrader.flush(Direction::ToPeers, now, &mut transport);

        let order: Vec<u8> = transport.sent.iter().map(|(_, p, _)| p[0]).collect();
        // [1] -> [2, 1] -> [2, 3, 1]
        assert_eq!(order, vec![2, 3, 1]);
        assert_eq!(degrader.stats().frames_reordered, 2);
    }

    #[test]
    fn reliable_is_never_reordered() {
        let mut degrader = LinkDegrader::new(config(0, 0.0, 100.0));
        let mut transport = Recorder::default();
        let now = Instant::now();

        for byte in 1..=3u8 {
            degrader.enqueue(Channel::Reliable, &[byte], Direction::ToPeers, PEER, now);
        }
        degrader.flush(Direction::ToPeers, now, &mut transport);

        let order: Vec<u8> = transport.sent.iter().map(|(_, p, _)| p[0]).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn forget_drops_held_frames() {
        let mut degrader = LinkDegrader::new(config(100, 0.0, 0.0));
        let now = Instant::now();
        degrader.enqueue(Channel::Reliable, &[1], Direction::ToPeers, PEER, now);
        degrader.forget(PEER);
        assert_eq!(degrader.pending_len(Direction::ToPeers), 0);
    }

    #[test]
    fn release_remote_skips_latency_for_one_peer() {
        let mut degrader = LinkDegrader::new(config(200, 0.0, 0.0));
        let mut transport = Recorder::default();
        let other = Remote::Peer(PeerId(2));
        let now = Instant::now();

        degrader.enqueue(Channel::Unreliable, &[3], Direction::ToPeers, PEER, now);
        degrader.enqueue(Channel::Reliable, &[1, 1], Direction::ToPeers, PEER, now);
        degrader.enqueue(Channel::Reliable, &[9], Direction::ToPeers, other, now);
        degrader.enqueue(Channel::Reliable, &[2], Direction::ToPeers, PEER, now);

        let released = degrader.release_remote(PEER, &mut transport);
        assert_eq!(released, Released { frames: 3, bytes: 4 });
        let order: Vec<Vec<u8>> = transport.sent.iter().map(|(_, p, _)| p.clone()).collect();
        assert_eq!(order, vec![vec![1, 1], vec![2], vec![3]]);

        assert_eq!(degrader.pending_for(PEER), 0);
        assert_eq!(degrader.pending_for(other), 1);
    }
}
