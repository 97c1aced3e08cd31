use crate::error::WireError;

/// Rebuilds a fragmented payload for one (remote, channel).
///
/// Fragments are keyed by the tick stamped into their frame. A fragment with a
/// different tick than the sequence in progress discards the partial state and
/// starts over; that is expected under loss and is not an error.
#[derive(Debug)]
pub struct Reassembler {
    tick: u32,
    expected: u32,
    received: u32,
    position: usize,
    active: bool,
    buffer: Vec<u8>,
    mtu: usize,
    max_fragments: u32,
}

impl Reassembler {
    pub fn new(mtu: usize, max_fragments: u32) -> Self {
        Self {
            tick: 0,
            expected: 0,
            received: 0,
            position: 0,
            active: false,
            buffer: Vec::new(),
            mtu,
            max_fragments,
        }
    }

    fn restart(&mut self, tick: u32, expected: u32) {
        if self.active && self.received > 0 {
            log::trace!(
                "discarding stale fragments for tick {} ({}/{} received)",
                self.tick,
                self.received,
                self.expected
            );
        }

        self.tick = tick;
        self.expected = expected;
        self.received = 0;
        self.position = 0;
        self.active = true;

        let needed = self.mtu * expected as usize;
        if self.buffer.len() < needed {
            self.buffer.resize(needed, 0);
        }
    }

    /// Feeds one fragment. Returns the rebuilt payload once all fragments of
    /// the sequence have arrived, `None` while more are pending.
    pub fn read(
        &mut self,
        tick: u32,
        expected: u32,
        chunk: &[u8],
    ) -> Result<Option<&[u8]>, WireError> {
        if expected == 0 || expected > self.max_fragments {
            self.active = false;
            return Err(WireError::FragmentLimitExceeded {
                count: expected,
                limit: self.max_fragments,
            });
        }

        if !self.active || tick != self.tick {
            self.restart(tick, expected);
        }

        let end = self.position + chunk.len();
        if end > self.buffer.len() {
            self.active = false;
            return Err(WireError::FragmentOverflow {
                position: self.position,
                len: chunk.len(),
                capacity: self.buffer.len(),
            });
        }

        self.buffer[self.position..end].copy_from_slice(chunk);
        self.position = end;
        self.received += 1;

        if self.received < self.expected {
            return Ok(None);
        }

        self.active = false;
        Ok(Some(&self.buffer[..self.position]))
    }

    pub fn is_pending(&self) -> bool {
        self.active
    }

    pub fn progress(&self) -> (u32, u32) {
        (self.received, self.expected)
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{BufferPool, FrameSequence, ReserveLayout};
    use crate::fragment::Fragmenter;
    use crate::packet::{Item, ItemReader};

    #[test]
    fn rebuilds_fragmented_payload() {
        let mut pool = BufferPool::new();
        let layout = ReserveLayout::new(4);
        let mut seq = FrameSequence::new(1200, layout, &mut pool).unwrap();
        let payload: Vec<u8> = (0..5000u32).map(|i| (i * 7) as u8).collect();

        Fragmenter::new(64)
            .split(42, &payload, &mut seq, &mut pool)
            .unwrap();

        let mut reassembler = Reassembler::new(1200, 64);
        let mut output = None;
        for frame in seq.frames() {
            let tick = layout.read_tick(frame.as_bytes()).unwrap();
            for item in ItemReader::new(frame.payload()) {
                if let Item::Split {
                    fragment_count,
                    chunk,
                } = item.unwrap()
                {
                    assert!(output.is_none());
                    if let Some(done) = reassembler.read(tick, fragment_count, chunk).unwrap() {
                        output = Some(done.to_vec());
                    }
                }
            }
        }

        assert_eq!(output, Some(payload));
        assert!(!reassembler.is_pending());
    }

    #[test]
    fn stale_sequence_is_discarded() {
        let mut reassembler = Reassembler::new(16, 64);

        assert_eq!(reassembler.read(5, 3, &[1, 1]).unwrap(), None);
        assert_eq!(reassembler.read(5, 3, &[2, 2]).unwrap(), None);

        assert_eq!(reassembler.read(6, 2, &[3, 3]).unwrap(), None);
        assert_eq!(reassembler.progress(), (1, 2));

        let done = reassembler.read(6, 2, &[4]).unwrap();
        assert_eq!(done, Some(&[3u8, 3, 4][..]));
    }

    #[test]
    fn same_tick_restarts_after_completion() {
        let mut reassembler = Reassembler::new(16, 64);

        assert!(reassembler.read(9, 2, &[1]).unwrap().is_none());
        assert_eq!(reassembler.read(9, 2, &[2]).unwrap(), Some(&[1u8, 2][..]));

        assert!(reassembler.read(9, 2, &[3]).unwrap().is_none());
        assert_eq!(reassembler.read(9, 2, &[4]).unwrap(), Some(&[3u8, 4][..]));
    }

    #[test]
    fn buffer_grows_only_when_needed() {
        let mut reassembler = Reassembler::new(100, 64);
        reassembler.read(1, 4, &[0; 10]).unwrap();
        assert_eq!(reassembler.capacity(), 400);

        reassembler.read(2, 2, &[0; 10]).unwrap();
        assert_eq!(reassembler.capacity(), 400);
    }

    #[test]
    fn rejects_bad_counts_and_overflow() {
        let mut reassembler = Reassembler::new(4, 8);

        assert!(matches!(
            reassembler.read(1, 0, &[1]),
            Err(WireError::FragmentLimitExceeded { .. })
        ));
        assert!(matches!(
            reassembler.read(1, 9, &[1]),
            Err(WireError::FragmentLimitExceeded { .. })
        ));

        assert!(matches!(
            reassembler.read(2, 1, &[0; 5]),
            Err(WireError::FragmentOverflow { .. })
        ));
        assert!(!reassembler.is_pending());
    }
}
