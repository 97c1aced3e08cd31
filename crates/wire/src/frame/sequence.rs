use crate::error::WireError;

use super::buffer::FrameBuffer;
use super::pool::BufferPool;
use super::reserve::ReserveLayout;

/// Ordered frames queued for one channel to one destination during a tick.
///
/// Buffers are kept across ticks; `reset` only rewinds the write index.
#[derive(Debug)]
pub struct FrameSequence {
    buffers: Vec<FrameBuffer>,
    write_index: usize,
    layout: ReserveLayout,
    mtu: usize,
    sealed: bool,
}

impl FrameSequence {
    pub fn new(mtu: usize, layout: ReserveLayout, pool: &mut BufferPool) -> Result<Self, WireError> {
        if mtu <= layout.len() {
            return Err(WireError::MtuTooSmall {
                mtu,
                reserve: layout.len(),
            });
        }

        let first = FrameBuffer::new(pool.take(mtu), mtu, layout);
        Ok(Self {
            buffers: vec![first],
            write_index: 0,
            layout,
            mtu,
            sealed: false,
        })
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn reserve(&self) -> usize {
        self.layout.len()
    }

    /// Largest payload a single write can carry.
    #[inline]
    pub fn max_payload(&self) -> usize {
        self.mtu - self.layout.len()
    }

    pub fn write(
        &mut self,
        tick: u32,
        payload: &[u8],
        force_new_buffer: bool,
        pool: &mut BufferPool,
    ) -> Result<(), WireError> {
        if payload.len() > self.max_payload() {
            return Err(WireError::OversizedWrite {
                len: payload.len(),
                capacity: self.max_payload(),
            });
        }
        if payload.is_empty() {
            return Ok(());
        }

        let current = &self.buffers[self.write_index];
        let written_this_round = current.len() > self.layout.len();
        let roll = (force_new_buffer && written_this_round)
            || (self.sealed && written_this_round)
            || payload.len() > current.remaining();

        if roll {
            self.roll(pool);
        }

        self.buffers[self.write_index].write(tick, payload);
        Ok(())
    }

    fn roll(&mut self, pool: &mut BufferPool) {
        self.write_index += 1;
        self.sealed = false;

        if self.write_index < self.buffers.len() {
            self.buffers[self.write_index].reset();
        } else {
            let data = pool.take(self.mtu);
            self.buffers
                .push(FrameBuffer::new(data, self.mtu, self.layout));
        }
    }

    /// Closes the current buffer; the next write starts a new one.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn reset(&mut self) {
        self.write_index = 0;
        self.sealed = false;
        for buffer in &mut self.buffers {
            buffer.reset();
        }
    }

    pub fn written_count(&self) -> usize {
        let any = self.buffers[..=self.write_index]
            .iter()
            .any(FrameBuffer::has_data);
        if any { self.write_index + 1 } else { 0 }
    }

    pub fn get_buffer(&self, index: usize) -> Result<&FrameBuffer, WireError> {
        if index >= self.buffers.len() || index > self.write_index {
            return Err(WireError::BufferOutOfRange {
                index,
                written: self.written_count(),
            });
        }
        Ok(&self.buffers[index])
    }

    /// Frames that hold data this round, in write order.
    pub fn frames(&self) -> impl Iterator<Item = &FrameBuffer> {
        self.buffers[..self.written_count()]
            .iter()
            .filter(|b| b.has_data())
    }

    pub fn allocated(&self) -> usize {
        self.buffers.len()
    }

    /// Returns every frame array to the pool.
    pub fn teardown(self, pool: &mut BufferPool) {
        for buffer in self.buffers {
            pool.give(buffer.into_data());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(mtu: usize, extra: usize, pool: &mut BufferPool) -> FrameSequence {
        FrameSequence::new(mtu, ReserveLayout::new(extra), pool).unwrap()
    }

    #[test]
    fn small_payload_round_trips_in_one_frame() {
        let mut pool = BufferPool::new();
        let mut seq = sequence(1200, 0, &mut pool);
        let payload: Vec<u8> = (0..200u8).collect();

        seq.write(9, &payload, false, &mut pool).unwrap();

        assert_eq!(seq.written_count(), 1);
        let frame = seq.get_buffer(0).unwrap();
        assert_eq!(frame.payload(), payload.as_slice());
        assert_eq!(frame.tick(), Some(9));
    }

    #[test]
    fn overflow_rolls_at_mtu_edge() {
        let mut pool = BufferPool::new();
        let mut seq = sequence(1200, 0, &mut pool);

        seq.write(1, &[1u8; 700], false, &mut pool).unwrap();
        seq.write(1, &[2u8; 700], false, &mut pool).unwrap();

        assert_eq!(seq.written_count(), 2);
        assert_eq!(seq.get_buffer(0).unwrap().payload(), &[1u8; 700][..]);
        assert_eq!(seq.get_buffer(1).unwrap().payload(), &[2u8; 700][..]);
    }

    #[test]
    fn exact_fit_stays_in_one_frame() {
        let mut pool = BufferPool::new();
        let mut seq = sequence(1200, 0, &mut pool);

        seq.write(1, &[1u8; 600], false, &mut pool).unwrap();
        seq.write(1, &[2u8; 596], false, &mut pool).unwrap();

        assert_eq!(seq.written_count(), 1);
        assert_eq!(seq.get_buffer(0).unwrap().remaining(), 0);
    }

    #[test]
    fn force_new_buffer_only_rolls_when_written() {
        let mut pool = BufferPool::new();
        let mut seq = sequence(1200, 0, &mut pool);

        seq.write(1, &[1], true, &mut pool).unwrap();
        assert_eq!(seq.written_count(), 1);

        seq.write(1, &[2], true, &mut pool).unwrap();
        assert_eq!(seq.written_count(), 2);
        assert_eq!(seq.get_buffer(1).unwrap().payload(), &[2]);
    }

    #[test]
    fn sealed_frame_takes_no_more_writes() {
        let mut pool = BufferPool::new();
        let mut seq = sequence(1200, 0, &mut pool);

        seq.write(1, &[1], false, &mut pool).unwrap();
        seq.seal();
        seq.write(1, &[2], false, &mut pool).unwrap();
        seq.write(1, &[3], false, &mut pool).unwrap();

        assert_eq!(seq.written_count(), 2);
        assert_eq!(seq.get_buffer(1).unwrap().payload(), &[2, 3]);
    }

    #[test]
    fn oversized_and_empty_writes() {
        let mut pool = BufferPool::new();
        let mut seq = sequence(1200, 4, &mut pool);

        let err = seq.write(1, &[0u8; 1193], false, &mut pool).unwrap_err();
        assert_eq!(
            err,
            WireError::OversizedWrite {
                len: 1193,
                capacity: 1192
            }
        );

        seq.write(1, &[], true, &mut pool).unwrap();
        assert_eq!(seq.written_count(), 0);
    }

    #[test]
    fn reset_reuses_buffers() {
        let mut pool = BufferPool::new();
        let mut seq = sequence(1200, 0, &mut pool);

        for _ in 0..3 {
            seq.write(1, &[7u8; 1000], false, &mut pool).unwrap();
        }
        assert_eq!(seq.allocated(), 3);

        seq.reset();
        assert_eq!(seq.written_count(), 0);

        seq.write(2, &[8u8; 1000], false, &mut pool).unwrap();
        seq.write(2, &[8u8; 1000], false, &mut pool).unwrap();
        assert_eq!(seq.allocated(), 3);
        assert_eq!(seq.written_count(), 2);
        assert_eq!(seq.get_buffer(1).unwrap().tick(), Some(2));
    }

    #[test]
    fn get_buffer_bounds() {
        let mut pool = BufferPool::new();
        let mut seq = sequence(1200, 0, &mut pool);
        for _ in 0..3 {
            seq.write(1, &[7u8; 1000], false, &mut pool).unwrap();
        }
        seq.reset();
        seq.write(1, &[1], false, &mut pool).unwrap();

        assert!(seq.get_buffer(0).is_ok());
        // allocated but not written this round
        assert!(matches!(
            seq.get_buffer(1),
            Err(WireError::BufferOutOfRange { index: 1, written: 1 })
        ));
        assert!(seq.get_buffer(10).is_err());
    }

    #[test]
    fn teardown_returns_arrays() {
        let mut pool = BufferPool::new();
        let mut seq = sequence(1200, 0, &mut pool);
        seq.write(1, &[7u8; 1000], false, &mut pool).unwrap();
        seq.write(1, &[7u8; 1000], false, &mut pool).unwrap();

        seq.teardown(&mut pool);
        assert_eq!(pool.available(1200), 2);
    }

    #[test]
    fn mtu_must_exceed_reserve() {
        let mut pool = BufferPool::new();
        let result = FrameSequence::new(8, ReserveLayout::new(4), &mut pool);
        assert!(matches!(result, Err(WireError::MtuTooSmall { .. })));
    }
}
