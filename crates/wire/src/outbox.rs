use crate::channel::{CHANNEL_COUNT, Channel};
use crate::error::WireError;
use crate::frame::{BufferPool, FrameSequence, ReserveLayout};

/// Per-remote outgoing frames, one sequence per channel.
#[derive(Debug)]
pub struct PeerOutbox {
    sequences: [FrameSequence; CHANNEL_COUNT],
    dirty: bool,
}

impl PeerOutbox {
    pub fn new(
        mtus: [usize; CHANNEL_COUNT],
        layout: ReserveLayout,
        pool: &mut BufferPool,
    ) -> Result<Self, WireError> {
        let reliable = FrameSequence::new(mtus[Channel::Reliable.index()], layout, pool)?;
        let unreliable = match FrameSequence::new(mtus[Channel::Unreliable.index()], layout, pool) {
            Ok(seq) => seq,
            Err(e) => {
                reliable.teardown(pool);
                return Err(e);
            }
        };

        Ok(Self {
            sequences: [reliable, unreliable],
            dirty: false,
        })
    }

    pub fn sequence(&self, channel: Channel) -> &FrameSequence {
        &self.sequences[channel.index()]
    }

    pub fn sequence_mut(&mut self, channel: Channel) -> &mut FrameSequence {
        &mut self.sequences[channel.index()]
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Sets the dirty flag, returning true if it was previously clear.
    pub fn mark_dirty(&mut self) -> bool {
        !std::mem::replace(&mut self.dirty, true)
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn written_count(&self) -> usize {
        self.sequences.iter().map(FrameSequence::written_count).sum()
    }

    /// Drops everything queued without sending it.
    pub fn clear(&mut self) {
        for seq in &mut self.sequences {
            seq.reset();
        }
        self.dirty = false;
    }

    pub fn teardown(self, pool: &mut BufferPool) {
        for seq in self.sequences {
            seq.teardown(pool);
        }
    }
}
