use crate::error::WireError;
use crate::frame::{BufferPool, FrameSequence};
use crate::packet::{MAX_MESSAGE_LEN, SPLIT_HEADER_LEN, SplitHeader};

/// Splits a payload that does not fit one frame into ordered fragments.
///
/// Each fragment is a split header written with `force_new_buffer` followed by
/// its chunk, so header and chunk always share a frame and every fragment
/// starts on a fresh frame. The sequence is sealed afterwards so nothing is
/// appended behind the last chunk. Callers pass the reliable sequence.
#[derive(Debug, Clone, Copy)]
pub struct Fragmenter {
    max_fragments: u32,
}

impl Fragmenter {
    pub fn new(max_fragments: u32) -> Self {
        Self { max_fragments }
    }

    /// Chunk size for a frame of `max_payload` bytes. Capped at
    /// `MAX_MESSAGE_LEN` so anything too long for one message envelope
    /// always needs at least two fragments.
    pub fn max_chunk(max_payload: usize) -> usize {
        max_payload
            .saturating_sub(SPLIT_HEADER_LEN)
            .min(MAX_MESSAGE_LEN)
    }

    pub fn required_fragments(len: usize, max_payload: usize) -> usize {
        match Self::max_chunk(max_payload) {
            0 => usize::MAX,
            chunk => len.div_ceil(chunk),
        }
    }

    /// Writes `payload` as fragments and returns how many were written.
    pub fn split(
        &self,
        tick: u32,
        payload: &[u8],
        sequence: &mut FrameSequence,
        pool: &mut BufferPool,
    ) -> Result<usize, WireError> {
        let max_chunk = Self::max_chunk(sequence.max_payload());
        if max_chunk == 0 {
            return Err(WireError::MtuTooSmall {
                mtu: sequence.mtu(),
                reserve: sequence.reserve() + SPLIT_HEADER_LEN,
            });
        }

        let required = payload.len().div_ceil(max_chunk);
        if required <= 1 {
            return Err(WireError::FragmentationMisuse {
                len: payload.len(),
                required,
            });
        }
        if required > self.max_fragments as usize {
            return Err(WireError::FragmentLimitExceeded {
                count: u32::try_from(required).unwrap_or(u32::MAX),
                limit: self.max_fragments,
            });
        }

        let header = SplitHeader {
            fragment_count: required as u32,
        }
        .encode();

        for chunk in payload.chunks(max_chunk) {
            sequence.write(tick, &header, true, pool)?;
            sequence.write(tick, chunk, false, pool)?;
        }
        sequence.seal();

        log::trace!(
            "split {} bytes into {} fragments of up to {} bytes",
            payload.len(),
            required,
            max_chunk
        );
        Ok(required)
    }
}
