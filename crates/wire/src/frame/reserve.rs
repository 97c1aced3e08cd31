use serde::{Deserialize, Serialize};

pub const TICK_BYTES: usize = 4;

/// Layout of the prefix reserved at the start of every frame.
///
/// The composition order is fixed: `[tick: u32 LE][extra: extra bytes]`.
/// The extra region is zero-filled when the tick is stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReserveLayout {
    pub extra: usize,
}

impl ReserveLayout {
    pub fn new(extra: usize) -> Self {
        Self { extra }
    }

    #[inline]
    pub fn len(&self) -> usize {
        TICK_BYTES + self.extra
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn stamp(&self, prefix: &mut [u8], tick: u32) {
        prefix[..TICK_BYTES].copy_from_slice(&tick.to_le_bytes());
        prefix[TICK_BYTES..self.len()].fill(0);
    }

    pub fn read_tick(&self, frame: &[u8]) -> Option<u32> {
        if frame.len() < self.len() {
            return None;
        }
        let mut bytes = [0u8; TICK_BYTES];
        bytes.copy_from_slice(&frame[..TICK_BYTES]);
        Some(u32::from_le_bytes(bytes))
    }

    pub fn extra_bytes<'a>(&self, frame: &'a [u8]) -> Option<&'a [u8]> {
        frame.get(TICK_BYTES..self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_precedes_extra_reserve() {
        let layout = ReserveLayout::new(4);
        let mut prefix = [0xAAu8; 8];
        layout.stamp(&mut prefix, 0x0102_0304);

        assert_eq!(&prefix[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&prefix[4..], &[0, 0, 0, 0]);
        assert_eq!(layout.read_tick(&prefix), Some(0x0102_0304));
        assert_eq!(layout.extra_bytes(&prefix), Some(&[0u8, 0, 0, 0][..]));
    }

    #[test]
    fn short_frame_has_no_tick() {
        let layout = ReserveLayout::new(2);
        assert_eq!(layout.read_tick(&[1, 2, 3, 4, 5]), None);
    }
}
