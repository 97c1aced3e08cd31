use super::reserve::ReserveLayout;

/// One MTU-sized frame: a reserved prefix followed by packed payload bytes.
///
/// Invariant: `reserve <= length <= capacity <= data.len()`.
#[derive(Debug)]
pub struct FrameBuffer {
    data: Vec<u8>,
    capacity: usize,
    layout: ReserveLayout,
    length: usize,
    has_data: bool,
}

impl FrameBuffer {
    pub(crate) fn new(data: Vec<u8>, capacity: usize, layout: ReserveLayout) -> Self {
        debug_assert!(capacity <= data.len());
        debug_assert!(layout.len() <= capacity);

        Self {
            data,
            capacity,
            layout,
            length: layout.len(),
            has_data: false,
        }
    }

    pub fn reset(&mut self) {
        self.length = self.layout.len();
        self.has_data = false;
    }

    /// Appends `payload`, stamping the tick into the reserve on the first
    /// write since reset.
    ///
    /// The caller must already have checked `payload.len() <= self.remaining()`.
    pub(crate) fn write(&mut self, tick: u32, payload: &[u8]) {
        if !self.has_data {
            self.layout.stamp(&mut self.data[..self.layout.len()], tick);
        }

        let end = self.length + payload.len();
        self.data[self.length..end].copy_from_slice(payload);
        self.length = end;
        self.has_data = true;
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.length
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.has_data
    }

    #[inline]
    pub fn has_data(&self) -> bool {
        self.has_data
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reserve(&self) -> usize {
        self.layout.len()
    }

    /// Live byte range handed to the transport, reserve included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.length]
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[self.layout.len()..self.length]
    }

    pub fn tick(&self) -> Option<u32> {
        if self.has_data {
            self.layout.read_tick(self.as_bytes())
        } else {
            None
        }
    }

    pub(crate) fn into_data(self) -> Vec<u8> {
        self.data
    }
}
