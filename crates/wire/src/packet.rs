//! Envelope written in front of every item packed into a frame.
//!
//! ```text
//! Message: [id: u16 = 1][len: u16][body: len bytes]
//! Split:   [id: u16 = 2][fragment_count: u32][chunk: rest of frame]
//! ```
//! All integers are little-endian.

use crate::error::WireError;

pub const PACKET_ID_BYTES: usize = 2;
pub const MESSAGE_HEADER_LEN: usize = PACKET_ID_BYTES + 2;
pub const SPLIT_HEADER_LEN: usize = PACKET_ID_BYTES + 4;
/// Largest body a message envelope can describe. Larger payloads are
/// always fragmented, and fragment chunks are capped at this size too.
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketId {
    Message,
    Split,
}

impl PacketId {
    pub fn to_u16(self) -> u16 {
        match self {
            Self::Message => 1,
            Self::Split => 2,
        }
    }

    pub fn from_u16(value: u16) -> Result<Self, WireError> {
        match value {
            1 => Ok(Self::Message),
            2 => Ok(Self::Split),
            other => Err(WireError::UnknownPacketId(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitHeader {
    pub fragment_count: u32,
}

impl SplitHeader {
    pub fn encode(&self) -> [u8; SPLIT_HEADER_LEN] {
        let mut out = [0u8; SPLIT_HEADER_LEN];
        out[..2].copy_from_slice(&PacketId::Split.to_u16().to_le_bytes());
        out[2..].copy_from_slice(&self.fragment_count.to_le_bytes());
        out
    }
}

/// Appends a message envelope and body to `out`.
pub fn encode_message(body: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&PacketId::Message.to_u16().to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
}

/// One item parsed from a frame payload.
#[derive(Debug, PartialEq, Eq)]
pub enum Item<'a> {
    Message(&'a [u8]),
    Split { fragment_count: u32, chunk: &'a [u8] },
}

/// Walks the items packed after a frame's reserve.
pub struct ItemReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
    done: bool,
}

impl<'a> ItemReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            cursor: 0,
            done: false,
        }
    }

    fn read_u16(&mut self) -> Result<u16, WireError> {
        let end = self.cursor + 2;
        let slice = self
            .bytes
            .get(self.cursor..end)
            .ok_or(WireError::MalformedFrame("truncated u16"))?;
        self.cursor = end;
        Ok(u16::from_le_bytes([slice[0], slice[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, WireError> {
        let end = self.cursor + 4;
        let slice = self
            .bytes
            .get(self.cursor..end)
            .ok_or(WireError::MalformedFrame("truncated u32"))?;
        self.cursor = end;
        Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
    }

    fn next_item(&mut self) -> Result<Item<'a>, WireError> {
        match PacketId::from_u16(self.read_u16()?)? {
            PacketId::Message => {
                let len = self.read_u16()? as usize;
                let end = self.cursor + len;
                let body = self
                    .bytes
                    .get(self.cursor..end)
                    .ok_or(WireError::MalformedFrame("message body truncated"))?;
                self.cursor = end;
                Ok(Item::Message(body))
            }
            PacketId::Split => {
                let fragment_count = self.read_u32()?;
                let chunk = &self.bytes[self.cursor..];
                self.cursor = self.bytes.len();
                Ok(Item::Split {
                    fragment_count,
                    chunk,
                })
            }
        }
    }
}

impl<'a> Iterator for ItemReader<'a> {
    type Item = Result<Item<'a>, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor >= self.bytes.len() {
            return None;
        }
        let item = self.next_item();
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}
