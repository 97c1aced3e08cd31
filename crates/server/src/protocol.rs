use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

pub const DEFAULT_PORT: u16 = 27016;

/// Application messages exchanged between the probe and the relay. The relay
/// echoes every message it receives, decoded or not.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum RelayMessage {
    Probe { sequence: u32, filler: Vec<u8> },
    /// Asks the relay to drain and close this connection.
    Leave,
}

impl RelayMessage {
    pub fn probe(sequence: u32, size: usize) -> Self {
        let filler = (0..size)
            .map(|i| (i as u32).wrapping_add(sequence) as u8)
            .collect();
        RelayMessage::Probe { sequence, filler }
    }

    pub fn encode(&self) -> Result<Vec<u8>, rancor::Error> {
        rkyv::to_bytes::<rancor::Error>(self).map(|aligned| aligned.into_vec())
    }

    /// Frames hand out message bodies at arbitrary offsets, so the bytes are
    /// copied to an aligned buffer before validation.
    pub fn decode(data: &[u8]) -> Result<Self, rancor::Error> {
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(&aligned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_survives_unaligned_slice() {
        let message = RelayMessage::probe(7, 300);
        let mut bytes = vec![0u8; 3];
        bytes.extend(message.encode().unwrap());

        assert_eq!(RelayMessage::decode(&bytes[3..]).unwrap(), message);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(RelayMessage::decode(&[1, 2, 3]).is_err());
    }
}
