use crate::channel::Remote;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("payload of {len} bytes exceeds frame capacity of {capacity} bytes")]
    OversizedWrite { len: usize, capacity: usize },
    #[error("buffer index {index} out of range ({written} written this round)")]
    BufferOutOfRange { index: usize, written: usize },
    #[error("fragmentation of {len} bytes requested but it needs only {required} fragment(s)")]
    FragmentationMisuse { len: usize, required: usize },
    #[error("fragment count {count} exceeds limit of {limit}")]
    FragmentLimitExceeded { count: u32, limit: u32 },
    #[error("fragment of {len} bytes overflows reassembly buffer at {position} (capacity {capacity})")]
    FragmentOverflow {
        position: usize,
        len: usize,
        capacity: usize,
    },
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),
    #[error("unknown packet id {0}")]
    UnknownPacketId(u16),
    #[error("no connection state for {0}")]
    UnknownRemote(Remote),
    #[error("mtu of {mtu} bytes leaves no room after a {reserve} byte reserve")]
    MtuTooSmall { mtu: usize, reserve: usize },
}
