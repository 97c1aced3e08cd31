#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub messages_enqueued: u64,
    pub messages_fragmented: u64,
    pub fragments_written: u64,
    pub writes_dropped: u64,
    /// Frames handed to the transport. With a link degrader these are
    /// counted on release, so frames it drops never show up here.
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub frames_received: u64,
    pub bytes_received: u64,
    pub messages_delivered: u64,
    pub frames_malformed: u64,
    pub reassembly_failures: u64,
    pub disconnects_completed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DegraderStats {
    pub frames_delayed: u64,
    pub frames_dropped: u64,
    pub frames_resent: u64,
    pub frames_reordered: u64,
    pub frames_released: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_errors: u64,
}
