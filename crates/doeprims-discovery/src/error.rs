/// Errors that can occur while running or answering DOE Discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Frame-level error on a discovery object.
    #[error("frame error: {0}")]
    Frame(#[from] doeprims_frame::FrameError),

    /// Mailbox transport error.
    #[error("transport error: {0}")]
    Transport(#[from] doeprims_transport::TransportError),

    /// The responder's `next_index` chain revisited an index or never ended.
    #[error("discovery loop detected at index {index} after {iterations} requests")]
    LoopDetected { index: u8, iterations: usize },

    /// The responder answered with the invalid-entry marker.
    #[error("no discovery entry at index {0}")]
    NoSuchEntry(u8),

    /// A non-discovery object came back for a discovery request.
    #[error("unexpected object (vendor {vendor_id:#06x}, type {data_object_type:#04x}) in discovery")]
    UnexpectedObject { vendor_id: u16, data_object_type: u8 },

    /// A discovery payload is too short or arrived out of order.
    #[error("malformed discovery message: {0}")]
    Malformed(String),

    /// A responder table may hold at most 256 entries.
    #[error("discovery table has {0} entries, max 256")]
    TableTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
