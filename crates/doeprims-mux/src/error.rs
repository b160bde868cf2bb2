use bytes::Bytes;
use doeprims_frame::DW_SIZE;

/// Errors that can occur while routing DOE traffic.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] doeprims_frame::FrameError),

    /// Mailbox transport error.
    #[error("transport error: {0}")]
    Transport(#[from] doeprims_transport::TransportError),

    /// Discovery failed.
    #[error("discovery error: {0}")]
    Discovery(#[from] doeprims_discovery::DiscoveryError),

    /// No local handler for this `(vendor_id, data_object_type)`.
    ///
    /// `raw` is the whole object; it occupies `length_dw * 4` bytes on the wire.
    #[error(
        "unsupported data object (vendor {vendor_id:#06x}, type {data_object_type:#04x}, {length_dw} DW)"
    )]
    UnsupportedObjectType {
        vendor_id: u16,
        data_object_type: u8,
        length_dw: u32,
        raw: Bytes,
    },

    /// No local handler for this vendor-defined sub-protocol.
    #[error(
        "unsupported vendor protocol (standard {standard_id:#06x}, vendor {vendor_id:#06x}, protocol {pci_protocol:#04x})"
    )]
    UnsupportedVendorProtocol {
        standard_id: u16,
        vendor_id: u16,
        pci_protocol: u8,
    },

    /// A nested header is truncated or inconsistent.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The payload does not fit the field that carries its length.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The responder answered with a different kind of object.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl MuxError {
    /// True when the message can be dropped and the exchange continued.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MuxError::UnsupportedObjectType { .. } | MuxError::UnsupportedVendorProtocol { .. }
        )
    }

    /// True when the error concerns the content of a single, already
    /// delimited message: a short or inconsistent body, not the stream.
    pub fn is_message_scoped(&self) -> bool {
        use doeprims_discovery::DiscoveryError;
        use doeprims_frame::FrameError;

        matches!(
            self,
            MuxError::Malformed(_)
                | MuxError::Discovery(DiscoveryError::Malformed(_))
                | MuxError::Frame(FrameError::Truncated { .. } | FrameError::LengthTooSmall { .. })
        )
    }

    /// Bytes to skip past an unsupported object.
    pub fn skip_len(&self) -> Option<usize> {
        match self {
            MuxError::UnsupportedObjectType { length_dw, .. } => {
                Some(*length_dw as usize * DW_SIZE)
            }
            _ => None,
        }
    }

    /// True when the underlying mailbox has shut down.
    pub fn is_shutdown(&self) -> bool {
        matches!(
            self,
            MuxError::Transport(doeprims_transport::TransportError::Shutdown)
        )
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;

#[cfg(test)]
mod tests {
    use doeprims_discovery::DiscoveryError;
    use doeprims_frame::FrameError;

    use super::*;

    #[test]
    fn message_scoped_errors() {
        assert!(MuxError::Malformed("short".into()).is_message_scoped());
        assert!(MuxError::Discovery(DiscoveryError::Malformed("short".into())).is_message_scoped());
        assert!(MuxError::Frame(FrameError::LengthTooSmall { length_dw: 1 }).is_message_scoped());

        assert!(!MuxError::Frame(FrameError::ProtocolViolation("len".into())).is_message_scoped());
        assert!(!MuxError::Transport(doeprims_transport::TransportError::Shutdown).is_message_scoped());
        assert!(!MuxError::Discovery(DiscoveryError::NoSuchEntry(3)).is_message_scoped());
    }
}
