/// Errors that can occur while framing DOE data objects.
///
/// `Truncated` and `LengthTooSmall` are format errors in a single received
/// object, `ObjectTooLarge` is a bounds error on encode (or against a
/// configured receive limit), and `ProtocolViolation` marks a peer whose
/// declared length does not match what it sent. None of them are retryable.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The buffer ends before the structure it should contain.
    #[error("truncated data object: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// The header declares fewer DW than the header itself occupies.
    #[error("DOE length {length_dw} DW is smaller than the 2 DW header")]
    LengthTooSmall { length_dw: u32 },

    /// The object exceeds the maximum (or configured) object size.
    #[error("data object too large ({size} bytes, max {max})")]
    ObjectTooLarge { size: usize, max: usize },

    /// A framed object is inconsistent with its own header or the size rules.
    #[error("DOE protocol violation: {0}")]
    ProtocolViolation(String),

    /// An I/O error occurred while reading or writing objects.
    #[error("object I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was closed before a complete object was received.
    #[error("connection closed (incomplete data object)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for malformed header errors.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            FrameError::Truncated { .. } | FrameError::LengthTooSmall { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
