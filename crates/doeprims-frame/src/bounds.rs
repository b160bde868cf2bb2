use crate::error::{FrameError, Result};
use crate::header::{DoeHeader, DW_SIZE, HEADER_SIZE, MAX_OBJECT_SIZE};

/// Check the size rules for a framed object of `len` bytes.
///
/// A data object is at least the 8-byte header, at most 1 MiB, and always a
/// whole number of DW.
pub fn validate_object_len(len: usize) -> Result<()> {
    if len < HEADER_SIZE {
        return Err(FrameError::ProtocolViolation(format!(
            "object of {len} bytes is shorter than the {HEADER_SIZE}-byte header"
        )));
    }
    if len > MAX_OBJECT_SIZE {
        return Err(FrameError::ProtocolViolation(format!(
            "object of {len} bytes exceeds the {MAX_OBJECT_SIZE}-byte maximum"
        )));
    }
    if len % DW_SIZE != 0 {
        return Err(FrameError::ProtocolViolation(format!(
            "object of {len} bytes is not DW aligned"
        )));
    }
    Ok(())
}

/// Validate a complete framed object and return its header.
///
/// On top of [`validate_object_len`], the header must declare exactly the
/// number of DW that were received.
pub fn validate_object(object: &[u8]) -> Result<DoeHeader> {
    validate_object_len(object.len())?;
    let header = DoeHeader::parse(object)?;
    if header.total_len() != object.len() {
        return Err(FrameError::ProtocolViolation(format!(
            "header declares {} DW but {} bytes were received",
            header.length_dw,
            object.len()
        )));
    }
    Ok(header)
}
