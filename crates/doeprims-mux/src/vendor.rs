use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{MuxError, Result};

/// SPDM registry ID of PCI-SIG, carried in `standard_id`.
pub const SPDM_STANDARD_ID_PCISIG: u16 = 0x0003;

/// PCI-SIG vendor ID inside the vendor-defined sub-header.
pub const SPDM_VENDOR_ID_PCISIG: u16 = 0x0001;

/// Length of a PCI-SIG vendor ID, carried in the `len` byte.
pub const PCISIG_VENDOR_ID_LEN: u8 = 2;

/// `standard_id` + `len` + `vendor_id` + `payload_length`.
pub const VENDOR_HEADER_SIZE: usize = 7;

/// Sub-header including the one-byte `pci_protocol` selector.
pub const VENDOR_HEADER_WITH_PROTOCOL_SIZE: usize = VENDOR_HEADER_SIZE + 1;

/// Largest protocol payload: `payload_length` is a u16 that also counts the
/// selector byte.
pub const MAX_VENDOR_PAYLOAD: usize = u16::MAX as usize - 1;

/// PCI-SIG sub-protocol carried in a vendor-defined message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PciProtocol {
    /// Integrity and Data Encryption key management.
    IdeKm,
    /// TEE Device Interface Security Protocol.
    Tdisp,
    Unknown(u8),
}

impl PciProtocol {
    pub const IDE_KM: u8 = 0x00;
    pub const TDISP: u8 = 0x01;

    pub fn as_u8(self) -> u8 {
        match self {
            PciProtocol::IdeKm => Self::IDE_KM,
            PciProtocol::Tdisp => Self::TDISP,
            PciProtocol::Unknown(raw) => raw,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PciProtocol::IdeKm => "IDE_KM",
            PciProtocol::Tdisp => "TDISP",
            PciProtocol::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for PciProtocol {
    fn from(value: u8) -> Self {
        match value {
            Self::IDE_KM => PciProtocol::IdeKm,
            Self::TDISP => PciProtocol::Tdisp,
            other => PciProtocol::Unknown(other),
        }
    }
}

impl From<PciProtocol> for u8 {
    fn from(value: PciProtocol) -> Self {
        value.as_u8()
    }
}

/// Vendor-defined sub-header that follows the SPDM message header.
///
/// ```text
/// ┌─────────────┬─────┬───────────┬────────────────┬──────────────┐
/// │ Standard ID │ Len │ Vendor ID │ Payload Length │ PCI protocol │
/// │ (2B LE)     │ (1) │ (2B LE)   │ (2B LE)        │ (1B)         │
/// └─────────────┴─────┴───────────┴────────────────┴──────────────┘
/// ```
///
/// `payload_length` counts the protocol byte plus the content after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorDefinedHeader {
    pub standard_id: u16,
    pub vendor_id: u16,
    pub payload_length: u16,
    pub pci_protocol: PciProtocol,
}

impl VendorDefinedHeader {
    pub fn to_bytes(&self) -> [u8; VENDOR_HEADER_WITH_PROTOCOL_SIZE] {
        let standard = self.standard_id.to_le_bytes();
        let vendor = self.vendor_id.to_le_bytes();
        let length = self.payload_length.to_le_bytes();
        [
            standard[0],
            standard[1],
            PCISIG_VENDOR_ID_LEN,
            vendor[0],
            vendor[1],
            length[0],
            length[1],
            self.pci_protocol.as_u8(),
        ]
    }

    /// Parse the sub-header.
    ///
    /// A header that cannot be laid out as a PCI-SIG sub-header (another
    /// registry, or a vendor ID that is not 2 bytes) fails with
    /// [`MuxError::UnsupportedVendorProtocol`] carrying whatever fields were
    /// readable, so it can be skipped. A truncated PCI-SIG header is
    /// [`MuxError::Malformed`].
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(MuxError::Malformed(format!(
                "vendor-defined header needs a standard ID, have {} bytes",
                bytes.len()
            )));
        }
        let standard_id = u16::from_le_bytes([bytes[0], bytes[1]]);
        let pcisig = standard_id == SPDM_STANDARD_ID_PCISIG;

        match bytes.get(2) {
            Some(&PCISIG_VENDOR_ID_LEN) => {}
            Some(&vendor_id_len) => {
                return Err(unsupported_layout(standard_id, vendor_id_len, bytes));
            }
            None if pcisig => {
                return Err(MuxError::Malformed(
                    "vendor-defined header ends before the vendor ID length".to_string(),
                ));
            }
            None => return Err(unsupported_layout(standard_id, 0, bytes)),
        }

        if bytes.len() < VENDOR_HEADER_WITH_PROTOCOL_SIZE {
            if !pcisig {
                return Err(unsupported_layout(standard_id, PCISIG_VENDOR_ID_LEN, bytes));
            }
            return Err(MuxError::Malformed(format!(
                "vendor-defined header needs {VENDOR_HEADER_WITH_PROTOCOL_SIZE} bytes, have {}",
                bytes.len()
            )));
        }

        let payload_length = u16::from_le_bytes([bytes[5], bytes[6]]);
        if payload_length == 0 {
            return Err(MuxError::Malformed(
                "vendor payload length does not cover the protocol byte".to_string(),
            ));
        }

        Ok(Self {
            standard_id,
            vendor_id: u16::from_le_bytes([bytes[3], bytes[4]]),
            payload_length,
            pci_protocol: PciProtocol::from(bytes[7]),
        })
    }

    /// Length of the protocol content after the selector byte.
    pub fn content_len(&self) -> usize {
        usize::from(self.payload_length) - 1
    }

    /// Second-level dispatch key.
    pub fn key(&self) -> (u16, u16, u8) {
        (self.standard_id, self.vendor_id, self.pci_protocol.as_u8())
    }
}

/// Dispatch key of a sub-header that does not follow the PCI-SIG layout.
/// Fields past the end of `bytes` read as zero.
fn unsupported_layout(standard_id: u16, vendor_id_len: u8, bytes: &[u8]) -> MuxError {
    let vendor_id_len = usize::from(vendor_id_len);
    let vendor_id = if vendor_id_len == usize::from(PCISIG_VENDOR_ID_LEN) && bytes.len() >= 5 {
        u16::from_le_bytes([bytes[3], bytes[4]])
    } else {
        0
    };
    let pci_protocol = bytes.get(3 + vendor_id_len + 2).copied().unwrap_or(0);
    MuxError::UnsupportedVendorProtocol {
        standard_id,
        vendor_id,
        pci_protocol,
    }
}

/// A decoded vendor-defined sub-protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorMessage {
    pub header: VendorDefinedHeader,
    pub payload: Bytes,
}

impl VendorMessage {
    pub fn protocol(&self) -> PciProtocol {
        self.header.pci_protocol
    }
}

/// Build a vendor-defined message body: sub-header, selector, payload.
pub fn wrap_vendor_subprotocol(
    standard_id: u16,
    vendor_id: u16,
    protocol: PciProtocol,
    payload: &[u8],
) -> Result<Bytes> {
    if payload.len() > MAX_VENDOR_PAYLOAD {
        return Err(MuxError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_VENDOR_PAYLOAD,
        });
    }

    let header = VendorDefinedHeader {
        standard_id,
        vendor_id,
        payload_length: (payload.len() + 1) as u16,
        pci_protocol: protocol,
    };
    let mut body = BytesMut::with_capacity(VENDOR_HEADER_WITH_PROTOCOL_SIZE + payload.len());
    body.put_slice(&header.to_bytes());
    body.put_slice(payload);
    Ok(body.freeze())
}

/// Split a vendor-defined message body into sub-header and content.
///
/// Bytes past `payload_length` (DOE padding) are dropped.
pub fn unwrap_vendor_subprotocol(body: Bytes) -> Result<VendorMessage> {
    let header = VendorDefinedHeader::parse(&body)?;
    let end = VENDOR_HEADER_WITH_PROTOCOL_SIZE + header.content_len();
    if body.len() < end {
        return Err(MuxError::Malformed(format!(
            "vendor payload length {} exceeds the {} bytes received",
            header.payload_length,
            body.len() - VENDOR_HEADER_SIZE
        )));
    }
    Ok(VendorMessage {
        header,
        payload: body.slice(VENDOR_HEADER_WITH_PROTOCOL_SIZE..end),
    })
}
