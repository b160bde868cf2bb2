use crate::error::{FrameError, Result};

/// DOE header: vendor ID (2) + type (1) + reserved (1) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Header length in DW.
pub const HEADER_LEN_DW: u32 = 2;

/// The PCIe length unit.
pub const DW_SIZE: usize = 4;

/// PCI-SIG vendor ID, owner of the Discovery/SPDM/Secured SPDM types.
pub const VENDOR_ID_PCISIG: u16 = 0x0001;

/// Largest data object: 2^20 bytes.
pub const MAX_OBJECT_SIZE: usize = 0x0010_0000;

/// Largest data object in DW: 2^18.
pub const MAX_OBJECT_DW: u32 = (MAX_OBJECT_SIZE / DW_SIZE) as u32;

const LENGTH_FIELD_BITS: u32 = 18;
const LENGTH_MASK: u32 = (1 << LENGTH_FIELD_BITS) - 1;

/// DOE data object type.
///
/// Types are assigned per vendor ID; the named variants are the PCI-SIG ones.
/// Anything else is carried through as `Unknown` so it can be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataObjectType {
    Discovery,
    Spdm,
    SecuredSpdm,
    Unknown(u8),
}

impl DataObjectType {
    pub const DISCOVERY: u8 = 0x00;
    pub const SPDM: u8 = 0x01;
    pub const SECURED_SPDM: u8 = 0x02;

    /// Wire value of this type.
    pub fn as_u8(self) -> u8 {
        match self {
            DataObjectType::Discovery => Self::DISCOVERY,
            DataObjectType::Spdm => Self::SPDM,
            DataObjectType::SecuredSpdm => Self::SECURED_SPDM,
            DataObjectType::Unknown(raw) => raw,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            DataObjectType::Discovery => "DISCOVERY",
            DataObjectType::Spdm => "SPDM",
            DataObjectType::SecuredSpdm => "SECURED_SPDM",
            DataObjectType::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for DataObjectType {
    fn from(value: u8) -> Self {
        match value {
            Self::DISCOVERY => DataObjectType::Discovery,
            Self::SPDM => DataObjectType::Spdm,
            Self::SECURED_SPDM => DataObjectType::SecuredSpdm,
            other => DataObjectType::Unknown(other),
        }
    }
}

impl From<DataObjectType> for u8 {
    fn from(value: DataObjectType) -> Self {
        value.as_u8()
    }
}

/// A decoded DOE data object header.
///
/// `length_dw` is the real object length in DW, header included, always in
/// `2..=MAX_OBJECT_DW`. The zero-means-max wire sentinel never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoeHeader {
    pub vendor_id: u16,
    pub data_object_type: DataObjectType,
    pub length_dw: u32,
}

impl DoeHeader {
    /// Build the header for an object carrying `payload_len` bytes.
    ///
    /// The payload is padded up to a whole DW on the wire.
    pub fn for_payload(
        vendor_id: u16,
        data_object_type: DataObjectType,
        payload_len: usize,
    ) -> Result<Self> {
        let too_large = || FrameError::ObjectTooLarge {
            size: HEADER_SIZE.saturating_add(payload_len),
            max: MAX_OBJECT_SIZE,
        };
        if payload_len > MAX_OBJECT_SIZE - HEADER_SIZE {
            return Err(too_large());
        }
        let total = (HEADER_SIZE + payload_len).div_ceil(DW_SIZE) * DW_SIZE;
        if total > MAX_OBJECT_SIZE {
            return Err(too_large());
        }

        Ok(Self {
            vendor_id,
            data_object_type,
            length_dw: (total / DW_SIZE) as u32,
        })
    }

    /// Parse the first 8 bytes of `bytes` as a header.
    ///
    /// Only the header itself is checked; see [`decode_header`] for the
    /// check against the declared object length.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(FrameError::Truncated {
                needed: HEADER_SIZE,
                available: bytes.len(),
            });
        }

        let vendor_id = u16::from_le_bytes([bytes[0], bytes[1]]);
        let data_object_type = DataObjectType::from(bytes[2]);
        // bytes[3] is reserved and ignored.
        let raw_length = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let length_dw = length_field_to_dw(raw_length);

        if length_dw < HEADER_LEN_DW {
            return Err(FrameError::LengthTooSmall { length_dw });
        }

        Ok(Self {
            vendor_id,
            data_object_type,
            length_dw,
        })
    }

    /// Wire encoding of this header.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        debug_assert!((HEADER_LEN_DW..=MAX_OBJECT_DW).contains(&self.length_dw));

        let mut out = [0u8; HEADER_SIZE];
        out[0..2].copy_from_slice(&self.vendor_id.to_le_bytes());
        out[2] = self.data_object_type.as_u8();
        out[4..8].copy_from_slice(&dw_to_length_field(self.length_dw).to_le_bytes());
        out
    }

    /// Total object size in bytes, header included.
    pub fn total_len(&self) -> usize {
        self.length_dw as usize * DW_SIZE
    }

    /// Bytes following the header, padding included.
    pub fn payload_len(&self) -> usize {
        self.total_len() - HEADER_SIZE
    }
}

/// Encode a header for an object carrying `payload_len` bytes.
pub fn encode_header(
    vendor_id: u16,
    data_object_type: DataObjectType,
    payload_len: usize,
) -> Result<[u8; HEADER_SIZE]> {
    Ok(DoeHeader::for_payload(vendor_id, data_object_type, payload_len)?.to_bytes())
}

/// Decode the header at the start of `bytes`.
///
/// Fails when the declared length is below 2 DW or when `bytes` is shorter
/// than the declared object.
pub fn decode_header(bytes: &[u8]) -> Result<DoeHeader> {
    let header = DoeHeader::parse(bytes)?;
    if bytes.len() < header.total_len() {
        return Err(FrameError::Truncated {
            needed: header.total_len(),
            available: bytes.len(),
        });
    }
    Ok(header)
}

/// Map a raw length field to a DW count: mask reserved bits, 0 means max.
pub fn length_field_to_dw(raw: u32) -> u32 {
    let masked = raw & LENGTH_MASK;
    if masked == 0 {
        MAX_OBJECT_DW
    } else {
        masked
    }
}

/// Map a DW count to its length field value: only the max size encodes as 0.
pub fn dw_to_length_field(length_dw: u32) -> u32 {
    if length_dw == MAX_OBJECT_DW {
        0
    } else {
        length_dw & LENGTH_MASK
    }
}
