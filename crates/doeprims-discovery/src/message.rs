use bytes::Bytes;
use doeprims_frame::{validate_object, DataObjectType, DoeObject, HEADER_SIZE, VENDOR_ID_PCISIG};

use crate::error::{DiscoveryError, Result};

/// Size of a discovery request or response payload (1 DW).
pub const DISCOVERY_PAYLOAD_SIZE: usize = 4;

/// Vendor ID the responder reports for an index past the end of its table.
pub const INVALID_VENDOR_ID: u16 = 0xFFFF;

/// Data object type reported alongside [`INVALID_VENDOR_ID`].
pub const INVALID_DATA_OBJECT_TYPE: u8 = 0xFF;

/// Discovery request: which table index to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryRequest {
    pub index: u8,
    pub version: u8,
}

impl DiscoveryRequest {
    pub fn new(index: u8) -> Self {
        Self { index, version: 0 }
    }

    /// Little-endian wire form; reserved bytes are zero.
    pub fn to_bytes(&self) -> [u8; DISCOVERY_PAYLOAD_SIZE] {
        [self.index, self.version, 0, 0]
    }

    /// Parse a request payload, ignoring the reserved bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let bytes = payload_dw(payload, "request")?;
        Ok(Self {
            index: bytes[0],
            version: bytes[1],
        })
    }

    /// The request framed as a complete DOE object.
    pub fn to_object(&self) -> Result<Bytes> {
        let object = DoeObject::new(
            VENDOR_ID_PCISIG,
            DataObjectType::Discovery,
            self.to_bytes().to_vec(),
        )?;
        Ok(object.to_bytes())
    }

    /// Validate a framed discovery request object and parse it.
    pub fn from_object(object: &[u8]) -> Result<Self> {
        Self::parse(discovery_payload(object)?)
    }
}

/// Discovery response: one supported `(vendor_id, data_object_type)` pair and
/// the index to ask for next. A `next_index` of 0 ends the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryResponse {
    pub vendor_id: u16,
    pub data_object_type: u8,
    pub next_index: u8,
}

impl DiscoveryResponse {
    /// Marker sent for an index outside the responder table.
    pub const INVALID: Self = Self {
        vendor_id: INVALID_VENDOR_ID,
        data_object_type: INVALID_DATA_OBJECT_TYPE,
        next_index: 0,
    };

    pub fn new(vendor_id: u16, data_object_type: DataObjectType, next_index: u8) -> Self {
        Self {
            vendor_id,
            data_object_type: data_object_type.as_u8(),
            next_index,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.vendor_id == INVALID_VENDOR_ID && self.data_object_type == INVALID_DATA_OBJECT_TYPE
    }

    pub fn object_type(&self) -> DataObjectType {
        DataObjectType::from(self.data_object_type)
    }

    pub fn to_bytes(&self) -> [u8; DISCOVERY_PAYLOAD_SIZE] {
        let vendor = self.vendor_id.to_le_bytes();
        [vendor[0], vendor[1], self.data_object_type, self.next_index]
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        let bytes = payload_dw(payload, "response")?;
        Ok(Self {
            vendor_id: u16::from_le_bytes([bytes[0], bytes[1]]),
            data_object_type: bytes[2],
            next_index: bytes[3],
        })
    }

    pub fn to_object(&self) -> Result<Bytes> {
        let object = DoeObject::new(
            VENDOR_ID_PCISIG,
            DataObjectType::Discovery,
            self.to_bytes().to_vec(),
        )?;
        Ok(object.to_bytes())
    }

    pub fn from_object(object: &[u8]) -> Result<Self> {
        Self::parse(discovery_payload(object)?)
    }
}

fn payload_dw<'a>(payload: &'a [u8], what: &str) -> Result<&'a [u8]> {
    if payload.len() < DISCOVERY_PAYLOAD_SIZE {
        return Err(DiscoveryError::Malformed(format!(
            "discovery {what} is {} bytes, need {DISCOVERY_PAYLOAD_SIZE}",
            payload.len()
        )));
    }
    Ok(&payload[..DISCOVERY_PAYLOAD_SIZE])
}

/// Check bounds and header of a discovery object and return its payload.
fn discovery_payload(object: &[u8]) -> Result<&[u8]> {
    let header = validate_object(object)?;
    if header.vendor_id != VENDOR_ID_PCISIG
        || header.data_object_type != DataObjectType::Discovery
    {
        return Err(DiscoveryError::UnexpectedObject {
            vendor_id: header.vendor_id,
            data_object_type: header.data_object_type.as_u8(),
        });
    }
    Ok(&object[HEADER_SIZE..])
}
