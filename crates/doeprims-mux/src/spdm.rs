use bytes::{BufMut, Bytes, BytesMut};
use doeprims_frame::{DataObjectType, DoeObject, VENDOR_ID_PCISIG};
use tracing::debug;

use crate::error::{MuxError, Result};
use crate::vendor::{
    unwrap_vendor_subprotocol, wrap_vendor_subprotocol, PciProtocol, VendorMessage,
    SPDM_STANDARD_ID_PCISIG, SPDM_VENDOR_ID_PCISIG,
};

/// SPDM request code for VENDOR_DEFINED_REQUEST.
pub const SPDM_VENDOR_DEFINED_REQUEST: u8 = 0xFE;
/// SPDM response code for VENDOR_DEFINED_RESPONSE.
pub const SPDM_VENDOR_DEFINED_RESPONSE: u8 = 0x7E;
/// SPDM message header: version, code, param1, param2.
pub const SPDM_HEADER_SIZE: usize = 4;
/// Default SPDM version byte (1.2).
pub const SPDM_VERSION_12: u8 = 0x12;

/// Frame an SPDM message as a DOE object.
pub fn wrap_spdm(payload: &[u8]) -> Result<Bytes> {
    wrap(DataObjectType::Spdm, payload)
}

/// Frame a secured SPDM record as a DOE object.
pub fn wrap_secured_spdm(payload: &[u8]) -> Result<Bytes> {
    wrap(DataObjectType::SecuredSpdm, payload)
}

fn wrap(data_object_type: DataObjectType, payload: &[u8]) -> Result<Bytes> {
    let object = DoeObject::new(VENDOR_ID_PCISIG, data_object_type, payload.to_vec())?;
    debug!(
        data_object_type = data_object_type.name(),
        length_dw = object.header.length_dw,
        "wrapped SPDM payload"
    );
    Ok(object.to_bytes())
}

/// The 4-byte SPDM header in front of a vendor-defined body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpdmVendorHeader {
    pub spdm_version: u8,
    pub request_response_code: u8,
}

impl SpdmVendorHeader {
    pub fn is_request(&self) -> bool {
        self.request_response_code == SPDM_VENDOR_DEFINED_REQUEST
    }
}

/// Whether an SPDM message is VENDOR_DEFINED_REQUEST or _RESPONSE.
pub fn is_vendor_defined(spdm_message: &[u8]) -> bool {
    matches!(
        spdm_message.get(1),
        Some(&SPDM_VENDOR_DEFINED_REQUEST) | Some(&SPDM_VENDOR_DEFINED_RESPONSE)
    )
}

/// Build a PCI-SIG VENDOR_DEFINED_REQUEST around `payload`.
pub fn vendor_request(spdm_version: u8, protocol: PciProtocol, payload: &[u8]) -> Result<Bytes> {
    vendor_message(spdm_version, SPDM_VENDOR_DEFINED_REQUEST, protocol, payload)
}

/// Build a PCI-SIG VENDOR_DEFINED_RESPONSE around `payload`.
pub fn vendor_response(spdm_version: u8, protocol: PciProtocol, payload: &[u8]) -> Result<Bytes> {
    vendor_message(spdm_version, SPDM_VENDOR_DEFINED_RESPONSE, protocol, payload)
}

fn vendor_message(
    spdm_version: u8,
    code: u8,
    protocol: PciProtocol,
    payload: &[u8],
) -> Result<Bytes> {
    let body = wrap_vendor_subprotocol(
        SPDM_STANDARD_ID_PCISIG,
        SPDM_VENDOR_ID_PCISIG,
        protocol,
        payload,
    )?;
    let mut message = BytesMut::with_capacity(SPDM_HEADER_SIZE + body.len());
    // param1 and param2 are reserved.
    message.put_slice(&[spdm_version, code, 0, 0]);
    message.put_slice(&body);
    Ok(message.freeze())
}

/// Split a vendor-defined SPDM message into its SPDM header and sub-protocol.
pub fn parse_vendor_message(spdm_message: Bytes) -> Result<(SpdmVendorHeader, VendorMessage)> {
    if spdm_message.len() < SPDM_HEADER_SIZE {
        return Err(MuxError::Malformed(format!(
            "SPDM message of {} bytes is shorter than its header",
            spdm_message.len()
        )));
    }
    if !is_vendor_defined(&spdm_message) {
        return Err(MuxError::Malformed(format!(
            "SPDM code {:#04x} is not vendor defined",
            spdm_message[1]
        )));
    }

    let header = SpdmVendorHeader {
        spdm_version: spdm_message[0],
        request_response_code: spdm_message[1],
    };
    let message = unwrap_vendor_subprotocol(spdm_message.slice(SPDM_HEADER_SIZE..))?;
    Ok((header, message))
}
