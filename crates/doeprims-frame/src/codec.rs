use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{FrameError, Result};
use crate::header::{DataObjectType, DoeHeader, HEADER_SIZE, MAX_OBJECT_SIZE};

/// A DOE data object: header plus payload.
///
/// Objects built with [`DoeObject::new`] keep their payload unpadded; the
/// padding is added on the wire. Decoded objects carry every byte after the
/// header, padding included, since the DOE layer cannot tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoeObject {
    pub header: DoeHeader,
    pub payload: Bytes,
}

impl DoeObject {
    /// Create an object, computing its header.
    pub fn new(
        vendor_id: u16,
        data_object_type: DataObjectType,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        let payload = payload.into();
        let header = DoeHeader::for_payload(vendor_id, data_object_type, payload.len())?;
        Ok(Self { header, payload })
    }

    /// Split a complete, already delimited object into header and payload.
    pub fn from_bytes(object: Bytes) -> Result<Self> {
        let header = crate::header::decode_header(&object)?;
        let payload = object.slice(HEADER_SIZE..header.total_len());
        Ok(Self { header, payload })
    }

    pub fn vendor_id(&self) -> u16 {
        self.header.vendor_id
    }

    pub fn data_object_type(&self) -> DataObjectType {
        self.header.data_object_type
    }

    /// The total wire size of this object (header + padded payload).
    pub fn wire_size(&self) -> usize {
        self.header.total_len()
    }

    /// Append the wire encoding of this object to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        put_object(&self.header, &self.payload, dst);
    }

    /// The wire encoding of this object.
    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        self.encode(&mut dst);
        dst.freeze()
    }
}

/// Encode a data object into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬──────┬──────┬──────────────────┬───────────────────┐
/// │ Vendor ID  │ Type │ Rsvd │ Length (4B LE)   │ Payload + padding │
/// │ (2B LE)    │ (1B) │ (1B) │ bits 0..17, DW   │ (Length-2 DW)     │
/// └────────────┴──────┴──────┴──────────────────┴───────────────────┘
/// ```
pub fn encode_object(
    vendor_id: u16,
    data_object_type: DataObjectType,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<DoeHeader> {
    let header = DoeHeader::for_payload(vendor_id, data_object_type, payload.len())?;
    put_object(&header, payload, dst);
    trace!(
        vendor_id,
        data_object_type = data_object_type.as_u8(),
        length_dw = header.length_dw,
        "encoded data object"
    );
    Ok(header)
}

/// Header, payload, then zero padding up to `header.total_len()`.
fn put_object(header: &DoeHeader, payload: &[u8], dst: &mut BytesMut) {
    let total = header.total_len();
    dst.reserve(total);
    dst.put_slice(&header.to_bytes());
    dst.put_slice(payload);
    dst.put_bytes(0, total - HEADER_SIZE - payload.len());
}

/// Split one complete framed object (header included) off the front of `src`.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete object yet.
/// Exactly `length_dw * 4` bytes are consumed, so a following object stays
/// in the buffer.
pub fn decode_object_bytes(src: &mut BytesMut, max_object_size: usize) -> Result<Option<Bytes>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let header = DoeHeader::parse(&src[..HEADER_SIZE])?;
    let total = header.total_len();
    if total > max_object_size {
        return Err(FrameError::ObjectTooLarge {
            size: total,
            max: max_object_size,
        });
    }

    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    Ok(Some(src.split_to(total).freeze()))
}

/// Decode one data object from the front of `src`.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete object yet.
pub fn decode_object(src: &mut BytesMut, max_object_size: usize) -> Result<Option<DoeObject>> {
    let Some(mut object) = decode_object_bytes(src, max_object_size)? else {
        return Ok(None);
    };

    let header = DoeHeader::parse(&object)?;
    object.advance(HEADER_SIZE);
    Ok(Some(DoeObject {
        header,
        payload: object,
    }))
}

/// Configuration for object streams.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest object accepted or sent, in bytes. Default: 1 MiB, the DOE
    /// maximum. Mailboxes with smaller buffers may lower it.
    pub max_object_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_object_size: MAX_OBJECT_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{MAX_OBJECT_DW, VENDOR_ID_PCISIG};

    #[test]
    fn discovery_request_object_bytes() {
        let mut buf = BytesMut::new();
        let header = encode_object(
            VENDOR_ID_PCISIG,
            DataObjectType::Discovery,
            &[0x00, 0x00, 0x00, 0x00],
            &mut buf,
        )
        .unwrap();

        assert_eq!(header.length_dw, 3);
        assert_eq!(
            buf.as_ref(),
            &[0x01, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );

        let object = decode_object(&mut buf, MAX_OBJECT_SIZE).unwrap().unwrap();
        assert_eq!(object.vendor_id(), VENDOR_ID_PCISIG);
        assert_eq!(object.data_object_type(), DataObjectType::Discovery);
        assert_eq!(object.header.length_dw, 3);
        assert_eq!(object.payload.as_ref(), &[0, 0, 0, 0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_decode_roundtrip() {
        let payload = b"\x10\x84\x00\x00SPDMGETV";
        let mut buf = BytesMut::new();
        encode_object(0x1AB4, DataObjectType::Unknown(0x33), payload, &mut buf).unwrap();

        let object = decode_object(&mut buf, MAX_OBJECT_SIZE).unwrap().unwrap();
        assert_eq!(object.vendor_id(), 0x1AB4);
        assert_eq!(object.data_object_type(), DataObjectType::Unknown(0x33));
        assert_eq!(object.payload.as_ref(), payload);
    }

    #[test]
    fn unaligned_payload_is_zero_padded() {
        let object = DoeObject::new(VENDOR_ID_PCISIG, DataObjectType::Spdm, &b"\x12\x84\x00"[..])
            .unwrap();
        let wire = object.to_bytes();
        assert_eq!(wire.len(), 12);
        assert_eq!(&wire[8..], &[0x12, 0x84, 0x00, 0x00]);

        let mut direct = BytesMut::new();
        encode_object(VENDOR_ID_PCISIG, DataObjectType::Spdm, b"\x12\x84\x00", &mut direct)
            .unwrap();
        assert_eq!(direct.freeze(), wire);
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x01, 0x00, 0x01][..]);
        assert!(decode_object(&mut buf, MAX_OBJECT_SIZE).unwrap().is_none());
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_object(VENDOR_ID_PCISIG, DataObjectType::Spdm, &[1; 8], &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 4);

        assert!(decode_object(&mut buf, MAX_OBJECT_SIZE).unwrap().is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 4);
    }

    #[test]
    fn decode_rejects_length_below_header() {
        let mut buf = BytesMut::from(&[0x01, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00][..]);
        let result = decode_object(&mut buf, MAX_OBJECT_SIZE);
        assert!(matches!(result, Err(FrameError::LengthTooSmall { length_dw: 1 })));
    }

    #[test]
    fn decode_enforces_configured_limit() {
        let mut buf = BytesMut::new();
        encode_object(VENDOR_ID_PCISIG, DataObjectType::Spdm, &[0; 64], &mut buf).unwrap();

        let result = decode_object(&mut buf, 32);
        assert!(matches!(
            result,
            Err(FrameError::ObjectTooLarge { size: 72, max: 32 })
        ));
    }

    #[test]
    fn zero_length_field_waits_for_full_megabyte() {
        let mut buf = BytesMut::from(&[0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00][..]);
        assert!(decode_object(&mut buf, MAX_OBJECT_SIZE).unwrap().is_none());

        buf.resize(MAX_OBJECT_SIZE, 0);
        let object = decode_object(&mut buf, MAX_OBJECT_SIZE).unwrap().unwrap();
        assert_eq!(object.header.length_dw, MAX_OBJECT_DW);
        assert_eq!(object.payload.len(), MAX_OBJECT_SIZE - HEADER_SIZE);
    }

    #[test]
    fn multiple_objects_decode_in_order() {
        let mut buf = BytesMut::new();
        encode_object(VENDOR_ID_PCISIG, DataObjectType::Spdm, b"firs", &mut buf).unwrap();
        encode_object(VENDOR_ID_PCISIG, DataObjectType::SecuredSpdm, b"second!!", &mut buf)
            .unwrap();

        let first = decode_object(&mut buf, MAX_OBJECT_SIZE).unwrap().unwrap();
        assert_eq!(first.data_object_type(), DataObjectType::Spdm);
        assert_eq!(first.payload.as_ref(), b"firs");

        let second = decode_object(&mut buf, MAX_OBJECT_SIZE).unwrap().unwrap();
        assert_eq!(second.data_object_type(), DataObjectType::SecuredSpdm);
        assert_eq!(second.payload.as_ref(), b"second!!");
        assert!(buf.is_empty());
    }

    #[test]
    fn from_bytes_ignores_trailing_bytes() {
        let mut wire = DoeObject::new(VENDOR_ID_PCISIG, DataObjectType::Spdm, vec![7u8; 4])
            .unwrap()
            .to_bytes()
            .to_vec();
        wire.extend_from_slice(&[0xEE; 4]);

        let object = DoeObject::from_bytes(Bytes::from(wire)).unwrap();
        assert_eq!(object.payload.as_ref(), &[7; 4]);
    }

    #[test]
    fn empty_payload() {
        let object = DoeObject::new(VENDOR_ID_PCISIG, DataObjectType::Spdm, Bytes::new()).unwrap();
        assert_eq!(object.wire_size(), HEADER_SIZE);

        let decoded = DoeObject::from_bytes(object.to_bytes()).unwrap();
        assert!(decoded.payload.is_empty());
        assert_eq!(decoded.header.length_dw, 2);
    }
}
