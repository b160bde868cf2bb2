use std::collections::HashSet;

use bytes::{Bytes, BytesMut};
use doeprims_discovery::{DiscoveryRegistry, DiscoveryResponder};
use doeprims_frame::{
    decode_object_bytes, validate_object, DataObjectType, HEADER_SIZE, MAX_OBJECT_SIZE,
    VENDOR_ID_PCISIG,
};
use tracing::{debug, warn};

use crate::error::{MuxError, Result};
use crate::spdm::{parse_vendor_message, SpdmVendorHeader};
use crate::vendor::{PciProtocol, VendorMessage, SPDM_STANDARD_ID_PCISIG, SPDM_VENDOR_ID_PCISIG};

/// A received object routed to the layer that handles it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Discovery request or response payload.
    Discovery(Bytes),
    /// SPDM message, or a secured SPDM record when `secured` is set.
    Spdm { secured: bool, payload: Bytes },
}

/// Routes DOE objects by `(vendor_id, data_object_type)` and PCI-SIG vendor
/// messages by `(standard_id, vendor_id, pci_protocol)`.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    object_types: HashSet<(u16, DataObjectType)>,
    vendor_protocols: HashSet<(u16, u16, u8)>,
}

impl Dispatcher {
    /// A dispatcher that accepts nothing.
    pub fn empty() -> Self {
        Self {
            object_types: HashSet::new(),
            vendor_protocols: HashSet::new(),
        }
    }

    /// PCI-SIG Discovery, SPDM and Secured SPDM, plus IDE-KM and TDISP.
    pub fn with_defaults() -> Self {
        let mut dispatcher = Self::empty();
        dispatcher
            .support(VENDOR_ID_PCISIG, DataObjectType::Discovery)
            .support(VENDOR_ID_PCISIG, DataObjectType::Spdm)
            .support(VENDOR_ID_PCISIG, DataObjectType::SecuredSpdm)
            .support_vendor_protocol(
                SPDM_STANDARD_ID_PCISIG,
                SPDM_VENDOR_ID_PCISIG,
                PciProtocol::IdeKm,
            )
            .support_vendor_protocol(
                SPDM_STANDARD_ID_PCISIG,
                SPDM_VENDOR_ID_PCISIG,
                PciProtocol::Tdisp,
            );
        dispatcher
    }

    /// Accept what a discovery run reported. Discovery itself is always
    /// accepted so the peer can be enumerated again.
    pub fn from_registry(registry: &DiscoveryRegistry) -> Self {
        let mut dispatcher = Self::with_defaults();
        dispatcher.object_types.clear();
        dispatcher.support(VENDOR_ID_PCISIG, DataObjectType::Discovery);
        for (vendor_id, data_object_type) in registry.pairs() {
            dispatcher.support(vendor_id, data_object_type);
        }
        dispatcher
    }

    /// Accept what a local discovery table advertises.
    pub fn from_table(table: &DiscoveryResponder) -> Self {
        let mut dispatcher = Self::with_defaults();
        dispatcher.object_types = table.entries().iter().copied().collect();
        dispatcher
    }

    pub fn support(&mut self, vendor_id: u16, data_object_type: DataObjectType) -> &mut Self {
        self.object_types.insert((vendor_id, data_object_type));
        self
    }

    pub fn support_vendor_protocol(
        &mut self,
        standard_id: u16,
        vendor_id: u16,
        protocol: PciProtocol,
    ) -> &mut Self {
        self.vendor_protocols
            .insert((standard_id, vendor_id, protocol.as_u8()));
        self
    }

    pub fn supports(&self, vendor_id: u16, data_object_type: DataObjectType) -> bool {
        self.object_types.contains(&(vendor_id, data_object_type))
    }

    pub fn supports_vendor_protocol(&self, key: (u16, u16, u8)) -> bool {
        self.vendor_protocols.contains(&key)
    }

    /// Route one complete, validated DOE object.
    ///
    /// Objects outside the accepted set fail with
    /// [`MuxError::UnsupportedObjectType`], which carries the object and its
    /// length so the caller can drop it and go on.
    pub fn dispatch(&self, object: Bytes) -> Result<Inbound> {
        let header = validate_object(&object)?;
        let routed = match (header.vendor_id, header.data_object_type) {
            (VENDOR_ID_PCISIG, DataObjectType::Discovery) => Some(false),
            (VENDOR_ID_PCISIG, DataObjectType::Spdm) => Some(false),
            (VENDOR_ID_PCISIG, DataObjectType::SecuredSpdm) => Some(true),
            _ => None,
        };

        if routed.is_none() || !self.supports(header.vendor_id, header.data_object_type) {
            warn!(
                vendor_id = header.vendor_id,
                data_object_type = header.data_object_type.as_u8(),
                length_dw = header.length_dw,
                "unsupported data object"
            );
            return Err(MuxError::UnsupportedObjectType {
                vendor_id: header.vendor_id,
                data_object_type: header.data_object_type.as_u8(),
                length_dw: header.length_dw,
                raw: object,
            });
        }

        debug!(
            data_object_type = header.data_object_type.name(),
            length_dw = header.length_dw,
            "dispatching data object"
        );
        let payload = object.slice(HEADER_SIZE..);
        Ok(match header.data_object_type {
            DataObjectType::Discovery => Inbound::Discovery(payload),
            _ => Inbound::Spdm {
                secured: routed == Some(true),
                payload,
            },
        })
    }

    /// Take the next object off the front of a byte stream and route it.
    ///
    /// Returns `Ok(None)` until a whole object is buffered. The object's
    /// `length_dw * 4` bytes are consumed whether or not it is supported.
    pub fn dispatch_next(&self, buf: &mut BytesMut) -> Result<Option<Inbound>> {
        match decode_object_bytes(buf, MAX_OBJECT_SIZE)? {
            Some(object) => self.dispatch(object).map(Some),
            None => Ok(None),
        }
    }

    /// Route an SPDM vendor-defined message to its PCI-SIG sub-protocol.
    pub fn dispatch_vendor(&self, spdm_message: Bytes) -> Result<(SpdmVendorHeader, VendorMessage)> {
        let (header, message) = parse_vendor_message(spdm_message).inspect_err(|err| {
            if err.is_recoverable() {
                warn!(error = %err, "unsupported vendor-defined sub-header");
            }
        })?;
        let key = message.header.key();
        if !self.supports_vendor_protocol(key) {
            warn!(
                standard_id = key.0,
                vendor_id = key.1,
                pci_protocol = key.2,
                "unsupported vendor protocol"
            );
            return Err(MuxError::UnsupportedVendorProtocol {
                standard_id: key.0,
                vendor_id: key.1,
                pci_protocol: key.2,
            });
        }
        debug!(protocol = message.protocol().name(), "dispatching vendor message");
        Ok((header, message))
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}
