//! Routing of SPDM traffic over DOE.
//!
//! Outbound, SPDM messages and secured SPDM records are wrapped in DOE objects
//! of type SPDM or Secured SPDM, and PCI-SIG sub-protocols (IDE-KM, TDISP) are
//! nested inside an SPDM vendor-defined message:
//!
//! ```text
//! DOE header → SPDM header (0xFE/0x7E) → vendor sub-header → protocol bytes
//! ```
//!
//! Inbound, a [`Dispatcher`] routes objects by `(vendor_id,
//! data_object_type)` and vendor messages by `(standard_id, vendor_id,
//! pci_protocol)`. Anything unknown comes back as a recoverable error carrying
//! enough to skip it.

pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod spdm;
pub mod vendor;

pub use dispatch::{Dispatcher, Inbound};
pub use endpoint::{
    DoeRequester, DoeResponder, RequesterConfig, ResponderConfig, Served, SpdmHandler,
};
pub use error::{MuxError, Result};
pub use spdm::{
    is_vendor_defined, parse_vendor_message, vendor_request, vendor_response, wrap_secured_spdm,
    wrap_spdm, SpdmVendorHeader, SPDM_HEADER_SIZE, SPDM_VENDOR_DEFINED_REQUEST,
    SPDM_VENDOR_DEFINED_RESPONSE, SPDM_VERSION_12,
};
pub use vendor::{
    unwrap_vendor_subprotocol, wrap_vendor_subprotocol, PciProtocol, VendorDefinedHeader,
    VendorMessage, MAX_VENDOR_PAYLOAD, PCISIG_VENDOR_ID_LEN, SPDM_STANDARD_ID_PCISIG,
    SPDM_VENDOR_ID_PCISIG, VENDOR_HEADER_SIZE,
};
