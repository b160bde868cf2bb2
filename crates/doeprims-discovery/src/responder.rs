use bytes::Bytes;
use doeprims_frame::{DataObjectType, VENDOR_ID_PCISIG};
use tracing::{debug, warn};

use crate::client::MAX_DISCOVERY_ITERATIONS;
use crate::error::{DiscoveryError, Result};
use crate::message::{DiscoveryRequest, DiscoveryResponse};

/// Static discovery table answered by a DOE responder.
///
/// Entry `i` is reported at index `i`; the last entry points back to 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryResponder {
    entries: Vec<(u16, DataObjectType)>,
}

impl DiscoveryResponder {
    /// Build a table from `(vendor_id, data_object_type)` pairs in index order.
    pub fn new(entries: impl IntoIterator<Item = (u16, DataObjectType)>) -> Result<Self> {
        let entries: Vec<_> = entries.into_iter().collect();
        if entries.len() > MAX_DISCOVERY_ITERATIONS {
            return Err(DiscoveryError::TableTooLarge(entries.len()));
        }
        Ok(Self { entries })
    }

    /// Discovery, SPDM and Secured SPDM under the PCI-SIG vendor ID.
    pub fn with_defaults() -> Self {
        Self {
            entries: vec![
                (VENDOR_ID_PCISIG, DataObjectType::Discovery),
                (VENDOR_ID_PCISIG, DataObjectType::Spdm),
                (VENDOR_ID_PCISIG, DataObjectType::SecuredSpdm),
            ],
        }
    }

    pub fn entries(&self) -> &[(u16, DataObjectType)] {
        &self.entries
    }

    /// Whether the table lists `(vendor_id, data_object_type)`.
    pub fn supports(&self, vendor_id: u16, data_object_type: DataObjectType) -> bool {
        self.entries.contains(&(vendor_id, data_object_type))
    }

    /// Answer one request.
    pub fn respond(&self, request: &DiscoveryRequest) -> DiscoveryResponse {
        let index = usize::from(request.index);
        let Some(&(vendor_id, data_object_type)) = self.entries.get(index) else {
            warn!(index, entries = self.entries.len(), "discovery index out of range");
            return DiscoveryResponse::INVALID;
        };

        // Dense table: the index after the last entry wraps to 0.
        let next_index = if index + 1 < self.entries.len() {
            (index + 1) as u8
        } else {
            0
        };
        debug!(index, vendor_id, next_index, "answering discovery");
        DiscoveryResponse::new(vendor_id, data_object_type, next_index)
    }

    /// Answer a framed discovery request object with a framed response.
    pub fn respond_object(&self, object: &[u8]) -> Result<Bytes> {
        let request = DiscoveryRequest::from_object(object)?;
        self.respond(&request).to_object()
    }
}

impl Default for DiscoveryResponder {
    fn default() -> Self {
        Self::with_defaults()
    }
}
