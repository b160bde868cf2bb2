use std::collections::HashSet;

use doeprims_frame::DataObjectType;
use doeprims_transport::Mailbox;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{DiscoveryError, Result};
use crate::message::{DiscoveryRequest, DiscoveryResponse};

/// Hard ceiling on discovery requests: `index` is a single byte.
pub const MAX_DISCOVERY_ITERATIONS: usize = 256;

/// Configuration for a discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Maximum number of requests before giving up with `LoopDetected`.
    /// Clamped to 256.
    pub max_iterations: usize,
    /// Value of the request `version` byte.
    pub version: u8,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_DISCOVERY_ITERATIONS,
            version: 0,
        }
    }
}

/// One supported protocol as reported by the responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscoveryEntry {
    pub index: u8,
    pub vendor_id: u16,
    pub data_object_type: u8,
}

impl DiscoveryEntry {
    pub fn object_type(&self) -> DataObjectType {
        DataObjectType::from(self.data_object_type)
    }
}

/// Protocols found by one discovery run, in the order they were visited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryRegistry {
    entries: Vec<DiscoveryEntry>,
}

impl DiscoveryRegistry {
    pub fn entries(&self) -> &[DiscoveryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the responder listed `(vendor_id, data_object_type)`.
    pub fn supports(&self, vendor_id: u16, data_object_type: DataObjectType) -> bool {
        let raw = data_object_type.as_u8();
        self.entries
            .iter()
            .any(|e| e.vendor_id == vendor_id && e.data_object_type == raw)
    }

    /// The `(vendor_id, data_object_type)` pairs, in discovery order.
    pub fn pairs(&self) -> impl Iterator<Item = (u16, DataObjectType)> + '_ {
        self.entries
            .iter()
            .map(|e| (e.vendor_id, e.object_type()))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiscoveryEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a DiscoveryRegistry {
    type Item = &'a DiscoveryEntry;
    type IntoIter = std::slice::Iter<'a, DiscoveryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Where a discovery session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    /// Nothing sent yet.
    Idle,
    /// A request for this index is ready to go out.
    Requesting(u8),
    /// The request for this index is on the wire.
    AwaitingResponse(u8),
    /// The response for this index is being recorded.
    Recording(u8),
    /// The table ended with `next_index == 0`.
    Done,
}

/// Sans-IO discovery client.
///
/// The caller pulls requests with [`next_request`](Self::next_request), moves
/// them over whatever mailbox it has, and feeds each answer to
/// [`handle_response`](Self::handle_response) until the session is done.
/// `next_index` comes from the peer and is never trusted: revisiting an index
/// or exceeding the iteration bound fails with `LoopDetected`.
#[derive(Debug)]
pub struct DiscoverySession {
    config: DiscoveryConfig,
    state: DiscoveryState,
    visited: HashSet<u8>,
    iterations: usize,
    registry: DiscoveryRegistry,
}

impl DiscoverySession {
    pub fn new() -> Self {
        Self::with_config(DiscoveryConfig::default())
    }

    pub fn with_config(config: DiscoveryConfig) -> Self {
        Self {
            config,
            state: DiscoveryState::Idle,
            visited: HashSet::new(),
            iterations: 0,
            registry: DiscoveryRegistry::default(),
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == DiscoveryState::Done
    }

    /// Number of requests issued so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn registry(&self) -> &DiscoveryRegistry {
        &self.registry
    }

    /// Consume the session, returning what was discovered so far.
    pub fn into_registry(self) -> DiscoveryRegistry {
        self.registry
    }

    /// The next request to send, or `None` once the table has ended.
    pub fn next_request(&mut self) -> Result<Option<DiscoveryRequest>> {
        let index = match self.state {
            DiscoveryState::Idle => 0,
            DiscoveryState::Requesting(index) => index,
            DiscoveryState::Done => return Ok(None),
            DiscoveryState::AwaitingResponse(index) | DiscoveryState::Recording(index) => {
                return Err(DiscoveryError::Malformed(format!(
                    "request for index {index} is still outstanding"
                )));
            }
        };

        let limit = self.config.max_iterations.min(MAX_DISCOVERY_ITERATIONS);
        if self.iterations >= limit {
            return Err(DiscoveryError::LoopDetected {
                index,
                iterations: self.iterations,
            });
        }

        self.iterations += 1;
        self.visited.insert(index);
        self.state = DiscoveryState::AwaitingResponse(index);
        Ok(Some(DiscoveryRequest {
            index,
            version: self.config.version,
        }))
    }

    /// Record the answer to the outstanding request.
    pub fn handle_response(&mut self, response: DiscoveryResponse) -> Result<()> {
        let DiscoveryState::AwaitingResponse(index) = self.state else {
            return Err(DiscoveryError::Malformed(format!(
                "unsolicited discovery response in state {:?}",
                self.state
            )));
        };

        if response.is_invalid() {
            return Err(DiscoveryError::NoSuchEntry(index));
        }

        self.state = DiscoveryState::Recording(index);
        debug!(
            index,
            vendor_id = response.vendor_id,
            data_object_type = response.data_object_type,
            next_index = response.next_index,
            "discovered data object protocol"
        );
        self.registry.entries.push(DiscoveryEntry {
            index,
            vendor_id: response.vendor_id,
            data_object_type: response.data_object_type,
        });

        let next = response.next_index;
        if next == 0 {
            self.state = DiscoveryState::Done;
            return Ok(());
        }
        if self.visited.contains(&next) {
            return Err(DiscoveryError::LoopDetected {
                index: next,
                iterations: self.iterations,
            });
        }
        self.state = DiscoveryState::Requesting(next);
        Ok(())
    }
}

impl Default for DiscoverySession {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs discovery over a [`Mailbox`].
pub struct DiscoveryClient<M> {
    mailbox: M,
    config: DiscoveryConfig,
}

impl<M: Mailbox> DiscoveryClient<M> {
    pub fn new(mailbox: M) -> Self {
        Self::with_config(mailbox, DiscoveryConfig::default())
    }

    pub fn with_config(mailbox: M, config: DiscoveryConfig) -> Self {
        Self { mailbox, config }
    }

    /// Walk the responder table from index 0 until `next_index` is 0.
    ///
    /// Each run starts a fresh session; a previous registry is not reused.
    pub fn discover(&mut self) -> Result<DiscoveryRegistry> {
        let mut session = DiscoverySession::with_config(self.config.clone());
        while let Some(request) = session.next_request()? {
            let response = self.exchange(&request)?;
            session.handle_response(response)?;
        }
        info!(
            entries = session.registry().len(),
            requests = session.iterations(),
            "discovery complete"
        );
        Ok(session.into_registry())
    }

    /// Look up a single table index.
    pub fn query(&mut self, index: u8) -> Result<DiscoveryResponse> {
        let response = self.exchange(&DiscoveryRequest {
            index,
            version: self.config.version,
        })?;
        if response.is_invalid() {
            return Err(DiscoveryError::NoSuchEntry(index));
        }
        Ok(response)
    }

    fn exchange(&mut self, request: &DiscoveryRequest) -> Result<DiscoveryResponse> {
        let object = request.to_object()?;
        let reply = self.mailbox.send_and_receive(&object)?;
        DiscoveryResponse::from_object(&reply)
    }

    pub fn get_ref(&self) -> &M {
        &self.mailbox
    }

    pub fn get_mut(&mut self) -> &mut M {
        &mut self.mailbox
    }

    pub fn into_inner(self) -> M {
        self.mailbox
    }
}
