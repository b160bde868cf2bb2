//! DOE Discovery.
//!
//! A DOE responder exposes a table of supported `(vendor_id,
//! data_object_type)` pairs. The requester asks for index 0 and follows each
//! response's `next_index` until it reads 0. [`DiscoverySession`] is the
//! transport-free state machine for that walk, [`DiscoveryClient`] drives it
//! over a [`Mailbox`](doeprims_transport::Mailbox), and
//! [`DiscoveryResponder`] answers it from a static table.

pub mod client;
pub mod error;
pub mod message;
pub mod responder;

pub use client::{
    DiscoveryClient, DiscoveryConfig, DiscoveryEntry, DiscoveryRegistry, DiscoverySession,
    DiscoveryState, MAX_DISCOVERY_ITERATIONS,
};
pub use error::{DiscoveryError, Result};
pub use message::{
    DiscoveryRequest, DiscoveryResponse, DISCOVERY_PAYLOAD_SIZE, INVALID_DATA_OBJECT_TYPE,
    INVALID_VENDOR_ID,
};
pub use responder::DiscoveryResponder;
