//! PCIe Data Object Exchange (DOE) transport binding.
//!
//! doeprims frames SPDM, secured SPDM and PCI-SIG vendor-defined messages
//! into DOE data objects, enumerates a responder with DOE Discovery, and
//! routes what comes back.
//!
//! # Crate Structure
//!
//! - [`transport`]: the `Mailbox` abstraction and a Unix socket stream
//! - [`frame`]: DOE header codec, size bounds and object stream I/O
//! - [`discovery`]: discovery client state machine and responder table
//!   (behind `mux` feature)
//! - [`mux`]: SPDM and vendor protocol wrapping, dispatch and endpoints
//!   (behind `mux` feature)

/// Re-export transport types.
pub mod transport {
    pub use doeprims_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use doeprims_frame::*;
}

/// Re-export discovery types (requires `mux` feature).
#[cfg(feature = "mux")]
pub mod discovery {
    pub use doeprims_discovery::*;
}

/// Re-export multiplexer types (requires `mux` feature).
#[cfg(feature = "mux")]
pub mod mux {
    pub use doeprims_mux::*;
}
