//! PCIe Data Object Exchange (DOE) framing.
//!
//! Every DOE data object starts with a two-DW header:
//! - a 2-byte little-endian vendor ID (PCI-SIG is `0x0001`)
//! - a 1-byte data object type (Discovery, SPDM, Secured SPDM, ...)
//! - a reserved byte
//! - a 4-byte little-endian length in DW, header included, of which only the
//!   low 18 bits count. A length of zero means the maximum object, 2^18 DW.
//!
//! This crate encodes and decodes that header, enforces object size bounds
//! and moves complete objects over byte streams.

pub mod bounds;
pub mod codec;
pub mod error;
pub mod header;
pub mod mailbox;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use bounds::{validate_object, validate_object_len};
pub use codec::{decode_object, decode_object_bytes, encode_object, DoeObject, FrameConfig};
pub use error::{FrameError, Result};
pub use header::{
    decode_header, encode_header, DataObjectType, DoeHeader, DW_SIZE, HEADER_LEN_DW, HEADER_SIZE,
    MAX_OBJECT_DW, MAX_OBJECT_SIZE, VENDOR_ID_PCISIG,
};
pub use mailbox::StreamMailbox;
pub use reader::ObjectReader;
pub use writer::ObjectWriter;

#[cfg(feature = "async")]
pub use async_codec::DoeCodec;
