//! Requester and responder over an in-process socket pair.
//!
//! Run with:
//!   cargo run --example loopback
//!
//! The responder thread answers discovery and echoes SPDM; the requester
//! enumerates it and sends one message of each kind.

use std::thread;

use doeprims::frame::{FrameConfig, StreamMailbox};
use doeprims::mux::{
    parse_vendor_message, vendor_response, DoeRequester, DoeResponder, MuxError, PciProtocol,
};
use doeprims::transport::MailboxStream;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (requester_side, responder_side) = MailboxStream::pair()?;

    let responder = thread::spawn(move || -> Result<usize, MuxError> {
        let mailbox = StreamMailbox::from_stream(responder_side, FrameConfig::default())?;
        let handler = |secured: bool, request: bytes::Bytes| -> Result<bytes::Bytes, MuxError> {
            if secured || !doeprims::mux::is_vendor_defined(&request) {
                return Ok(request);
            }
            let (header, message) = parse_vendor_message(request)?;
            vendor_response(header.spdm_version, message.protocol(), &message.payload)
        };
        DoeResponder::new(mailbox, handler).serve()
    });

    let mailbox = StreamMailbox::from_stream(requester_side, FrameConfig::default())?;
    let mut requester = DoeRequester::new(mailbox);

    for entry in requester.discover()? {
        eprintln!(
            "index {}: vendor {:#06x} type {} ({})",
            entry.index,
            entry.vendor_id,
            entry.data_object_type,
            entry.object_type().name()
        );
    }

    let reply = requester.exchange_spdm(&[0x12, 0x84, 0x00, 0x00])?;
    eprintln!("SPDM reply: {:02x?}", reply.as_ref());

    let reply = requester.exchange_secured_spdm(b"opaque secured record")?;
    eprintln!("secured SPDM reply: {} bytes", reply.len());

    let message = requester.exchange_vendor(PciProtocol::Tdisp, &[0x10, 0x01])?;
    eprintln!(
        "{} reply: {:02x?}",
        message.protocol().name(),
        message.payload.as_ref()
    );

    drop(requester);
    let served = responder
        .join()
        .map_err(|_| "responder thread panicked")??;
    eprintln!("responder served {served} objects");
    Ok(())
}
