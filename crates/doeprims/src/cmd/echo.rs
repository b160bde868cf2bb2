use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use doeprims_discovery::DiscoveryResponder;
use doeprims_frame::{FrameConfig, StreamMailbox};
use doeprims_mux::{
    parse_vendor_message, vendor_response, DoeResponder, MuxError, ResponderConfig,
};
use doeprims_transport::UnixDomainSocket;

use crate::cmd::EchoArgs;
use crate::exit::{mux_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let socket =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;
    tracing::info!(path = %socket.path().display(), "DOE responder listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let config = ResponderConfig {
        discard_unsupported: !args.strict,
    };
    let mut connections = 0usize;

    while running.load(Ordering::SeqCst) {
        if args.connections.is_some_and(|max| connections >= max) {
            break;
        }

        let stream = socket
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        connections += 1;

        let mailbox = StreamMailbox::from_stream(stream, FrameConfig::default())
            .map_err(|err| crate::exit::frame_error("stream setup failed", err))?;
        let mut responder = DoeResponder::with_config(
            mailbox,
            echo_handler,
            DiscoveryResponder::with_defaults(),
            config.clone(),
        );

        match responder.serve() {
            Ok(served) => tracing::info!(served, "requester disconnected"),
            Err(err) if err.is_shutdown() => {}
            Err(err) => {
                let err = mux_error("serve failed", err);
                tracing::warn!(error = %err, "dropping requester");
            }
        }
    }

    Ok(SUCCESS)
}

/// Echo SPDM payloads back. Vendor-defined requests get a vendor-defined
/// response carrying the same protocol content.
fn echo_handler(secured: bool, request: Bytes) -> Result<Bytes, MuxError> {
    tracing::info!(secured, size = request.len(), "echoing SPDM payload");
    if secured || !doeprims_mux::is_vendor_defined(&request) {
        return Ok(request);
    }

    let (header, message) = parse_vendor_message(request)?;
    vendor_response(header.spdm_version, message.protocol(), &message.payload)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
