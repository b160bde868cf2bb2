use std::fs;

use bytes::Bytes;
use doeprims_frame::{DataObjectType, DoeObject, VENDOR_ID_PCISIG};
use doeprims_mux::{vendor_request, DoeRequester, PciProtocol, SPDM_VERSION_12};

use crate::cmd::{connect_mailbox, parse_duration, parse_hex, SendArgs};
use crate::exit::{frame_error, mux_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_objects, ObjectOutput, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(&args)?;
    let mailbox = connect_mailbox(&args.path, timeout)?;
    let mut requester = DoeRequester::new(mailbox);

    let (data_object_type, reply) = match (args.vendor, args.secured) {
        (Some(protocol), _) => {
            let request = vendor_request(SPDM_VERSION_12, PciProtocol::from(protocol), &payload)
                .map_err(|err| mux_error("vendor request", err))?;
            let reply = requester
                .exchange_spdm(&request)
                .map_err(|err| mux_error("vendor exchange failed", err))?;
            requester
                .dispatcher()
                .dispatch_vendor(reply.clone())
                .map_err(|err| mux_error("vendor response", err))?;
            (DataObjectType::Spdm, reply)
        }
        (None, true) => {
            let reply = requester
                .exchange_secured_spdm(&payload)
                .map_err(|err| mux_error("secured SPDM exchange failed", err))?;
            (DataObjectType::SecuredSpdm, reply)
        }
        (None, false) => {
            let reply = requester
                .exchange_spdm(&payload)
                .map_err(|err| mux_error("SPDM exchange failed", err))?;
            (DataObjectType::Spdm, reply)
        }
    };

    let object = DoeObject::new(VENDOR_ID_PCISIG, data_object_type, reply.clone())
        .map_err(|err| frame_error("response object", err))?;
    print_objects(&[ObjectOutput::from_object(&object)], &reply, format);
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Bytes> {
    if let Some(hex) = &args.hex {
        return parse_hex(hex).map(Bytes::from);
    }
    if let Some(path) = &args.file {
        return fs::read(path).map(Bytes::from).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Err(CliError::new(USAGE, "one of --hex or --file is required"))
}
