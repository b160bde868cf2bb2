use std::fs;

use bytes::BytesMut;
use doeprims_frame::{decode_object_bytes, DoeObject, MAX_OBJECT_SIZE};
use doeprims_mux::Dispatcher;

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_objects, ObjectOutput, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input = resolve_input(&args)?;
    let objects = decode_all(&input)?;
    print_objects(&objects, &input, format);
    Ok(SUCCESS)
}

fn resolve_input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Err(CliError::new(USAGE, "captured objects required (hex argument or --file)"))
}

/// Split a capture into objects and annotate the ones nothing here handles.
fn decode_all(input: &[u8]) -> CliResult<Vec<ObjectOutput>> {
    let dispatcher = Dispatcher::with_defaults();
    let mut buf = BytesMut::from(input);
    let mut objects = Vec::new();

    while !buf.is_empty() {
        let raw = decode_object_bytes(&mut buf, MAX_OBJECT_SIZE)
            .map_err(|err| frame_error("decode failed", err))?
            .ok_or_else(|| {
                CliError::new(
                    DATA_INVALID,
                    format!("capture ends inside an object ({} trailing bytes)", buf.len()),
                )
            })?;
        let object =
            DoeObject::from_bytes(raw.clone()).map_err(|err| frame_error("decode failed", err))?;
        let mut out = ObjectOutput::from_object(&object);
        if let Err(err) = dispatcher.dispatch(raw) {
            out = out.with_error(err.to_string());
        }
        objects.push(out);
    }

    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::PROTOCOL_ERROR;

    #[test]
    fn decodes_back_to_back_objects() {
        let input = parse_hex(
            "010000000300000000000000 \
             0100010003000000 12840000",
        )
        .unwrap();
        let objects = decode_all(&input).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].type_name, "DISCOVERY");
        assert_eq!(objects[1].type_name, "SPDM");
        assert_eq!(objects[1].payload, "12840000");
        assert!(objects.iter().all(|o| o.error.is_none()));
    }

    #[test]
    fn unknown_type_is_annotated_not_fatal() {
        let input = parse_hex("0100330003000000deadbeef").unwrap();
        let objects = decode_all(&input).unwrap();
        assert_eq!(objects[0].data_object_type, 0x33);
        assert!(objects[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("unsupported data object")));
    }

    #[test]
    fn truncated_capture_is_data_invalid() {
        let input = parse_hex("0100010004000000aabbccdd").unwrap();
        assert_eq!(decode_all(&input).unwrap_err().code, DATA_INVALID);
    }

    #[test]
    fn undersized_length_is_protocol_error() {
        let input = parse_hex("0100010001000000").unwrap();
        assert_eq!(decode_all(&input).unwrap_err().code, PROTOCOL_ERROR);
    }
}
