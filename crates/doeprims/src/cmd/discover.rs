use doeprims_mux::DoeRequester;

use crate::cmd::{connect_mailbox, parse_duration, DiscoverArgs};
use crate::exit::{mux_error, CliResult, SUCCESS};
use crate::output::{print_registry, OutputFormat};

pub fn run(args: DiscoverArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mailbox = connect_mailbox(&args.path, timeout)?;

    let mut requester = DoeRequester::new(mailbox);
    let registry = requester
        .discover()
        .map_err(|err| mux_error("discovery failed", err))?;

    tracing::debug!(entries = registry.len(), "discovery finished");
    print_registry(registry, format);
    Ok(SUCCESS)
}
