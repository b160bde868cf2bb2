use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Subcommand, ValueEnum};
use doeprims_frame::{FrameConfig, StreamMailbox};
use doeprims_mux::PciProtocol;
use doeprims_transport::{MailboxStream, TransportError};

use crate::exit::{transport_error, CliError, CliResult, TIMEOUT, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod discover;
pub mod echo;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a loopback DOE responder (discovery + SPDM echo).
    Echo(EchoArgs),
    /// Enumerate the protocols a responder supports.
    Discover(DiscoverArgs),
    /// Send one SPDM, secured SPDM or vendor-defined payload.
    Send(SendArgs),
    /// Decode captured DOE objects.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format),
        Command::Discover(args) => discover::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Socket path to bind.
    #[arg(env = "DOEPRIMS_SOCKET")]
    pub path: PathBuf,
    /// Fail on unsupported objects instead of discarding them.
    #[arg(long)]
    pub strict: bool,
    /// Exit after serving N connections.
    #[arg(long)]
    pub connections: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Socket path to connect to.
    #[arg(env = "DOEPRIMS_SOCKET")]
    pub path: PathBuf,
    /// Connect and response timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum VendorProtocolArg {
    IdeKm,
    Tdisp,
}

impl From<VendorProtocolArg> for PciProtocol {
    fn from(value: VendorProtocolArg) -> Self {
        match value {
            VendorProtocolArg::IdeKm => PciProtocol::IdeKm,
            VendorProtocolArg::Tdisp => PciProtocol::Tdisp,
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    #[arg(env = "DOEPRIMS_SOCKET")]
    pub path: PathBuf,
    /// Payload as hex.
    #[arg(long, conflicts_with = "file")]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "hex")]
    pub file: Option<PathBuf>,
    /// Send as a secured SPDM record.
    #[arg(long, conflicts_with = "vendor")]
    pub secured: bool,
    /// Wrap the payload in a PCI-SIG vendor-defined request.
    #[arg(long, value_enum)]
    pub vendor: Option<VendorProtocolArg>,
    /// Connect and response timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Captured objects as hex (whitespace ignored).
    #[arg(conflicts_with = "file")]
    pub hex: Option<String>,
    /// Read captured objects from a binary file.
    #[arg(long, conflicts_with = "hex")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Decode hex input, ignoring whitespace.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact).map_err(|err| CliError::new(USAGE, format!("invalid hex input: {err}")))
}

/// Connect to a mailbox socket, retrying until `timeout` while it is not up yet.
pub fn connect_mailbox(
    path: &Path,
    timeout: Duration,
) -> CliResult<StreamMailbox<MailboxStream, MailboxStream>> {
    let config = FrameConfig {
        read_timeout: Some(timeout),
        write_timeout: Some(timeout),
        ..FrameConfig::default()
    };
    let start = Instant::now();
    loop {
        match StreamMailbox::connect(path, config.clone()) {
            Ok(mailbox) => return Ok(mailbox),
            Err(err) => {
                if !is_retryable_connect_error(&err) {
                    return Err(transport_error("connect failed", err));
                }
                if start.elapsed() >= timeout {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("connect timed out after {timeout:?}"),
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn is_retryable_connect_error(err: &TransportError) -> bool {
    match err {
        TransportError::Connect { source, .. } => {
            source.kind() == std::io::ErrorKind::NotFound
                || source.kind() == std::io::ErrorKind::ConnectionRefused
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_hex_ignores_whitespace() {
        assert_eq!(
            parse_hex("01 00 00 00\n03000000").unwrap(),
            vec![1, 0, 0, 0, 3, 0, 0, 0]
        );
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
    }

    #[test]
    fn missing_socket_is_retryable() {
        let err = TransportError::Connect {
            path: PathBuf::from("/tmp/none.sock"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(is_retryable_connect_error(&err));
        assert!(!is_retryable_connect_error(&TransportError::Shutdown));
    }
}
