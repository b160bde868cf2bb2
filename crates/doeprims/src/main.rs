mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "doeprims", version, about = "PCIe DOE transport CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "DOEPRIMS_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "doeprims",
            "send",
            "/tmp/doe.sock",
            "--hex",
            "12840000",
            "--vendor",
            "ide-km",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert!(matches!(args.vendor, Some(cmd::VendorProtocolArg::IdeKm)));
                assert!(!args.secured);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "doeprims",
            "send",
            "/tmp/doe.sock",
            "--hex",
            "00",
            "--file",
            "/tmp/payload.bin",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_secured_vendor_request() {
        let err = Cli::try_parse_from([
            "doeprims",
            "send",
            "/tmp/doe.sock",
            "--hex",
            "00",
            "--secured",
            "--vendor",
            "tdisp",
        ])
        .expect_err("secured vendor request should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_discover_subcommand() {
        let cli = Cli::try_parse_from(["doeprims", "discover", "/tmp/doe.sock", "--timeout", "3s"])
            .expect("discover args should parse");
        assert!(matches!(cli.command, Command::Discover(_)));
    }

    #[test]
    fn parses_decode_with_global_format() {
        let cli = Cli::try_parse_from(["doeprims", "decode", "010000000300000000000000", "--format", "pretty"])
            .expect("decode args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Pretty)));
        assert!(matches!(cli.command, Command::Decode(_)));
    }
}
