use std::fmt;
use std::io;

use doeprims_discovery::DiscoveryError;
use doeprims_frame::FrameError;
use doeprims_mux::MuxError;
use doeprims_transport::TransportError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PROTOCOL_ERROR: i32 = 40;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Desync(_) => CliError::new(PROTOCOL_ERROR, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ObjectTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(PROTOCOL_ERROR, format!("{context}: {other}")),
    }
}

pub fn discovery_error(context: &str, err: DiscoveryError) -> CliError {
    match err {
        DiscoveryError::Transport(err) => transport_error(context, err),
        DiscoveryError::Frame(err) => frame_error(context, err),
        DiscoveryError::TableTooLarge(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(PROTOCOL_ERROR, format!("{context}: {other}")),
    }
}

pub fn mux_error(context: &str, err: MuxError) -> CliError {
    match err {
        MuxError::Transport(err) => transport_error(context, err),
        MuxError::Frame(err) => frame_error(context, err),
        MuxError::Discovery(err) => discovery_error(context, err),
        MuxError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(PROTOCOL_ERROR, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_map_to_124() {
        let err = transport_error(
            "receive failed",
            TransportError::Io(io::Error::from(io::ErrorKind::WouldBlock)),
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn nested_errors_keep_their_class() {
        let err = mux_error(
            "exchange failed",
            MuxError::Discovery(DiscoveryError::LoopDetected {
                index: 1,
                iterations: 2,
            }),
        );
        assert_eq!(err.code, PROTOCOL_ERROR);

        let err = mux_error(
            "exchange failed",
            MuxError::Frame(FrameError::ObjectTooLarge { size: 9, max: 8 }),
        );
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("exchange failed: "));
    }
}
