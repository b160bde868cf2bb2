use std::io::{Read, Write};
use std::path::Path;

use bytes::Bytes;
use doeprims_transport::{Mailbox, MailboxStream, TransportError};
use tracing::trace;

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::reader::ObjectReader;
use crate::writer::ObjectWriter;

/// A [`Mailbox`] over a byte stream carrying DOE objects back to back.
///
/// Object boundaries come from the DOE header length, so this needs the frame
/// layer; the transport crate only provides the raw stream.
pub struct StreamMailbox<R, W> {
    reader: ObjectReader<R>,
    writer: ObjectWriter<W>,
}

impl<R: Read, W: Write> StreamMailbox<R, W> {
    /// Build a mailbox from separate read and write halves.
    pub fn new(reader: ObjectReader<R>, writer: ObjectWriter<W>) -> Self {
        Self { reader, writer }
    }

    /// Split back into the read and write halves.
    pub fn into_parts(self) -> (ObjectReader<R>, ObjectWriter<W>) {
        (self.reader, self.writer)
    }
}

impl StreamMailbox<MailboxStream, MailboxStream> {
    /// Wrap a connected stream, applying timeouts and size limits from `config`.
    pub fn from_stream(stream: MailboxStream, config: FrameConfig) -> Result<Self> {
        let reader_stream = stream
            .try_clone()
            .map_err(crate::reader::transport_to_frame_error)?;
        let reader = ObjectReader::with_config_stream(reader_stream, config.clone())?;
        let writer = ObjectWriter::with_config_stream(stream, config)?;
        Ok(Self::new(reader, writer))
    }

    /// Connect to a mailbox socket at `path`.
    #[cfg(unix)]
    pub fn connect(
        path: impl AsRef<Path>,
        config: FrameConfig,
    ) -> std::result::Result<Self, TransportError> {
        let stream = doeprims_transport::UnixDomainSocket::connect(path)?;
        Self::from_stream(stream, config).map_err(frame_to_transport_error)
    }
}

impl<R: Read, W: Write> Mailbox for StreamMailbox<R, W> {
    fn transmit(&mut self, object: &[u8]) -> doeprims_transport::Result<()> {
        trace!(len = object.len(), "mailbox transmit");
        self.writer
            .write_raw(object)
            .map_err(frame_to_transport_error)
    }

    fn receive(&mut self) -> doeprims_transport::Result<Bytes> {
        let object = self
            .reader
            .read_object_bytes()
            .map_err(frame_to_transport_error)?;
        trace!(len = object.len(), "mailbox receive");
        Ok(object)
    }
}

fn frame_to_transport_error(err: FrameError) -> TransportError {
    match err {
        FrameError::Io(io) => TransportError::Io(io),
        FrameError::ConnectionClosed => TransportError::Shutdown,
        other => TransportError::Desync(other.to_string()),
    }
}
