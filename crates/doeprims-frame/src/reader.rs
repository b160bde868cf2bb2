use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use doeprims_transport::MailboxStream;

use crate::codec::{decode_object_bytes, DoeObject, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete DOE data objects from any `Read` stream.
///
/// Partial reads are buffered internally; callers always get whole objects.
pub struct ObjectReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> ObjectReader<T> {
    /// Create a new object reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new object reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete object, header included (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_object_bytes(&mut self) -> Result<Bytes> {
        loop {
            if let Some(object) = decode_object_bytes(&mut self.buf, self.config.max_object_size)? {
                return Ok(object);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read and decode the next object (blocking).
    pub fn read_object(&mut self) -> Result<DoeObject> {
        DoeObject::from_bytes(self.read_object_bytes()?)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl ObjectReader<MailboxStream> {
    /// Create a reader for a `MailboxStream` and apply the read timeout.
    pub fn with_config_stream(inner: MailboxStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: doeprims_transport::TransportError) -> FrameError {
    match err {
        doeprims_transport::TransportError::Io(io)
        | doeprims_transport::TransportError::Accept(io) => FrameError::Io(io),
        doeprims_transport::TransportError::Bind { source, .. }
        | doeprims_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
