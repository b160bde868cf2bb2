use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use doeprims_transport::MailboxStream;
use tracing::debug;

use crate::bounds::validate_object;
use crate::codec::{encode_object, DoeObject, FrameConfig};
use crate::error::{FrameError, Result};
use crate::header::{DataObjectType, DoeHeader};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Writes complete DOE data objects to any `Write` stream.
pub struct ObjectWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> ObjectWriter<T> {
    /// Create a new object writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new object writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete object (blocking).
    pub fn write_object(&mut self, object: &DoeObject) -> Result<()> {
        self.send(
            object.vendor_id(),
            object.data_object_type(),
            object.payload.as_ref(),
        )
        .map(|_| ())
    }

    /// Frame and send a payload.
    pub fn send(
        &mut self,
        vendor_id: u16,
        data_object_type: DataObjectType,
        payload: &[u8],
    ) -> Result<DoeHeader> {
        self.buf.clear();
        let header = encode_object(vendor_id, data_object_type, payload, &mut self.buf)?;
        self.check_limit(header.total_len())?;
        self.write_buffered()?;
        debug!(
            data_object_type = header.data_object_type.name(),
            length_dw = header.length_dw,
            "wrote data object"
        );
        Ok(header)
    }

    /// Send an already framed object as-is.
    ///
    /// The object must pass [`validate_object`]; nothing malformed is put on
    /// the wire.
    pub fn write_raw(&mut self, object: &[u8]) -> Result<()> {
        validate_object(object)?;
        self.check_limit(object.len())?;
        self.buf.clear();
        self.buf.extend_from_slice(object);
        self.write_buffered()
    }

    fn check_limit(&self, size: usize) -> Result<()> {
        if size > self.config.max_object_size {
            return Err(FrameError::ObjectTooLarge {
                size,
                max: self.config.max_object_size,
            });
        }
        Ok(())
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                // An expired SO_SNDTIMEO surfaces as WouldBlock.
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl ObjectWriter<MailboxStream> {
    /// Create a writer for a `MailboxStream` and apply the write timeout.
    pub fn with_config_stream(inner: MailboxStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
