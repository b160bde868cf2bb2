use std::io::{Read, Write};

use bytes::Bytes;

use crate::error::Result;

/// A DOE mailbox: one live transaction at a time.
///
/// `transmit` hands over exactly one framed data object and returns once the
/// mailbox accepted it (the "go" doorbell on hardware). `receive` blocks until
/// the responder has a complete data object ready and returns it whole.
/// Implementations own polling, interrupts and timeouts; callers get either a
/// complete object or an error.
pub trait Mailbox {
    /// Write one complete data object to the mailbox.
    fn transmit(&mut self, object: &[u8]) -> Result<()>;

    /// Read one complete data object from the mailbox.
    fn receive(&mut self) -> Result<Bytes>;

    /// Run a single request/response transaction.
    fn send_and_receive(&mut self, object: &[u8]) -> Result<Bytes> {
        self.transmit(object)?;
        self.receive()
    }
}

impl<M: Mailbox + ?Sized> Mailbox for &mut M {
    fn transmit(&mut self, object: &[u8]) -> Result<()> {
        (**self).transmit(object)
    }

    fn receive(&mut self) -> Result<Bytes> {
        (**self).receive()
    }

    fn send_and_receive(&mut self, object: &[u8]) -> Result<Bytes> {
        (**self).send_and_receive(object)
    }
}

impl<M: Mailbox + ?Sized> Mailbox for Box<M> {
    fn transmit(&mut self, object: &[u8]) -> Result<()> {
        (**self).transmit(object)
    }

    fn receive(&mut self) -> Result<Bytes> {
        (**self).receive()
    }

    fn send_and_receive(&mut self, object: &[u8]) -> Result<Bytes> {
        (**self).send_and_receive(object)
    }
}

/// A connected byte stream to a mailbox emulator. Implements Read + Write.
///
/// Data objects are carried back to back; each one is self-delimited by the
/// length field in its DOE header. Object boundaries are recovered by the
/// frame layer, not here.
pub struct MailboxStream {
    inner: MailboxStreamInner,
}

enum MailboxStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for MailboxStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            MailboxStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for MailboxStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            MailboxStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            MailboxStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl MailboxStream {
    /// Create a MailboxStream from a Unix domain socket stream.
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: MailboxStreamInner::Unix(stream),
        }
    }

    /// Create a connected pair of streams, one per mailbox side.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            MailboxStreamInner::Unix(stream) => {
                stream.set_read_timeout(timeout).map_err(Into::into)
            }
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            MailboxStreamInner::Unix(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            MailboxStreamInner::Unix(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_unix(cloned))
            }
        }
    }
}

impl std::fmt::Debug for MailboxStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            MailboxStreamInner::Unix(_) => f
                .debug_struct("MailboxStream")
                .field("type", &"unix")
                .finish(),
        }
    }
}
