use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::MailboxStream;

/// Mailbox sockets are only reachable by the owning user.
const MAILBOX_SOCKET_MODE: u32 = 0o600;

/// `sockaddr_un.sun_path` capacity, terminating NUL included.
#[cfg(target_os = "linux")]
const SUN_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const SUN_PATH_LEN: usize = 104;

/// Unix domain socket standing in for a DOE mailbox.
///
/// The responder binds a path, requesters connect to it. Each accepted
/// connection is one mailbox. The socket file is unlinked on drop unless
/// another responder has since replaced it.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    identity: (u64, u64),
}

impl UnixDomainSocket {
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = path.as_os_str().len();
        if len >= SUN_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: SUN_PATH_LEN,
            });
        }

        let bound = clear_stale_socket(&path)
            .and_then(|()| UnixListener::bind(&path))
            .and_then(|listener| {
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(MAILBOX_SOCKET_MODE))?;
                let identity = socket_identity(&path)?;
                Ok((listener, identity))
            });
        let (listener, identity) = match bound {
            Ok(bound) => bound,
            Err(source) => return Err(TransportError::Bind { path, source }),
        };

        info!(?path, "DOE mailbox listening on unix domain socket");
        Ok(Self {
            listener,
            path,
            identity,
        })
    }

    /// Wait for the next requester (blocking).
    pub fn accept(&self) -> Result<MailboxStream> {
        let (stream, _) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "requester attached to mailbox");
        Ok(MailboxStream::from_unix(stream))
    }

    pub fn connect(path: impl AsRef<Path>) -> Result<MailboxStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "attached to mailbox");
        Ok(MailboxStream::from_unix(stream))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        match socket_identity(&self.path) {
            Ok(identity) if identity == self.identity => {
                let _ = std::fs::remove_file(&self.path);
            }
            _ => debug!(path = ?self.path, "mailbox socket replaced; not unlinking"),
        }
    }
}

/// Remove a leftover socket from a previous responder. Anything that is not
/// a socket is refused.
fn clear_stale_socket(path: &Path) -> io::Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if !metadata.file_type().is_socket() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "existing path is not a unix socket",
        ));
    }
    debug!(?path, "removing stale mailbox socket");
    std::fs::remove_file(path)
}

/// `(dev, ino)` of the socket at `path`.
fn socket_identity(path: &Path) -> io::Result<(u64, u64)> {
    let metadata = std::fs::symlink_metadata(path)?;
    if !metadata.file_type().is_socket() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a unix socket"));
    }
    Ok((metadata.dev(), metadata.ino()))
}
