//! DOE mailbox transport abstraction.
//!
//! The DOE core never touches mailbox registers. Everything above this crate
//! talks to a [`Mailbox`]: write one complete data object, read one complete
//! data object back. Waiting on the "data object ready" status, aborts and
//! timeouts all live behind that trait.
//!
//! For hosts without a real mailbox (emulators, tests, the CLI loopback
//! responder) a [`MailboxStream`] over a Unix domain socket is provided.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use traits::{Mailbox, MailboxStream};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
