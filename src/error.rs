use std::io;

use thiserror::Error;

use crate::transport::Method;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong inside a node.
///
/// Transport failures (`Bind`, `Dial`, `Io`, `Deadline`) and malformed wire
/// payloads (`FrameTooLarge`, `Codec`, `BadLength`) surface to the caller;
/// only `Bind` is fatal at startup. The stabilization loop logs any of
/// these and retries on the next tick.
#[derive(Debug, Error)]
pub enum Error {
    /// The listener could not be bound at startup.
    #[error("failed to bind listener at {addr}")]
    Bind {
        /// The address the node attempted to listen on.
        addr: String,
        /// The underlying socket error.
        #[source]
        source: io::Error,
    },

    /// An outbound connection could not be established.
    #[error("failed to dial {addr}")]
    Dial {
        /// The peer address that could not be reached.
        addr: String,
        /// The underlying socket error.
        #[source]
        source: io::Error,
    },

    /// Reading or writing an established connection failed.
    #[error("connection i/o failed")]
    Io(#[from] io::Error),

    /// A frame header announced more bytes than the protocol allows.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// The announced payload length.
        len: usize,
        /// The configured frame limit.
        max: usize,
    },

    /// A wire payload could not be decoded.
    #[error("malformed wire payload")]
    Codec(#[from] serde_json::Error),

    /// A reply to a lookup could not be decoded into a peer reference.
    #[error("could not decode rpc reply from {addr}")]
    Lookup {
        /// The peer whose reply was unusable.
        addr: String,
        /// The decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// An outbound call did not complete within the configured deadline.
    #[error("rpc to {addr} timed out")]
    Deadline {
        /// The peer that failed to answer in time.
        addr: String,
    },

    /// An identifier payload had the wrong width.
    #[error("expected a {expected} byte identifier, got {got} bytes")]
    BadLength {
        /// The required payload width.
        expected: usize,
        /// The width actually received.
        got: usize,
    },

    /// A request carried a method tag this node does not serve.
    #[error("no handler for rpc method {method:?}")]
    Unhandled {
        /// The offending method tag.
        method: Method,
    },
}
