use std::io;

use thiserror::Error;

/// Result type alias for kvbridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while talking to the key-value backend.
///
/// The retry loop consults [`Error::is_transient`] to decide whether an
/// attempt is worth repeating; everything else is returned to the caller
/// unchanged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An IO error occurred.
    #[error("IO error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: io::Error,
    },

    /// The peer sent something that is not valid RESP, or hung up mid-reply.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the error.
        message: String,
    },

    /// The server rejected the command (`ERR`, `WRONGTYPE`, ...).
    #[error("server error: {message}")]
    Server {
        /// Error message from server.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of invalid argument.
        message: String,
    },

    /// The client configuration is unusable (empty or malformed server list).
    #[error("configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// A network read, write or connect did not finish in time.
    #[error("operation timed out after {millis} ms")]
    Timeout {
        /// The timeout that elapsed.
        millis: u64,
    },

    /// No pooled connection became available within the pool's max wait.
    #[error("timed out waiting for a pooled connection to {address}")]
    PoolTimeout {
        /// Node the pool connects to.
        address: String,
    },

    /// Cluster: the slot lives on another node (permanent redirect).
    #[error("MOVED to slot {slot} at {address}")]
    Moved {
        /// The slot number (0-16383).
        slot: u16,
        /// Address of the node now owning the slot.
        address: String,
    },

    /// Cluster: the slot is migrating; retry once on the target after ASKING.
    #[error("ASK to slot {slot} at {address}")]
    Ask {
        /// The slot number (0-16383).
        slot: u16,
        /// Address of the node temporarily serving the slot.
        address: String,
    },

    /// Cluster is down or the slot is not served.
    #[error("CLUSTERDOWN cluster is down")]
    ClusterDown,

    /// Cluster: multi-key command on a slot under migration.
    #[error("TRYAGAIN slot is being resharded")]
    TryAgain,

    /// Multi-key operation with keys in different slots.
    #[error("CROSSSLOT keys in multi-key operation map to different slots")]
    CrossSlot,

    /// Redirections exceeded the configured limit for one command.
    #[error("too many cluster redirections (limit {limit})")]
    TooManyRedirections {
        /// The configured maximum.
        limit: u32,
    },

    /// The command ran but its reply did not have the expected shape. The
    /// command may already have taken effect, so this is never retried.
    #[error("unexpected reply: {message}")]
    UnexpectedReply {
        /// What was expected and what arrived.
        message: String,
    },

    /// A value could not be encoded or decoded by the cache codec.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The retry policy gave up.
    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error of the final attempt.
        #[source]
        last: Box<Error>,
    },
}

impl Error {
    /// Returns true for failures caused by backend availability rather than
    /// by the command itself. Only these are retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Io { .. }
                | Error::Protocol { .. }
                | Error::Timeout { .. }
                | Error::PoolTimeout { .. }
                | Error::ClusterDown
                | Error::TryAgain
                | Error::TooManyRedirections { .. }
                | Error::Moved { .. }
                | Error::Ask { .. }
        )
    }

    /// Returns true if the connection that produced this error must not be
    /// reused.
    pub(crate) fn poisons_connection(&self) -> bool {
        matches!(
            self,
            Error::Io { .. } | Error::Protocol { .. } | Error::Timeout { .. } | Error::Cancelled
        )
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    pub(crate) fn unexpected_reply(message: impl Into<String>) -> Self {
        Error::UnexpectedReply {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}
