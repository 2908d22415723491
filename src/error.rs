//! Error types for the SAM bridge client.
//!
//! Every operation that talks to the bridge returns [`Result`], and every
//! failure is surfaced to the caller immediately. Nothing is retried.

use std::io;
use thiserror::Error;

/// The main error type for all SAM operations.
#[derive(Error, Debug)]
pub enum SamError {
    /// I/O error while connecting to, reading from or writing to the bridge.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The bridge closed the connection before sending a reply.
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    /// A connect, read or write deadline expired.
    #[error("Operation timed out")]
    Timeout,

    /// The command could not be written within the allowed number of attempts.
    #[error("Writing to SAM failed after {attempts} attempts")]
    WriteFailed {
        /// Number of write calls issued before giving up.
        attempts: usize,
    },

    /// The bridge does not speak SAM version 3.0.
    #[error("That SAM bridge does not support SAMv3")]
    UnsupportedVersion,

    /// The reply did not match the expected grammar for the command.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// A reply token could not be interpreted.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A reply exceeded the configured maximum size without a line terminator.
    #[error("Reply exceeds {limit} bytes")]
    ReplyTooLarge {
        /// The configured limit.
        limit: usize,
    },

    /// A session with the requested id already exists on the bridge.
    #[error("Duplicate session id")]
    DuplicateSessionId,

    /// A session using the requested destination already exists on the bridge.
    #[error("Duplicate destination")]
    DuplicateDestination,

    /// The bridge rejected the destination keys.
    #[error("Invalid key")]
    InvalidKey,

    /// The bridge reported a failure with a message.
    #[error("I2P error: {0}")]
    RemoteError(String),

    /// The bridge confirmed a session for a destination other than the one requested.
    #[error("Bridge created a tunnel with different keys than requested")]
    IntegrityError {
        /// The destination that was sent in `SESSION CREATE`.
        requested: String,
        /// The destination the bridge echoed back.
        received: String,
    },

    /// Invalid argument provided to a command.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl SamError {
    /// Whether this error originates from the underlying transport rather
    /// than from the content of a reply.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SamError::Io(_)
                | SamError::ConnectionClosed
                | SamError::Timeout
                | SamError::WriteFailed { .. }
                | SamError::ReplyTooLarge { .. }
        )
    }
}

/// Result type alias for SAM operations.
pub type Result<T> = std::result::Result<T, SamError>;

/// Values of the `RESULT=` field used across SAM replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// `OK`
    Ok,
    /// `NOVERSION` - no mutually supported protocol version
    NoVersion,
    /// `DUPLICATED_ID` - session id already in use
    DuplicatedId,
    /// `DUPLICATED_DEST` - destination already in use
    DuplicatedDest,
    /// `INVALID_KEY` - malformed or rejected key
    InvalidKey,
    /// `KEY_NOT_FOUND` - naming lookup found nothing
    KeyNotFound,
    /// `I2P_ERROR` - generic router error, usually with `MESSAGE=`
    I2pError,
    /// `CANT_REACH_PEER` - the remote destination is unreachable
    CantReachPeer,
    /// `INVALID_ID` - unknown session id
    InvalidId,
    /// `TIMEOUT` - the router timed out
    Timeout,
    /// `ALREADY_ACCEPTING` - a stream accept is already pending
    AlreadyAccepting,
    /// Unknown result value
    Unknown,
}

impl ResultCode {
    /// Parse a result code from the value of a `RESULT=` token.
    pub fn parse(value: &str) -> Self {
        match value {
            "OK" => ResultCode::Ok,
            "NOVERSION" => ResultCode::NoVersion,
            "DUPLICATED_ID" => ResultCode::DuplicatedId,
            "DUPLICATED_DEST" => ResultCode::DuplicatedDest,
            "INVALID_KEY" => ResultCode::InvalidKey,
            "KEY_NOT_FOUND" => ResultCode::KeyNotFound,
            "I2P_ERROR" => ResultCode::I2pError,
            "CANT_REACH_PEER" => ResultCode::CantReachPeer,
            "INVALID_ID" => ResultCode::InvalidId,
            "TIMEOUT" => ResultCode::Timeout,
            "ALREADY_ACCEPTING" => ResultCode::AlreadyAccepting,
            _ => ResultCode::Unknown,
        }
    }

    /// Check if this result code indicates success.
    pub fn is_success(&self) -> bool {
        *self == ResultCode::Ok
    }

    /// The wire spelling of this code, `None` for [`ResultCode::Unknown`].
    pub fn as_str(&self) -> Option<&'static str> {
        Some(match self {
            ResultCode::Ok => "OK",
            ResultCode::NoVersion => "NOVERSION",
            ResultCode::DuplicatedId => "DUPLICATED_ID",
            ResultCode::DuplicatedDest => "DUPLICATED_DEST",
            ResultCode::InvalidKey => "INVALID_KEY",
            ResultCode::KeyNotFound => "KEY_NOT_FOUND",
            ResultCode::I2pError => "I2P_ERROR",
            ResultCode::CantReachPeer => "CANT_REACH_PEER",
            ResultCode::InvalidId => "INVALID_ID",
            ResultCode::Timeout => "TIMEOUT",
            ResultCode::AlreadyAccepting => "ALREADY_ACCEPTING",
            ResultCode::Unknown => return None,
        })
    }
}
