//! Error types
//!
//! Defines domain-specific error types for each module of the FTP engine.
//!
//! `ConnectionError` is kept as its own type rather than folded into the
//! umbrella enum: it is the one error class that terminates a session, so
//! the session loops match on it directly. Everything else is caught at the
//! command-handling boundary and turned into a protocol reply (server) or
//! surfaced to the prompt (client).

use std::fmt;
use std::io;

/// Socket-level failure on the control channel. Not retried; the session
/// that observes it is torn down and all sockets it owns are closed.
#[derive(Debug)]
pub enum ConnectionError {
    /// Orderly close by the peer (read returned 0 bytes).
    Closed,
    Io(io::Error),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Closed => write!(f, "connection closed by peer"),
            ConnectionError::Io(e) => write!(f, "connection error: {}", e),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<io::Error> for ConnectionError {
    fn from(error: io::Error) -> Self {
        ConnectionError::Io(error)
    }
}

/// Bad PASV/PORT/EPSV/EPRT payload. Surfaced as a negative protocol reply;
/// the session continues.
#[derive(Debug, PartialEq)]
pub struct MalformedAddress(pub String);

impl fmt::Display for MalformedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed address payload: {}", self.0)
    }
}

impl std::error::Error for MalformedAddress {}

/// Data-channel negotiation or transfer failure. Surfaced as a 425/426-class
/// reply; the control connection survives.
#[derive(Debug)]
pub enum DataConnectionError {
    /// A transfer command arrived with no preceding PASV/PORT/EPSV/EPRT.
    NotNegotiated,
    /// The negotiated connection was already consumed by a transfer.
    AlreadyUsed,
    /// A send was attempted on a receive-tagged connection, or vice versa.
    WrongDirection,
    Io(io::Error),
}

impl fmt::Display for DataConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataConnectionError::NotNegotiated => {
                write!(f, "no data connection negotiated; use PORT or PASV first")
            }
            DataConnectionError::AlreadyUsed => {
                write!(f, "data connection already consumed by a previous transfer")
            }
            DataConnectionError::WrongDirection => {
                write!(f, "data connection used against its direction tag")
            }
            DataConnectionError::Io(e) => write!(f, "data connection error: {}", e),
        }
    }
}

impl std::error::Error for DataConnectionError {}

impl From<io::Error> for DataConnectionError {
    fn from(error: io::Error) -> Self {
        DataConnectionError::Io(error)
    }
}

/// Storage collaborator errors, mapped to 550-class replies by the server.
#[derive(Debug)]
pub enum StorageError {
    FileNotFound(String),
    DirectoryNotFound(String),
    NotADirectory(String),
    InvalidPath(String),
    Io(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::FileNotFound(p) => write!(f, "file not found: {}", p),
            StorageError::DirectoryNotFound(p) => write!(f, "directory not found: {}", p),
            StorageError::NotADirectory(p) => write!(f, "not a directory: {}", p),
            StorageError::InvalidPath(p) => write!(f, "invalid path: {}", p),
            StorageError::Io(e) => write!(f, "storage I/O error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        StorageError::Io(error)
    }
}

/// Umbrella error for the client sequencer and the binaries.
#[derive(Debug)]
pub enum FtpError {
    Connection(ConnectionError),
    Address(MalformedAddress),
    Data(DataConnectionError),
    Storage(StorageError),
    /// Login rejected with a 530-class reply; fatal for the login sequence.
    AuthenticationFailed(String),
    /// The peer broke the reply grammar or answered out of sequence.
    Protocol(String),
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpError::Connection(e) => write!(f, "{}", e),
            FtpError::Address(e) => write!(f, "{}", e),
            FtpError::Data(e) => write!(f, "{}", e),
            FtpError::Storage(e) => write!(f, "{}", e),
            FtpError::AuthenticationFailed(msg) => write!(f, "authentication failed: {}", msg),
            FtpError::Protocol(msg) => write!(f, "protocol error: {}", msg),
        }
    }
}

impl std::error::Error for FtpError {}

impl From<ConnectionError> for FtpError {
    fn from(error: ConnectionError) -> Self {
        FtpError::Connection(error)
    }
}

impl From<MalformedAddress> for FtpError {
    fn from(error: MalformedAddress) -> Self {
        FtpError::Address(error)
    }
}

impl From<DataConnectionError> for FtpError {
    fn from(error: DataConnectionError) -> Self {
        FtpError::Data(error)
    }
}

impl From<StorageError> for FtpError {
    fn from(error: StorageError) -> Self {
        FtpError::Storage(error)
    }
}
