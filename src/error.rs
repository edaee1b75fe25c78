//----------------------------------------------------------------------------------------------
// Module error
// XCP master error type

use thiserror::Error;

use crate::protocol::types::ChecksumType;
use crate::protocol::{Command, ErrorCode};

/// Errors surfaced by the codec, the transport listener and the command facade
#[derive(Error, Debug)]
pub enum XcpError {
    /// Frame or payload shorter than its layout requires, or an enumeration value outside its table
    #[error("malformed: {0}")]
    Malformed(String),

    /// The operation needs state that is not established yet, e.g. a byte order before CONNECT
    #[error("protocol state: {0}")]
    ProtocolState(&'static str),

    /// The slave answered with an ERR packet
    #[error("{command} rejected by slave: {code}")]
    SlaveRejected { command: Command, code: ErrorCode },

    /// No matching response within the command timeout
    #[error("{0} response timeout")]
    Timeout(Command),

    /// Socket error, peer closed or explicit close while a request was pending
    #[error("transport closed")]
    TransportClosed,

    /// A caller supplied value violates a documented precondition
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No local checksum algorithm available for the type reported by the slave
    #[error("checksum type {0:?} not supported")]
    ChecksumUnsupported(ChecksumType),

    /// A step of a multi step sequence failed, steps are numbered from 1
    #[error("{sequence} step {step} failed: {source}")]
    Sequence {
        sequence: &'static str,
        step: u8,
        source: Box<XcpError>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl XcpError {
    /// The slave error code, if this is an ERR response
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            XcpError::SlaveRejected { code, .. } => Some(*code),
            XcpError::Sequence { source, .. } => source.error_code(),
            _ => None,
        }
    }

    /// The command a timeout or slave rejection belongs to
    pub fn command(&self) -> Option<Command> {
        match self {
            XcpError::SlaveRejected { command, .. } | XcpError::Timeout(command) => Some(*command),
            XcpError::Sequence { source, .. } => source.command(),
            _ => None,
        }
    }

    /// The failed step of a sequence
    pub fn step(&self) -> Option<u8> {
        match self {
            XcpError::Sequence { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Result type alias using XcpError
pub type Result<T> = std::result::Result<T, XcpError>;
