//! Crate-wide error type

use core::fmt;

/// Result alias used throughout the crate
pub type Result<T> = core::result::Result<T, Error>;

/// All fallible outcomes surfaced by the engine, scheduler and SNMP responder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The engine is disabled via `set_enabled(false)`
    Disabled,
    /// A request descriptor failed validation (bad command width, oversized
    /// expected length, empty or oversized framing terminator)
    BadParam,
    /// The bounded job queue is at capacity
    QueueFull,
    /// `send_async` reported failure while starting a transmit
    TxStartFail,
    /// `tx_done()` did not become true within the fixed TX timeout
    TxTimeout,
    /// The receive phase did not complete within the descriptor's timeout
    RxTimeout,
    /// A framed response reached its capacity without matching its ending bytes
    RxCapBeforeEnding,
    /// The request's parser callback returned `false`
    ParserReject,
    /// A BER-encoded PDU was malformed
    InvalidPdu,
    /// A length field encoded with more than two length-of-length bytes
    LengthOverflow,
    /// A socket operation failed (bind, send, recv)
    IoError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::Disabled => "engine is disabled",
            Error::BadParam => "invalid request descriptor",
            Error::QueueFull => "job queue is full",
            Error::TxStartFail => "transmit start failed",
            Error::TxTimeout => "transmit did not complete in time",
            Error::RxTimeout => "receive phase timed out",
            Error::RxCapBeforeEnding => "receive buffer filled before expected ending",
            Error::ParserReject => "response parser rejected the reply",
            Error::InvalidPdu => "malformed BER PDU",
            Error::LengthOverflow => "BER length field too wide",
            Error::IoError => "socket operation failed",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Error {}
