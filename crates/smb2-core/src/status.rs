//! NT status codes carried in the header's status field.
//!
//! Requests always carry `NtStatus::OK`. Responses carry the peer's result
//! code, which the engine hands to the caller without interpreting it.
//! Transport failures are mapped onto the same value space so every failure
//! a request can see is expressible as one `NtStatus`.

use std::fmt;
use std::io;

/// A 32-bit NT status code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct NtStatus(pub u32);

impl NtStatus {
    pub const OK: NtStatus = NtStatus(0x0000_0000);
    pub const PENDING: NtStatus = NtStatus(0x0000_0103);
    pub const UNSUCCESSFUL: NtStatus = NtStatus(0xC000_0001);
    pub const INVALID_PARAMETER: NtStatus = NtStatus(0xC000_000D);
    pub const END_OF_FILE: NtStatus = NtStatus(0xC000_0011);
    pub const MORE_PROCESSING_REQUIRED: NtStatus = NtStatus(0xC000_0016);
    pub const NO_MEMORY: NtStatus = NtStatus(0xC000_0017);
    pub const ACCESS_DENIED: NtStatus = NtStatus(0xC000_0022);
    pub const OBJECT_NAME_NOT_FOUND: NtStatus = NtStatus(0xC000_0034);
    pub const INSUFFICIENT_RESOURCES: NtStatus = NtStatus(0xC000_009A);
    pub const IO_TIMEOUT: NtStatus = NtStatus(0xC000_00B5);
    pub const INVALID_NETWORK_RESPONSE: NtStatus = NtStatus(0xC000_00C3);
    pub const LOCAL_DISCONNECT: NtStatus = NtStatus(0xC000_013B);
    pub const PIPE_BROKEN: NtStatus = NtStatus(0xC000_014B);
    pub const CONNECTION_DISCONNECTED: NtStatus = NtStatus(0xC000_020C);
    pub const CONNECTION_RESET: NtStatus = NtStatus(0xC000_020D);
    pub const CONNECTION_REFUSED: NtStatus = NtStatus(0xC000_0236);
    pub const CONNECTION_ABORTED: NtStatus = NtStatus(0xC000_0241);
    pub const USER_SESSION_DELETED: NtStatus = NtStatus(0xC000_0203);
    pub const NETWORK_NAME_DELETED: NtStatus = NtStatus(0xC000_00C9);

    /// Raw 32-bit value as it appears on the wire.
    pub fn code(self) -> u32 {
        self.0
    }

    /// Top two bits of the code: 0 success, 1 informational,
    /// 2 warning, 3 error.
    pub fn severity(self) -> u8 {
        (self.0 >> 30) as u8
    }

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// True for error-severity codes. Success, informational and warning
    /// codes all count as "the peer processed the request".
    pub fn is_error(self) -> bool {
        self.severity() == 3
    }

    /// Symbolic name for the codes this crate knows about.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            NtStatus::OK => "STATUS_OK",
            NtStatus::PENDING => "STATUS_PENDING",
            NtStatus::UNSUCCESSFUL => "STATUS_UNSUCCESSFUL",
            NtStatus::INVALID_PARAMETER => "STATUS_INVALID_PARAMETER",
            NtStatus::END_OF_FILE => "STATUS_END_OF_FILE",
            NtStatus::MORE_PROCESSING_REQUIRED => "STATUS_MORE_PROCESSING_REQUIRED",
            NtStatus::NO_MEMORY => "STATUS_NO_MEMORY",
            NtStatus::ACCESS_DENIED => "STATUS_ACCESS_DENIED",
            NtStatus::OBJECT_NAME_NOT_FOUND => "STATUS_OBJECT_NAME_NOT_FOUND",
            NtStatus::INSUFFICIENT_RESOURCES => "STATUS_INSUFFICIENT_RESOURCES",
            NtStatus::IO_TIMEOUT => "STATUS_IO_TIMEOUT",
            NtStatus::INVALID_NETWORK_RESPONSE => "STATUS_INVALID_NETWORK_RESPONSE",
            NtStatus::LOCAL_DISCONNECT => "STATUS_LOCAL_DISCONNECT",
            NtStatus::PIPE_BROKEN => "STATUS_PIPE_BROKEN",
            NtStatus::CONNECTION_DISCONNECTED => "STATUS_CONNECTION_DISCONNECTED",
            NtStatus::CONNECTION_RESET => "STATUS_CONNECTION_RESET",
            NtStatus::CONNECTION_REFUSED => "STATUS_CONNECTION_REFUSED",
            NtStatus::CONNECTION_ABORTED => "STATUS_CONNECTION_ABORTED",
            NtStatus::USER_SESSION_DELETED => "STATUS_USER_SESSION_DELETED",
            NtStatus::NETWORK_NAME_DELETED => "STATUS_NETWORK_NAME_DELETED",
            _ => return None,
        };
        Some(name)
    }

    /// Map a transport I/O error to the status every pending request on the
    /// failed connection will see.
    pub fn from_io_error(err: &io::Error) -> NtStatus {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => NtStatus::CONNECTION_DISCONNECTED,
            io::ErrorKind::ConnectionReset => NtStatus::CONNECTION_RESET,
            io::ErrorKind::ConnectionRefused => NtStatus::CONNECTION_REFUSED,
            io::ErrorKind::ConnectionAborted => NtStatus::CONNECTION_ABORTED,
            io::ErrorKind::BrokenPipe => NtStatus::PIPE_BROKEN,
            io::ErrorKind::NotConnected => NtStatus::CONNECTION_DISCONNECTED,
            io::ErrorKind::TimedOut => NtStatus::IO_TIMEOUT,
            io::ErrorKind::OutOfMemory => NtStatus::NO_MEMORY,
            io::ErrorKind::InvalidData => NtStatus::INVALID_NETWORK_RESPONSE,
            _ => NtStatus::UNSUCCESSFUL,
        }
    }
}

impl From<u32> for NtStatus {
    fn from(code: u32) -> Self {
        NtStatus(code)
    }
}

impl From<&io::Error> for NtStatus {
    fn from(err: &io::Error) -> Self {
        NtStatus::from_io_error(err)
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08x})", name, self.0),
            None => write!(f, "NT status 0x{:08x}", self.0),
        }
    }
}
