//! Low-level wire types and constants.
//!
//! This module defines:
//! - The fixed header size, magic and field offsets.
//! - Command (opcode) ids and header flag bits.
//! - Compound alignment helpers.
//!
//! The actual encode/decode logic lives in `header` and `compound`.

/// Protocol id at offset 0 of every header.
pub const MAGIC: [u8; 4] = [0xFE, b'S', b'M', b'B'];

/// Size of the fixed header (`H`). Also the value of the header-length field.
pub const HEADER_SIZE: usize = 64;

/// Size of the body-size field that starts every command body.
pub const BODY_SIZE_FIELD_LEN: usize = 2;

/// Smallest span a chained PDU can have: the header plus the body-size field.
pub const MIN_PDU_SIZE: usize = HEADER_SIZE + BODY_SIZE_FIELD_LEN;

/// Stream framing: every frame is preceded by a 4-byte big-endian length.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Every non-last PDU of a compound is padded to this alignment.
pub const COMPOUND_ALIGNMENT: usize = 8;

/// Epoch / credit charge stamped into new requests.
pub const DEFAULT_CREDIT_CHARGE: u16 = 1;

/// Credits requested by every new request.
pub const DEFAULT_CREDITS: u16 = 31;

/// Header field offsets.
pub mod offsets {
    pub const PROTOCOL_ID: usize = 0;
    pub const HEADER_LENGTH: usize = 4;
    pub const CREDIT_CHARGE: usize = 6;
    pub const STATUS: usize = 8;
    pub const OPCODE: usize = 12;
    pub const CREDITS: usize = 14;
    pub const FLAGS: usize = 16;
    pub const NEXT_COMMAND: usize = 20;
    pub const MESSAGE_ID: usize = 24;
    pub const PROCESS_ID: usize = 32;
    pub const TREE_ID: usize = 36;
    pub const SESSION_ID: usize = 40;
    pub const SIGNATURE: usize = 48;
}

/// Header flag bits.
pub mod flags {
    /// Set by the server on every response.
    pub const SERVER_TO_REDIR: u32 = 0x0000_0001;
    pub const ASYNC_COMMAND: u32 = 0x0000_0002;
    /// Operation is related to the previous one in the compound.
    pub const RELATED_OPERATIONS: u32 = 0x0000_0004;
    pub const SIGNED: u32 = 0x0000_0008;
    pub const DFS_OPERATIONS: u32 = 0x1000_0000;
}

/// Command ids carried in the opcode field.
///
/// The engine itself treats the opcode as opaque; this enum is for callers
/// building requests and for logging.
#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    Negotiate = 0x00,
    SessionSetup = 0x01,
    Logoff = 0x02,
    TreeConnect = 0x03,
    TreeDisconnect = 0x04,
    Create = 0x05,
    Close = 0x06,
    Flush = 0x07,
    Read = 0x08,
    Write = 0x09,
    Lock = 0x0A,
    Ioctl = 0x0B,
    Cancel = 0x0C,
    Echo = 0x0D,
    QueryDirectory = 0x0E,
    ChangeNotify = 0x0F,
    QueryInfo = 0x10,
    SetInfo = 0x11,
    OplockBreak = 0x12,
}

impl Command {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0x00 => Some(Command::Negotiate),
            0x01 => Some(Command::SessionSetup),
            0x02 => Some(Command::Logoff),
            0x03 => Some(Command::TreeConnect),
            0x04 => Some(Command::TreeDisconnect),
            0x05 => Some(Command::Create),
            0x06 => Some(Command::Close),
            0x07 => Some(Command::Flush),
            0x08 => Some(Command::Read),
            0x09 => Some(Command::Write),
            0x0A => Some(Command::Lock),
            0x0B => Some(Command::Ioctl),
            0x0C => Some(Command::Cancel),
            0x0D => Some(Command::Echo),
            0x0E => Some(Command::QueryDirectory),
            0x0F => Some(Command::ChangeNotify),
            0x10 => Some(Command::QueryInfo),
            0x11 => Some(Command::SetInfo),
            0x12 => Some(Command::OplockBreak),
            _ => None,
        }
    }

    pub fn opcode(self) -> u16 {
        self as u16
    }
}

/// Zero bytes needed after a PDU of `len` bytes to reach the next
/// compound alignment boundary.
pub fn padding_for(len: usize) -> usize {
    match len % COMPOUND_ALIGNMENT {
        0 => 0,
        rem => COMPOUND_ALIGNMENT - rem,
    }
}
