//! Fixed 64-byte PDU header.
//!
//! ```text
//! [0..4]   protocol id (FE 'S' 'M' 'B')
//! [4..6]   header length (u16 BE, always 64)
//! [6..8]   credit charge / epoch (u16 BE)
//! [8..12]  status (u32 BE, 0 on requests)
//! [12..14] opcode (u16 BE)
//! [14..16] credits (u16 BE)
//! [16..20] flags (u32 BE)
//! [20..24] next command offset (u32 BE, 0 = last in chain)
//! [24..32] message id (u64 BE)
//! [32..36] process id (u32 BE)
//! [36..40] tree id (u32 BE)
//! [40..48] session id (u64 BE)
//! [48..64] signature
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use smb2_core::{MessageId, NtStatus};

use crate::compound::ProtocolError;
use crate::wire_types::{
    flags, offsets, Command, DEFAULT_CREDITS, DEFAULT_CREDIT_CHARGE, HEADER_SIZE, MAGIC,
};

/// Decoded header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub credit_charge: u16,
    pub status: NtStatus,
    pub opcode: u16,
    pub credits: u16,
    pub flags: u32,
    pub next_command: u32,
    pub message_id: MessageId,
    pub process_id: u32,
    pub tree_id: u32,
    pub session_id: u64,
    pub signature: [u8; 16],
}

impl Header {
    /// Header for a new request with the engine's defaults: status OK,
    /// credit charge 1, 31 credits, no chaining, id 0 until submitted.
    pub fn request(opcode: u16, flags: u32) -> Self {
        Header {
            credit_charge: DEFAULT_CREDIT_CHARGE,
            status: NtStatus::OK,
            opcode,
            credits: DEFAULT_CREDITS,
            flags,
            next_command: 0,
            message_id: MessageId(0),
            process_id: 0,
            tree_id: 0,
            session_id: 0,
            signature: [0; 16],
        }
    }

    /// Header for a response to `request`, as a peer would build it.
    pub fn response_to(request: &Header, status: NtStatus) -> Self {
        Header {
            status,
            flags: request.flags | flags::SERVER_TO_REDIR,
            next_command: 0,
            signature: [0; 16],
            ..request.clone()
        }
    }

    pub fn command(&self) -> Option<Command> {
        Command::from_u16(self.opcode)
    }

    pub fn is_response(&self) -> bool {
        self.flags & flags::SERVER_TO_REDIR != 0
    }

    /// Append the 64 encoded bytes to `out`.
    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_slice(&MAGIC);
        out.put_u16(HEADER_SIZE as u16);
        out.put_u16(self.credit_charge);
        out.put_u32(self.status.code());
        out.put_u16(self.opcode);
        out.put_u16(self.credits);
        out.put_u32(self.flags);
        out.put_u32(self.next_command);
        out.put_u64(self.message_id.value());
        out.put_u32(self.process_id);
        out.put_u32(self.tree_id);
        out.put_u64(self.session_id);
        out.put_slice(&self.signature);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a header from the first 64 bytes of `buf`.
    ///
    /// Validates the magic and the header-length field.
    pub fn decode(buf: &[u8]) -> Result<Header, ProtocolError> {
        check_header(buf)?;

        let mut signature = [0u8; 16];
        signature.copy_from_slice(&buf[offsets::SIGNATURE..offsets::SIGNATURE + 16]);

        Ok(Header {
            credit_charge: read_u16_be(buf, offsets::CREDIT_CHARGE),
            status: NtStatus(read_u32_be(buf, offsets::STATUS)),
            opcode: read_u16_be(buf, offsets::OPCODE),
            credits: read_u16_be(buf, offsets::CREDITS),
            flags: read_u32_be(buf, offsets::FLAGS),
            next_command: read_u32_be(buf, offsets::NEXT_COMMAND),
            message_id: MessageId(read_u64_be(buf, offsets::MESSAGE_ID)),
            process_id: read_u32_be(buf, offsets::PROCESS_ID),
            tree_id: read_u32_be(buf, offsets::TREE_ID),
            session_id: read_u64_be(buf, offsets::SESSION_ID),
            signature,
        })
    }
}

/// Validate length, magic and header-length field of a raw header.
pub(crate) fn check_header(buf: &[u8]) -> Result<(), ProtocolError> {
    if buf.len() < HEADER_SIZE {
        return Err(ProtocolError::Truncated {
            remaining: buf.len(),
            needed: HEADER_SIZE,
        });
    }

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&buf[offsets::PROTOCOL_ID..offsets::PROTOCOL_ID + 4]);
    if magic != MAGIC {
        return Err(ProtocolError::BadMagic(magic));
    }

    let header_len = read_u16_be(buf, offsets::HEADER_LENGTH);
    if header_len as usize != HEADER_SIZE {
        return Err(ProtocolError::BadHeaderLength(header_len));
    }

    Ok(())
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------
//
// Callers bounds-check before reading; these only assemble the bytes.

pub(crate) fn read_u16_be(buf: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([buf[at], buf[at + 1]])
}

pub(crate) fn read_u32_be(buf: &[u8], at: usize) -> u32 {
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&buf[at..at + 4]);
    u32::from_be_bytes(arr)
}

pub(crate) fn read_u64_be(buf: &[u8], at: usize) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&buf[at..at + 8]);
    u64::from_be_bytes(arr)
}
