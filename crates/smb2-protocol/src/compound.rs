//! Compound PDU framing.
//!
//! Outbound, a batch of PDUs becomes one list of buffer segments written
//! with a single transport write:
//!
//! ```text
//! [len u32 BE] [hdr0][fixed0][dyn0][pad0] [hdr1][fixed1][dyn1][pad1] ... [hdrN][fixedN][dynN]
//! ```
//!
//! - `len` covers everything after itself.
//! - every PDU except the last is zero-padded to a multiple of 8 and carries
//!   its padded size in the next-command field; the last carries 0.
//! - an empty dynamic part produces no segment.
//!
//! Inbound, a received frame (length prefix already stripped) is split into
//! `(header, body, trailing)` views following the next-command chain. The
//! views are `Bytes` slices of the frame, so no PDU is copied and every view
//! keeps the frame alive for as long as it is held.

use std::convert::TryFrom;
use std::fmt;

use bytes::Bytes;
use smb2_core::{MessageId, NtStatus};

use crate::header::{check_header, read_u16_be, read_u32_be, read_u64_be, Header};
use crate::wire_types::{
    offsets, padding_for, COMPOUND_ALIGNMENT, HEADER_SIZE, LENGTH_PREFIX_SIZE, MIN_PDU_SIZE,
};

static PADDING: [u8; COMPOUND_ALIGNMENT] = [0; COMPOUND_ALIGNMENT];

/// Errors that can arise when building or parsing a compound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes left than a header (plus body-size field) needs.
    Truncated { remaining: usize, needed: usize },
    /// Protocol id at offset 0 is not `FE 'S' 'M' 'B'`.
    BadMagic([u8; 4]),
    /// Header-length field is not 64.
    BadHeaderLength(u16),
    /// Next-command offset points inside the header or past the frame.
    BadNextCommand { offset: u32, remaining: usize },
    /// Body-size field below 2 or larger than the PDU span allows.
    BadBodySize { body_size: u16, span: usize },
    /// A compound needs at least one PDU.
    EmptyCompound,
    /// Encoded size does not fit the 32-bit length/offset fields.
    FrameTooLarge(usize),
    /// Could not allocate the segment list.
    OutOfMemory,
}

impl ProtocolError {
    /// Status reported to requests that fail because of this error.
    pub fn status(&self) -> NtStatus {
        match self {
            ProtocolError::OutOfMemory => NtStatus::NO_MEMORY,
            ProtocolError::EmptyCompound | ProtocolError::FrameTooLarge(_) => {
                NtStatus::INVALID_PARAMETER
            }
            _ => NtStatus::INVALID_NETWORK_RESPONSE,
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Truncated { remaining, needed } => write!(
                f,
                "PDU truncated: {} bytes left, expected at least {}",
                remaining, needed
            ),
            ProtocolError::BadMagic(m) => write!(
                f,
                "non-SMB2 PDU: protocol id {:02x}{:02x}{:02x}{:02x}",
                m[0], m[1], m[2], m[3]
            ),
            ProtocolError::BadHeaderLength(len) => {
                write!(f, "header length {}, expected {}", len, HEADER_SIZE)
            }
            ProtocolError::BadNextCommand { offset, remaining } => write!(
                f,
                "next command offset {} invalid with {} bytes left",
                offset, remaining
            ),
            ProtocolError::BadBodySize { body_size, span } => {
                write!(f, "body size {} invalid for PDU span {}", body_size, span)
            }
            ProtocolError::EmptyCompound => write!(f, "compound without PDUs"),
            ProtocolError::FrameTooLarge(len) => write!(f, "frame of {} bytes too large", len),
            ProtocolError::OutOfMemory => write!(f, "out of memory building segments"),
        }
    }
}

impl std::error::Error for ProtocolError {}

// ============================================================================
// OUTBOUND
// ============================================================================

/// One request PDU ready for framing.
///
/// `fixed` and `dynamic` are caller-owned buffers shared by reference count;
/// framing never copies them.
#[derive(Debug, Clone)]
pub struct OutboundPdu {
    pub header: Header,
    pub fixed: Bytes,
    pub dynamic: Bytes,
}

impl OutboundPdu {
    pub fn new(header: Header, fixed: Bytes, dynamic: Bytes) -> Self {
        OutboundPdu {
            header,
            fixed,
            dynamic,
        }
    }

    /// Unpadded size: header + fixed + dynamic.
    pub fn len(&self) -> usize {
        HEADER_SIZE + self.fixed.len() + self.dynamic.len()
    }
}

/// Post-framing hook run on every outbound PDU once its next-command offset
/// is final and before its header is serialized.
///
/// Implementations may fill in the signature field and set the signed flag.
pub trait PduSigner: Send + Sync {
    fn sign(&self, header: &mut Header, fixed: &[u8], dynamic: &[u8]);
}

/// Signer that leaves every PDU untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsigned;

impl PduSigner for Unsigned {
    fn sign(&self, _header: &mut Header, _fixed: &[u8], _dynamic: &[u8]) {}
}

/// Build the segment list for one compound write.
///
/// Next-command offsets are written back into each PDU's header so the
/// caller's copy matches what goes on the wire. The first segment is the
/// 4-byte length prefix.
pub fn encode_compound(
    pdus: &mut [OutboundPdu],
    signer: &dyn PduSigner,
) -> Result<Vec<Bytes>, ProtocolError> {
    if pdus.is_empty() {
        return Err(ProtocolError::EmptyCompound);
    }

    // prefix + per PDU: header, fixed, dynamic, padding
    let mut segments: Vec<Bytes> = Vec::new();
    segments
        .try_reserve_exact(1 + 4 * pdus.len())
        .map_err(|_| ProtocolError::OutOfMemory)?;
    segments.push(Bytes::new());

    let count = pdus.len();
    let mut total: usize = 0;

    for (i, pdu) in pdus.iter_mut().enumerate() {
        let last = i + 1 == count;
        let unpadded = pdu.len();
        let pad = if last { 0 } else { padding_for(unpadded) };
        let span = unpadded + pad;

        pdu.header.next_command = if last {
            0
        } else {
            u32::try_from(span).map_err(|_| ProtocolError::FrameTooLarge(span))?
        };
        signer.sign(&mut pdu.header, &pdu.fixed, &pdu.dynamic);

        segments.push(pdu.header.to_bytes());
        segments.push(pdu.fixed.clone());
        if !pdu.dynamic.is_empty() {
            segments.push(pdu.dynamic.clone());
        }
        if pad > 0 {
            segments.push(Bytes::from_static(&PADDING[..pad]));
        }

        total = total
            .checked_add(span)
            .ok_or(ProtocolError::FrameTooLarge(usize::MAX))?;
    }

    let prefix = u32::try_from(total).map_err(|_| ProtocolError::FrameTooLarge(total))?;
    segments[0] = Bytes::copy_from_slice(&prefix.to_be_bytes());

    Ok(segments)
}

/// Encode the 4-byte stream length prefix.
pub fn encode_length_prefix(len: usize) -> Result<[u8; LENGTH_PREFIX_SIZE], ProtocolError> {
    let len = u32::try_from(len).map_err(|_| ProtocolError::FrameTooLarge(len))?;
    Ok(len.to_be_bytes())
}

/// Decode the 4-byte stream length prefix.
pub fn decode_length_prefix(prefix: [u8; LENGTH_PREFIX_SIZE]) -> usize {
    u32::from_be_bytes(prefix) as usize
}

// ============================================================================
// INBOUND
// ============================================================================

/// One PDU sliced out of a received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPdu {
    header: Bytes,
    body: Bytes,
    trailing: Bytes,
}

impl InboundPdu {
    /// The 64 header bytes.
    pub fn header(&self) -> &Bytes {
        &self.header
    }

    /// Body bytes, `body_size` long (padding bit masked off).
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Whatever follows the body up to the next PDU: the dynamic part of
    /// the response and any inter-PDU padding.
    pub fn trailing(&self) -> &Bytes {
        &self.trailing
    }

    pub fn message_id(&self) -> MessageId {
        MessageId(read_u64_be(&self.header, offsets::MESSAGE_ID))
    }

    pub fn status(&self) -> NtStatus {
        NtStatus(read_u32_be(&self.header, offsets::STATUS))
    }

    pub fn opcode(&self) -> u16 {
        read_u16_be(&self.header, offsets::OPCODE)
    }

    pub fn next_command(&self) -> u32 {
        read_u32_be(&self.header, offsets::NEXT_COMMAND)
    }

    /// Raw body-size field, including the reserved low bit.
    pub fn body_size_field(&self) -> u16 {
        read_u16_be(&self.body, 0)
    }

    /// Total bytes this PDU occupied in the frame.
    pub fn span(&self) -> usize {
        self.header.len() + self.body.len() + self.trailing.len()
    }

    /// Fully decoded header fields.
    pub fn decode_header(&self) -> Result<Header, ProtocolError> {
        Header::decode(&self.header)
    }
}

/// Split one received frame into its chained PDUs.
///
/// The whole frame is rejected on the first framing error; no partial list
/// is ever returned. An empty frame (keep-alive) yields no PDUs.
pub fn parse_compound(frame: &Bytes) -> Result<Vec<InboundPdu>, ProtocolError> {
    let mut pdus = Vec::new();
    let mut taken = 0usize;

    while taken < frame.len() {
        let remaining = frame.len() - taken;
        let hdr = &frame[taken..];

        // We need the header plus the body length field.
        if remaining < MIN_PDU_SIZE {
            return Err(ProtocolError::Truncated {
                remaining,
                needed: MIN_PDU_SIZE,
            });
        }
        check_header(hdr)?;

        let next_command = read_u32_be(hdr, offsets::NEXT_COMMAND);
        let raw_body_size = read_u16_be(hdr, HEADER_SIZE);

        let span = if next_command != 0 {
            let offset = next_command as usize;
            if offset < MIN_PDU_SIZE || offset > remaining {
                return Err(ProtocolError::BadNextCommand {
                    offset: next_command,
                    remaining,
                });
            }
            offset
        } else {
            remaining
        };

        if raw_body_size < 2 {
            return Err(ProtocolError::BadBodySize {
                body_size: raw_body_size,
                span,
            });
        }
        let body_size = (raw_body_size & !1) as usize;
        if body_size > span - HEADER_SIZE {
            return Err(ProtocolError::BadBodySize {
                body_size: raw_body_size,
                span,
            });
        }

        let start = taken;
        let body_start = start + HEADER_SIZE;
        let body_end = body_start + body_size;
        pdus.push(InboundPdu {
            header: frame.slice(start..body_start),
            body: frame.slice(body_start..body_end),
            trailing: frame.slice(body_end..start + span),
        });

        taken += span;
    }

    Ok(pdus)
}
