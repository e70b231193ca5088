//! smb2-protocol
//!
//! Wire-level encoding/decoding for the client engine.
//!
//! This crate turns request headers and opaque payloads into compound
//! transport writes, and received frames back into per-PDU views.
//!
//! - [`wire_types`] : constants, offsets, command ids, flags
//! - [`header`]     : the fixed 64-byte header
//! - [`compound`]   : compound chaining, padding and the inbound parser

pub mod compound;
pub mod header;
pub mod wire_types;

pub use compound::{
    decode_length_prefix, encode_compound, encode_length_prefix, parse_compound, InboundPdu,
    OutboundPdu, PduSigner, ProtocolError, Unsigned,
};
pub use header::Header;
pub use wire_types::{Command, HEADER_SIZE, MIN_PDU_SIZE};
