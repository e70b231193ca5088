// crates/smb2-protocol/tests/compound_framing.rs
use bytes::Bytes;
use smb2_core::{MessageId, NtStatus};
use smb2_protocol::wire_types::{flags, offsets, LENGTH_PREFIX_SIZE};
use smb2_protocol::{
    decode_length_prefix, encode_compound, parse_compound, Command, Header, OutboundPdu,
    PduSigner, ProtocolError, Unsigned, HEADER_SIZE,
};

fn pdu(id: u64, fixed: &[u8], dynamic: &[u8]) -> OutboundPdu {
    let mut header = Header::request(Command::Echo.opcode(), 0);
    header.message_id = MessageId(id);
    OutboundPdu::new(
        header,
        Bytes::copy_from_slice(fixed),
        Bytes::copy_from_slice(dynamic),
    )
}

/// Concatenate the segments and strip the length prefix, checking it.
fn frame_of(segments: &[Bytes]) -> Bytes {
    let wire: Vec<u8> = segments.concat();
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&wire[..LENGTH_PREFIX_SIZE]);
    assert_eq!(decode_length_prefix(prefix), wire.len() - LENGTH_PREFIX_SIZE);
    Bytes::from(wire[LENGTH_PREFIX_SIZE..].to_vec())
}

/// A single response-shaped PDU with explicit header fields.
fn raw_pdu(next_command: u32, body_size: u16, total_len: usize) -> Vec<u8> {
    let mut header = Header::request(Command::Read.opcode(), flags::SERVER_TO_REDIR);
    header.next_command = next_command;
    let mut out = header.to_bytes().to_vec();
    out.extend_from_slice(&body_size.to_be_bytes());
    out.resize(total_len, 0xAB);
    out
}

#[test]
fn single_request_round_trips_through_the_parser() {
    let mut header = Header::request(Command::Create.opcode(), flags::DFS_OPERATIONS);
    header.message_id = MessageId(42);
    header.process_id = 0xFEFF;
    header.tree_id = 7;
    header.session_id = 0x1122_3344_5566_7788;

    let fixed = [0x00, 0x11, 1, 2, 3, 4, 5, 6, 7];
    let dynamic = b"file.txt";
    let mut pdus = vec![OutboundPdu::new(
        header.clone(),
        Bytes::copy_from_slice(&fixed),
        Bytes::from_static(dynamic),
    )];

    let segments = encode_compound(&mut pdus, &Unsigned).unwrap();
    let frame = frame_of(&segments);
    let parsed = parse_compound(&frame).unwrap();

    assert_eq!(parsed.len(), 1);
    let got = &parsed[0];
    assert_eq!(got.decode_header().unwrap(), header);
    assert_eq!(got.message_id(), MessageId(42));
    assert_eq!(got.status(), NtStatus::OK);
    assert_eq!(got.opcode(), Command::Create.opcode());

    // body_size 0x11 masks to 0x10: fixed plus most of the dynamic part.
    assert_eq!(got.body_size_field(), 0x11);
    assert_eq!(got.body().len(), 16);
    assert_eq!(got.trailing().len(), 1);
    let mut payload = got.body().to_vec();
    payload.extend_from_slice(got.trailing());
    let mut expected = fixed.to_vec();
    expected.extend_from_slice(dynamic);
    assert_eq!(payload, expected);
}

#[test]
fn compound_pads_non_last_pdus_and_chains_offsets() {
    let mut pdus = vec![
        pdu(1, &[0x00, 0x04, 0, 0], b""),
        pdu(2, &[0x00, 0x09, 1, 2, 3, 4, 5, 6, 7], b"abc"),
        pdu(3, &[0x00, 0x08, 9, 9, 9, 9, 9, 9], b""),
        pdu(4, &[0x00, 0x04, 0, 0], b"tail"),
    ];
    let unpadded: Vec<usize> = pdus.iter().map(|p| p.len()).collect();

    let segments = encode_compound(&mut pdus, &Unsigned).unwrap();
    let frame = frame_of(&segments);

    let mut start = 0usize;
    for (i, p) in pdus.iter().enumerate() {
        assert_eq!(start % 8, 0, "PDU {} starts unaligned", i);

        // The on-wire header carries the offset written back into the PDU.
        let on_wire = Header::decode(&frame[start..]).unwrap();
        assert_eq!(on_wire.next_command, p.header.next_command);

        let next = p.header.next_command as usize;
        if i + 1 == pdus.len() {
            assert_eq!(next, 0);
            start += unpadded[i];
        } else {
            assert_eq!(next % 8, 0);
            assert!(next >= unpadded[i] && next < unpadded[i] + 8);
            start += next;
        }
    }
    assert_eq!(start, frame.len());

    let parsed = parse_compound(&frame).unwrap();
    let ids: Vec<u64> = parsed.iter().map(|p| p.message_id().value()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[test]
fn padding_bytes_are_zero_and_the_last_pdu_is_not_padded() {
    let mut pdus = vec![pdu(1, &[0x00, 0x03, 0xFF], b""), pdu(2, &[0x00, 0x03, 0xFF], b"")];

    let segments = encode_compound(&mut pdus, &Unsigned).unwrap();

    // prefix, hdr0, fixed0, pad0, hdr1, fixed1
    assert_eq!(segments.len(), 6);
    assert_eq!(segments[3].len(), 5);
    assert!(segments[3].iter().all(|b| *b == 0));
    assert_eq!(segments[5].len(), 3);

    let total: usize = segments[1..].iter().map(|s| s.len()).sum();
    assert_eq!(total, 72 + HEADER_SIZE + 3);
}

#[test]
fn empty_compound_is_rejected() {
    let mut pdus: Vec<OutboundPdu> = Vec::new();
    assert_eq!(
        encode_compound(&mut pdus, &Unsigned).unwrap_err(),
        ProtocolError::EmptyCompound
    );
}

struct StampingSigner;

impl PduSigner for StampingSigner {
    fn sign(&self, header: &mut Header, fixed: &[u8], _dynamic: &[u8]) {
        header.flags |= flags::SIGNED;
        header.signature = [fixed.len() as u8; 16];
    }
}

#[test]
fn signer_runs_after_offsets_are_final() {
    let mut pdus = vec![pdu(1, &[0x00, 0x04, 0, 0], b""), pdu(2, &[0x00, 0x04, 0, 0], b"")];

    let segments = encode_compound(&mut pdus, &StampingSigner).unwrap();
    let frame = frame_of(&segments);
    let parsed = parse_compound(&frame).unwrap();

    let first = parsed[0].decode_header().unwrap();
    assert_eq!(first.flags & flags::SIGNED, flags::SIGNED);
    assert_eq!(first.signature, [4u8; 16]);
    assert_eq!(first.next_command, 72);
    assert_eq!(&parsed[1].header()[offsets::SIGNATURE..], &[4u8; 16][..]);
}

#[test]
fn parser_masks_the_reserved_body_size_bit() {
    let frame = Bytes::from(raw_pdu(0, 0x0009, HEADER_SIZE + 16));
    let parsed = parse_compound(&frame).unwrap();

    assert_eq!(parsed[0].body().len(), 8);
    assert_eq!(parsed[0].trailing().len(), 8);
    assert_eq!(parsed[0].span(), HEADER_SIZE + 16);
}

#[test]
fn parser_rejects_body_size_below_minimum() {
    let frame = Bytes::from(raw_pdu(0, 1, HEADER_SIZE + 8));
    assert!(matches!(
        parse_compound(&frame),
        Err(ProtocolError::BadBodySize { body_size: 1, .. })
    ));
}

#[test]
fn parser_rejects_body_size_beyond_span() {
    let frame = Bytes::from(raw_pdu(0, 0x20, HEADER_SIZE + 8));
    assert!(matches!(
        parse_compound(&frame),
        Err(ProtocolError::BadBodySize { body_size: 0x20, .. })
    ));
}

#[test]
fn parser_rejects_next_command_inside_the_header() {
    let mut wire = raw_pdu(65, 4, HEADER_SIZE + 8);
    wire.extend(raw_pdu(0, 4, HEADER_SIZE + 8));
    let frame = Bytes::from(wire);

    assert_eq!(
        parse_compound(&frame).unwrap_err(),
        ProtocolError::BadNextCommand {
            offset: 65,
            remaining: 2 * (HEADER_SIZE + 8)
        }
    );
}

#[test]
fn parser_rejects_next_command_past_the_frame() {
    let frame = Bytes::from(raw_pdu(200, 4, HEADER_SIZE + 8));
    assert!(matches!(
        parse_compound(&frame),
        Err(ProtocolError::BadNextCommand { offset: 200, .. })
    ));
}

#[test]
fn parser_rejects_short_trailing_pdu() {
    let mut wire = raw_pdu(72, 4, 72);
    // Second chain position has only a partial header.
    wire.extend_from_slice(&[0xFE, b'S', b'M', b'B', 0, 64]);
    let frame = Bytes::from(wire);

    assert_eq!(
        parse_compound(&frame).unwrap_err(),
        ProtocolError::Truncated {
            remaining: 6,
            needed: HEADER_SIZE + 2
        }
    );
}

#[test]
fn parser_rejects_bad_magic_and_header_length() {
    let mut wire = raw_pdu(0, 4, HEADER_SIZE + 4);
    wire[0] = 0xFF;
    assert_eq!(
        parse_compound(&Bytes::from(wire)).unwrap_err(),
        ProtocolError::BadMagic([0xFF, b'S', b'M', b'B'])
    );

    let mut wire = raw_pdu(0, 4, HEADER_SIZE + 4);
    wire[offsets::HEADER_LENGTH..offsets::HEADER_LENGTH + 2].copy_from_slice(&32u16.to_be_bytes());
    assert_eq!(
        parse_compound(&Bytes::from(wire)).unwrap_err(),
        ProtocolError::BadHeaderLength(32)
    );
}

#[test]
fn empty_frame_is_a_keep_alive() {
    assert!(parse_compound(&Bytes::new()).unwrap().is_empty());
}

#[test]
fn response_header_mirrors_the_request() {
    let mut request = Header::request(Command::Echo.opcode(), 0);
    request.message_id = MessageId(9);
    request.tree_id = 3;

    let response = Header::response_to(&request, NtStatus::ACCESS_DENIED);
    assert!(response.is_response());
    assert!(!request.is_response());
    assert_eq!(response.message_id, MessageId(9));
    assert_eq!(response.tree_id, 3);
    assert_eq!(response.status, NtStatus::ACCESS_DENIED);
    assert_eq!(response.command(), Some(Command::Echo));
}
