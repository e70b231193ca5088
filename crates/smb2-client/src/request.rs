//! Request lifecycle as types.
//!
//! - [`Request`]: built, not yet submitted.
//! - [`PendingRequest`]: submitted and registered with its connection.
//!   Dropping it before it resolves cancels it.
//! - [`Response`]: what a pending request resolves to on success.

use std::sync::Arc;

use bytes::Bytes;
use smb2_core::{MessageId, NtStatus};
use smb2_protocol::{Command, Header, InboundPdu, OutboundPdu, ProtocolError};

use crate::connection::Shared;
use crate::error::ClientError;
use crate::types::OutcomeRx;

/// A request that has not been submitted yet.
///
/// `fixed` starts with the 2-byte body-size field. Both payloads are shared
/// handles; submitting never copies them.
#[derive(Debug, Clone)]
pub struct Request {
    header: Header,
    fixed: Bytes,
    dynamic: Bytes,
}

impl Request {
    /// A request with default credits and no identity. Prefer
    /// `Connection::create_request`, which stamps the session identity.
    pub fn new(opcode: u16, flags: u32, fixed: impl Into<Bytes>, dynamic: impl Into<Bytes>) -> Self {
        Request {
            header: Header::request(opcode, flags),
            fixed: fixed.into(),
            dynamic: dynamic.into(),
        }
    }

    pub fn for_command(command: Command, fixed: impl Into<Bytes>, dynamic: impl Into<Bytes>) -> Self {
        Request::new(command.opcode(), 0, fixed, dynamic)
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.header.flags = flags;
        self
    }

    pub fn with_credits(mut self, credits: u16) -> Self {
        self.header.credits = credits;
        self
    }

    pub fn with_credit_charge(mut self, credit_charge: u16) -> Self {
        self.header.credit_charge = credit_charge;
        self
    }

    pub fn with_process_id(mut self, process_id: u32) -> Self {
        self.header.process_id = process_id;
        self
    }

    pub fn with_tree_id(mut self, tree_id: u32) -> Self {
        self.header.tree_id = tree_id;
        self
    }

    pub fn with_session_id(mut self, session_id: u64) -> Self {
        self.header.session_id = session_id;
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn fixed(&self) -> &Bytes {
        &self.fixed
    }

    pub fn dynamic(&self) -> &Bytes {
        &self.dynamic
    }

    pub(crate) fn into_pdu(self, message_id: MessageId) -> OutboundPdu {
        let mut header = self.header;
        header.message_id = message_id;
        OutboundPdu::new(header, self.fixed, self.dynamic)
    }
}

/// A submitted request waiting for its response.
///
/// Dropping this before it resolves removes it from the pending set; no
/// error is produced for it, and a late response for its message id is then
/// treated as unmatched.
pub struct PendingRequest {
    message_id: MessageId,
    rx: OutcomeRx,
    shared: Arc<Shared>,
    resolved: bool,
}

impl PendingRequest {
    pub(crate) fn new(message_id: MessageId, rx: OutcomeRx, shared: Arc<Shared>) -> Self {
        PendingRequest {
            message_id,
            rx,
            shared,
            resolved: false,
        }
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// Wait for the response.
    ///
    /// With `expected_body_size`, a response whose raw body-size field
    /// differs fails with [`ClientError::BodySizeMismatch`]. That failure
    /// stays local to this request.
    pub async fn receive(mut self, expected_body_size: Option<u16>) -> Result<Response, ClientError> {
        let outcome = (&mut self.rx).await;
        self.resolved = true;
        let response = outcome.map_err(|_| ClientError::ReaderGone)??;

        if let Some(expected) = expected_body_size {
            let actual = response.body_size_field();
            if actual != expected {
                return Err(ClientError::BodySizeMismatch {
                    message_id: self.message_id,
                    expected,
                    actual,
                });
            }
        }

        Ok(response)
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if !self.resolved {
            self.shared.deregister(self.message_id);
        }
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("message_id", &self.message_id)
            .field("resolved", &self.resolved)
            .finish()
    }
}

/// A received response PDU.
///
/// The views are slices of the received frame; holding any of them keeps the
/// whole frame alive.
#[derive(Debug, Clone)]
pub struct Response {
    pdu: InboundPdu,
    frame: Bytes,
    last_in_chain: bool,
}

impl Response {
    pub(crate) fn new(pdu: InboundPdu, frame: Bytes, last_in_chain: bool) -> Self {
        Response {
            pdu,
            frame,
            last_in_chain,
        }
    }

    /// The peer's status for this request.
    pub fn status(&self) -> NtStatus {
        self.pdu.status()
    }

    /// False when the peer answered with an error-severity status.
    pub fn is_success(&self) -> bool {
        !self.status().is_error()
    }

    pub fn message_id(&self) -> MessageId {
        self.pdu.message_id()
    }

    pub fn header(&self) -> &Bytes {
        self.pdu.header()
    }

    pub fn body(&self) -> &Bytes {
        self.pdu.body()
    }

    pub fn trailing(&self) -> &Bytes {
        self.pdu.trailing()
    }

    pub fn body_size_field(&self) -> u16 {
        self.pdu.body_size_field()
    }

    pub fn decode_header(&self) -> Result<Header, ProtocolError> {
        self.pdu.decode_header()
    }

    /// The whole frame this response arrived in, every chained PDU included.
    pub fn frame(&self) -> &Bytes {
        &self.frame
    }

    pub fn is_last_in_chain(&self) -> bool {
        self.last_in_chain
    }
}
