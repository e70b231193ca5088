//! Inbound demultiplexer.
//!
//! One reader task runs per connection while anything is pending. It reads a
//! frame, parses the compound and hands each PDU to the request with the
//! same message id. Arrival order never matters.

use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use smb2_core::{MessageId, PendingSet};
use smb2_protocol::{parse_compound, InboundPdu};
use tracing::{debug, trace, warn};

use crate::connection::{Shared, State};
use crate::error::ClientError;
use crate::request::Response;

pub(crate) async fn run_reader(shared: Arc<Shared>, generation: u64) {
    loop {
        let read = {
            let mut slot = shared.reader.lock().await;
            match slot.as_mut() {
                Some(reader) => reader.read_next_frame().await,
                None => Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "transport already closed",
                )),
            }
        };

        let mut state = shared.lock_state();
        match read {
            Ok(frame) => dispatch_frame(&shared, &mut state, frame),
            Err(err) => {
                shared.transport_failed(&mut state, &err);
                return;
            }
        }

        if state.reader_generation != generation {
            trace!(generation, "reader superseded");
            return;
        }
        if state.pending.is_empty() {
            state.read_task = None;
            debug!(generation, "nothing pending, reader released");
            return;
        }
    }
}

/// Parse one frame and resolve the requests it answers.
///
/// A frame that does not parse, or that names any message id that is not
/// pending, is dispatched to nobody: every pending request fails instead.
/// The transport stays open because the stream itself is still in sync.
pub(crate) fn dispatch_frame(shared: &Shared, state: &mut State, frame: Bytes) {
    let pdus = match parse_compound(&frame) {
        Ok(pdus) => pdus,
        Err(err) => {
            warn!(frame_len = frame.len(), error = %err, "malformed frame");
            shared.fail_pending(state, &ClientError::Protocol(err));
            return;
        }
    };

    if pdus.is_empty() {
        trace!("keep-alive frame");
        return;
    }

    if let Some(unknown) = first_uncorrelated(&pdus, &state.pending) {
        warn!(message_id = %unknown, "response does not match a pending request");
        shared.fail_pending(state, &ClientError::UnexpectedMessageId(unknown));
        return;
    }

    let last = pdus.len() - 1;
    for (position, pdu) in pdus.into_iter().enumerate() {
        let message_id = pdu.message_id();
        let Some((tx, _)) = state.pending.remove(message_id) else {
            continue;
        };

        let status = pdu.status();
        if status.is_error() {
            debug!(%message_id, %status, "request failed at peer");
        } else {
            trace!(%message_id, %status, "request completed");
        }

        let response = Response::new(pdu, frame.clone(), position == last);
        if tx.send(Ok(response)).is_err() {
            debug!(%message_id, "requester went away before its response");
        }
    }
}

/// First PDU whose message id is not pending, or repeats an earlier PDU's.
fn first_uncorrelated<T>(pdus: &[InboundPdu], pending: &PendingSet<T>) -> Option<MessageId> {
    let mut seen = HashSet::with_capacity(pdus.len());
    pdus.iter()
        .map(InboundPdu::message_id)
        .find(|id| !pending.contains(*id) || !seen.insert(*id))
}
