//! One client connection: request registry, compound submit and failure
//! propagation.
//!
//! All bookkeeping lives in one `State` behind a std mutex that is never held
//! across an await. The frame reader sits in its own async mutex so only the
//! reader task ever awaits on it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use smb2_core::{MessageId, MessageIdCounter, NtStatus, PendingSet, Transition};
use smb2_protocol::{encode_compound, OutboundPdu, PduSigner, Unsigned};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::demux;
use crate::error::ClientError;
use crate::request::{PendingRequest, Request};
use crate::transport::{run_writer, FrameReader, FrameWriter};
use crate::types::{BoxedReader, BoxedWriter, Identity, OutcomeTx, WriteJob, WriteTx};

pub(crate) struct State {
    /// `None` once the connection is closed.
    writer: Option<WriteTx>,
    writer_task: Option<JoinHandle<()>>,
    pub(crate) read_task: Option<JoinHandle<()>>,
    /// Bumped whenever a reader starts or is stopped.
    pub(crate) reader_generation: u64,
    message_ids: MessageIdCounter,
    pub(crate) pending: PendingSet<OutcomeTx>,
    identity: Identity,
    failure: Option<ClientError>,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    pub(crate) reader: tokio::sync::Mutex<Option<FrameReader<BoxedReader>>>,
    signer: Arc<dyn PduSigner>,
    runtime: Handle,
}

impl Shared {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a pending entry, starting the reader on the first one.
    fn register(
        self: &Arc<Self>,
        state: &mut State,
        message_id: MessageId,
        tx: OutcomeTx,
    ) -> Result<(), ClientError> {
        if state.pending.insert(message_id, tx)? == Transition::FirstPending {
            self.start_reader(state);
        }
        Ok(())
    }

    /// Remove a pending entry, stopping the reader on the last one.
    ///
    /// Unknown ids are a no-op.
    pub(crate) fn deregister(&self, message_id: MessageId) {
        let mut state = self.lock_state();
        self.deregister_locked(&mut state, message_id);
    }

    fn deregister_locked(&self, state: &mut State, message_id: MessageId) {
        match state.pending.remove(message_id) {
            Some((_, Transition::LastRemoved)) => {
                debug!(%message_id, "request cancelled, nothing left pending");
                stop_reader(state);
            }
            Some(_) => {
                debug!(%message_id, pending = state.pending.len(), "request cancelled");
            }
            None => debug!(%message_id, "deregister of a message id that is not pending"),
        }
    }

    fn start_reader(self: &Arc<Self>, state: &mut State) {
        state.reader_generation += 1;
        let generation = state.reader_generation;
        let shared = Arc::clone(self);
        state.read_task = Some(self.runtime.spawn(demux::run_reader(shared, generation)));
        debug!(generation, "reader started");
    }

    /// Resolve every pending request with `err`. The set is drained before
    /// any completion is sent.
    pub(crate) fn fail_pending(&self, state: &mut State, err: &ClientError) {
        let drained = state.pending.drain();
        if drained.is_empty() {
            return;
        }
        warn!(pending = drained.len(), error = %err, "failing all pending requests");
        for (message_id, tx) in drained {
            if tx.send(Err(err.clone())).is_err() {
                debug!(%message_id, "requester went away before its failure");
            }
        }
    }

    /// Close the transport and fail everything pending with `err`.
    ///
    /// Only the first failure is recorded; later calls are no-ops.
    pub(crate) fn close(self: &Arc<Self>, state: &mut State, err: ClientError) {
        if state.writer.is_none() {
            return;
        }
        info!(error = %err, "connection closed");

        state.writer = None;
        if let Some(task) = state.writer_task.take() {
            task.abort();
        }
        stop_reader(state);
        // Both stream halves must go for the socket to close. A reader
        // parked mid-read still holds the slot until its abort lands.
        match self.reader.try_lock() {
            Ok(mut slot) => {
                slot.take();
            }
            Err(_) => {
                let shared = Arc::clone(self);
                self.runtime.spawn(async move {
                    shared.reader.lock().await.take();
                    debug!("read half released");
                });
            }
        }

        self.fail_pending(state, &err);
        state.failure = Some(err);
    }

    pub(crate) fn transport_failed(self: &Arc<Self>, state: &mut State, err: &std::io::Error) {
        let status = NtStatus::from_io_error(err);
        debug!(error = %err, %status, "transport error");
        self.close(state, ClientError::Transport(status));
    }
}

fn stop_reader(state: &mut State) {
    if let Some(task) = state.read_task.take() {
        task.abort();
        state.reader_generation += 1;
        debug!(generation = state.reader_generation, "reader stopped");
    }
}

/// A client connection.
///
/// Cheap to share by reference across tasks; every operation takes `&self`.
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Open a TCP connection as described by `config`.
    pub async fn connect(config: &Config) -> Result<Self, ClientError> {
        let addr = config.socket_addr_string();
        info!("Connecting to {}...", addr);

        let connecting = TcpStream::connect(addr.as_str());
        let connected = match config.connect_timeout() {
            Some(limit) => tokio::time::timeout(limit, connecting)
                .await
                .map_err(|_| ClientError::Transport(NtStatus::IO_TIMEOUT))?,
            None => connecting.await,
        };
        let stream = connected.map_err(|e| {
            warn!(%addr, error = %e, "connect failed");
            ClientError::Transport(NtStatus::from_io_error(&e))
        })?;
        stream
            .set_nodelay(config.tcp_nodelay)
            .map_err(|e| ClientError::Transport(NtStatus::from_io_error(&e)))?;

        info!(%addr, "connected");
        Connection::from_stream(stream, config)
    }

    /// Run the engine over an already-established byte stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream<S>(stream: S, config: &Config) -> Result<Self, ClientError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Connection::with_signer(stream, config, Arc::new(Unsigned))
    }

    /// Like [`Connection::from_stream`], with a signer applied to every
    /// outbound PDU.
    pub fn with_signer<S>(
        stream: S,
        config: &Config,
        signer: Arc<dyn PduSigner>,
    ) -> Result<Self, ClientError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| ClientError::NoRuntime)?;

        let (read_half, write_half) = tokio::io::split(stream);
        let reader: BoxedReader = Box::new(read_half);
        let writer: BoxedWriter = Box::new(write_half);
        let (write_tx, write_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                writer: Some(write_tx),
                writer_task: None,
                read_task: None,
                reader_generation: 0,
                message_ids: MessageIdCounter::new(),
                pending: PendingSet::new(),
                identity: Identity {
                    process_id: config.process_id,
                    ..Identity::default()
                },
                failure: None,
            }),
            reader: tokio::sync::Mutex::new(Some(FrameReader::new(
                reader,
                config.read_buffer_capacity,
                config.max_frame_len,
            ))),
            signer,
            runtime: runtime.clone(),
        });

        let weak = Arc::downgrade(&shared);
        let writer_task = runtime.spawn(run_writer(FrameWriter::new(writer), write_rx, move |err| {
            if let Some(shared) = weak.upgrade() {
                let mut state = shared.lock_state();
                shared.transport_failed(&mut state, &err);
            }
        }));
        shared.lock_state().writer_task = Some(writer_task);

        Ok(Connection { shared })
    }

    /// Build a request stamped with this connection's current identity.
    pub fn create_request(
        &self,
        opcode: u16,
        flags: u32,
        fixed: impl Into<Bytes>,
        dynamic: impl Into<Bytes>,
    ) -> Request {
        let identity = self.identity();
        Request::new(opcode, flags, fixed, dynamic)
            .with_process_id(identity.process_id)
            .with_tree_id(identity.tree_id)
            .with_session_id(identity.session_id)
    }

    /// Submit one request.
    pub fn submit(&self, request: Request) -> Result<PendingRequest, ClientError> {
        self.compound_submit(vec![request])?
            .pop()
            .ok_or(ClientError::EmptyBatch)
    }

    /// Submit `requests` as one compound in a single transport write.
    ///
    /// Message ids are assigned in order. On error nothing has been queued
    /// or registered and no id has been consumed. A write failure shows up
    /// later as the requests' outcome.
    pub fn compound_submit(&self, requests: Vec<Request>) -> Result<Vec<PendingRequest>, ClientError> {
        if requests.is_empty() {
            return Err(ClientError::EmptyBatch);
        }

        let mut state = self.shared.lock_state();
        let writer = state.writer.clone().ok_or(ClientError::Disconnected)?;

        let ids = state.message_ids.peek_batch(requests.len())?;
        let first_id = ids[0];
        let mut pdus: Vec<OutboundPdu> = requests
            .into_iter()
            .zip(&ids)
            .map(|(request, id)| request.into_pdu(*id))
            .collect();
        let segments = encode_compound(&mut pdus, self.shared.signer.as_ref())?;
        let bytes: usize = segments.iter().map(Bytes::len).sum();

        writer
            .send(WriteJob { first_id, segments })
            .map_err(|_| ClientError::Disconnected)?;
        state.message_ids.commit(ids.len());

        let mut receivers = Vec::with_capacity(ids.len());
        for id in &ids {
            let (tx, rx) = oneshot::channel();
            if let Err(err) = self.shared.register(&mut state, *id, tx) {
                for (registered, _) in &receivers {
                    self.shared.deregister_locked(&mut state, *registered);
                }
                return Err(err);
            }
            receivers.push((*id, rx));
        }
        debug!(
            %first_id,
            count = ids.len(),
            bytes,
            pending = state.pending.len(),
            "compound queued"
        );
        drop(state);

        Ok(receivers
            .into_iter()
            .map(|(id, rx)| PendingRequest::new(id, rx, Arc::clone(&self.shared)))
            .collect())
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock_state().writer.is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.lock_state().pending.len()
    }

    pub fn is_pending(&self, message_id: MessageId) -> bool {
        self.shared.lock_state().pending.contains(message_id)
    }

    /// Whether a frame read is currently outstanding.
    pub fn is_reading(&self) -> bool {
        self.shared.lock_state().read_task.is_some()
    }

    /// The id the next submitted request will get.
    pub fn next_message_id(&self) -> MessageId {
        self.shared.lock_state().message_ids.peek()
    }

    pub fn identity(&self) -> Identity {
        self.shared.lock_state().identity
    }

    pub fn set_process_id(&self, process_id: u32) {
        self.shared.lock_state().identity.process_id = process_id;
    }

    pub fn set_tree_id(&self, tree_id: u32) {
        self.shared.lock_state().identity.tree_id = tree_id;
    }

    pub fn set_session_id(&self, session_id: u64) {
        self.shared.lock_state().identity.session_id = session_id;
    }

    /// Close the connection, failing everything pending with
    /// `LOCAL_DISCONNECT`.
    pub fn disconnect(&self) {
        let mut state = self.shared.lock_state();
        self.shared
            .close(&mut state, ClientError::Transport(NtStatus::LOCAL_DISCONNECT));
    }

    /// Why the connection closed, if it has.
    pub fn failure(&self) -> Option<ClientError> {
        self.shared.lock_state().failure.clone()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("Connection")
            .field("connected", &state.writer.is_some())
            .field("pending", &state.pending.len())
            .field("next_message_id", &state.message_ids.peek())
            .finish()
    }
}
