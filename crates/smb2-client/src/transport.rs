//! Length-prefixed framing over a byte stream.
//!
//! The read side accumulates into a persistent buffer so a read can be
//! cancelled at any await point without losing or splitting a frame. The
//! write side pushes a batch's segments in order and flushes once.

use std::io;

use bytes::{Buf, Bytes, BytesMut};
use smb2_protocol::decode_length_prefix;
use smb2_protocol::wire_types::LENGTH_PREFIX_SIZE;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::types::WriteRx;

pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    max_frame_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, capacity: usize, max_frame_len: usize) -> Self {
        FrameReader {
            inner,
            buf: BytesMut::with_capacity(capacity),
            max_frame_len,
        }
    }

    /// Read the next complete frame, length prefix stripped.
    ///
    /// Cancel-safe: bytes received before a cancellation stay buffered and
    /// are used by the next call.
    pub async fn read_next_frame(&mut self) -> io::Result<Bytes> {
        loop {
            if let Some(frame) = self.split_frame()? {
                return Ok(frame);
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                let msg = if self.buf.is_empty() {
                    "connection closed by peer"
                } else {
                    "connection closed in the middle of a frame"
                };
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, msg));
            }
        }
    }

    /// Bytes received but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn split_frame(&mut self) -> io::Result<Option<Bytes>> {
        if self.buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix.copy_from_slice(&self.buf[..LENGTH_PREFIX_SIZE]);
        let len = decode_length_prefix(prefix);
        if len > self.max_frame_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {} bytes exceeds limit {}", len, self.max_frame_len),
            ));
        }

        let needed = LENGTH_PREFIX_SIZE + len;
        if self.buf.len() < needed {
            self.buf.reserve(needed - self.buf.len());
            return Ok(None);
        }

        self.buf.advance(LENGTH_PREFIX_SIZE);
        let frame = self.buf.split_to(len).freeze();
        trace!(len, buffered = self.buf.len(), "frame received");
        Ok(Some(frame))
    }
}

pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        FrameWriter { inner }
    }

    /// Write every segment in order, then flush. Returns the bytes written.
    pub async fn write_segments(&mut self, segments: &[Bytes]) -> io::Result<usize> {
        let mut written = 0;
        for segment in segments {
            self.inner.write_all(segment).await?;
            written += segment.len();
        }
        self.inner.flush().await?;
        Ok(written)
    }
}

/// Writer task: one batch at a time, so batches never interleave.
///
/// Stops when the connection drops its sender, or on the first write error,
/// which is handed to `on_error`.
pub(crate) async fn run_writer<W, F>(mut writer: FrameWriter<W>, mut jobs: WriteRx, on_error: F)
where
    W: AsyncWrite + Unpin,
    F: FnOnce(io::Error),
{
    while let Some(job) = jobs.recv().await {
        match writer.write_segments(&job.segments).await {
            Ok(bytes) => trace!(first_message_id = %job.first_id, bytes, "batch written"),
            Err(err) => {
                warn!(first_message_id = %job.first_id, error = %err, "write failed");
                on_error(err);
                return;
            }
        }
    }
    debug!("writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[tokio::test]
    async fn reads_frames_split_across_writes() {
        let (mut peer, local) = duplex(1024);
        let mut reader = FrameReader::new(local, 16, 1024);

        let wire = framed(b"hello world");
        peer.write_all(&wire[..3]).await.unwrap();
        peer.write_all(&wire[3..9]).await.unwrap();
        peer.write_all(&wire[9..]).await.unwrap();

        let frame = reader.read_next_frame().await.unwrap();
        assert_eq!(&frame[..], b"hello world");
        assert_eq!(reader.buffered(), 0);
    }

    #[tokio::test]
    async fn keeps_the_rest_of_a_chunk_for_the_next_frame() {
        let (mut peer, local) = duplex(1024);
        let mut reader = FrameReader::new(local, 16, 1024);

        let mut wire = framed(b"one");
        wire.extend(framed(b""));
        wire.extend(framed(b"three"));
        peer.write_all(&wire).await.unwrap();

        assert_eq!(&reader.read_next_frame().await.unwrap()[..], b"one");
        assert!(reader.read_next_frame().await.unwrap().is_empty());
        assert_eq!(&reader.read_next_frame().await.unwrap()[..], b"three");
    }

    #[tokio::test]
    async fn close_mid_frame_is_unexpected_eof() {
        let (mut peer, local) = duplex(1024);
        let mut reader = FrameReader::new(local, 16, 1024);

        peer.write_all(&framed(b"truncated")[..6]).await.unwrap();
        drop(peer);

        let err = reader.read_next_frame().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn oversized_frame_is_invalid_data() {
        let (mut peer, local) = duplex(1024);
        let mut reader = FrameReader::new(local, 16, 8);

        peer.write_all(&framed(b"much too long")).await.unwrap();

        let err = reader.read_next_frame().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn writer_emits_segments_in_order() {
        let (local, mut peer) = duplex(1024);
        let mut writer = FrameWriter::new(local);

        let segments = vec![
            Bytes::from_static(b"ab"),
            Bytes::new(),
            Bytes::from_static(b"cde"),
        ];
        assert_eq!(writer.write_segments(&segments).await.unwrap(), 5);

        let mut got = [0u8; 5];
        peer.read_exact(&mut got).await.unwrap();
        assert_eq!(&got, b"abcde");
    }
}
