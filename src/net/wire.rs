//! Peer wire protocol: length-prefixed JSON frames.
//!
//! Each frame is a u32 big-endian payload length followed by a JSON
//! document. Two requests exist: push a batch of replication events, or
//! pull a full snapshot (used on node join). Frames are size-capped so a
//! misbehaving peer cannot make the node allocate unbounded memory.

use crate::registry::instance::InstanceInfo;
use crate::replication::event::ReplicationEvent;
use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on one frame's payload.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Request sent between registry peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PeerRequest {
    /// Push a batch of replication events.
    Push {
        origin: String,
        events: Vec<ReplicationEvent>,
    },
    /// Pull a full registry snapshot.
    PullSnapshot,
}

/// Response to a peer request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PeerResponse {
    /// Push accepted; `applied` counts events that changed state.
    Ack { applied: usize },
    /// Snapshot of every registered instance.
    Snapshot { instances: Vec<InstanceInfo> },
    /// The request could not be served.
    Error { message: String },
}

/// Wire-level failure.
#[derive(Debug, Error)]
pub enum WireError {
    /// Frame length exceeds [`MAX_FRAME_BYTES`].
    #[error("frame of {len} bytes exceeds the {MAX_FRAME_BYTES} byte cap")]
    FrameTooLarge { len: usize },

    /// Payload was not valid JSON for the expected type.
    #[error("malformed frame payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode a value as one frame into the buffer.
pub fn encode_frame<T: Serialize>(value: &T, buf: &mut BytesMut) -> Result<(), WireError> {
    let payload = serde_json::to_vec(value)?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(WireError::FrameTooLarge { len: payload.len() });
    }
    buf.reserve(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);
    Ok(())
}

/// Decode one frame from the buffer, if a complete one is present.
///
/// Consumes the frame's bytes on success and leaves the buffer untouched
/// when the frame is still incomplete.
pub fn decode_frame<T: DeserializeOwned>(buf: &mut BytesMut) -> Result<Option<T>, WireError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(WireError::FrameTooLarge { len });
    }
    if buf.len() < 4 + len {
        return Ok(None);
    }
    buf.advance(4);
    let payload = buf.split_to(len);
    Ok(Some(serde_json::from_slice(&payload)?))
}

/// Write one framed message to the stream.
pub async fn write_message<W, T>(writer: &mut W, value: &T) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut buf = BytesMut::new();
    encode_frame(value, &mut buf)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message from the stream.
///
/// Returns None on clean end-of-stream before a new frame starts.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, WireError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(error) => return Err(error.into()),
    }
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(WireError::FrameTooLarge { len });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(serde_json::from_slice(&payload)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let mut buf = BytesMut::new();
        encode_frame(&PeerRequest::PullSnapshot, &mut buf).unwrap();
        let decoded: PeerRequest = decode_frame(&mut buf).unwrap().unwrap();
        assert!(matches!(decoded, PeerRequest::PullSnapshot));
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_waits() {
        let mut buf = BytesMut::new();
        encode_frame(&PeerResponse::Ack { applied: 3 }, &mut buf).unwrap();
        let mut partial = buf.split_to(buf.len() - 1);
        assert!(decode_frame::<PeerResponse>(&mut partial).unwrap().is_none());
        // Complete the frame and decode.
        partial.unsplit(buf);
        let decoded: PeerResponse = decode_frame(&mut partial).unwrap().unwrap();
        assert!(matches!(decoded, PeerResponse::Ack { applied: 3 }));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32((MAX_FRAME_BYTES + 1) as u32);
        buf.put_slice(b"xxxx");
        assert!(matches!(
            decode_frame::<PeerRequest>(&mut buf),
            Err(WireError::FrameTooLarge { .. })
        ));
    }
}
