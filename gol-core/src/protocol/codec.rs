//! Length-prefixed JSON framing
//!
//! A frame is a big-endian `u32` payload length followed by the payload.

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{GolError, Result};

/// Upper bound on a single frame's payload
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

const HEADER_LEN: usize = 4;

/// Encode a message into a complete frame
pub fn encode<T: Serialize>(message: &T) -> Result<Bytes> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(GolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_u32(payload.len() as u32);
    frame.put_slice(&payload);
    Ok(frame.freeze())
}

/// Decode a frame payload (header already stripped)
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(payload)?)
}

/// Write one message
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one message, `None` on a clean end of stream
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len > MAX_FRAME_LEN {
        return Err(GolError::FrameTooLarge { len, max: MAX_FRAME_LEN });
    }

    let mut payload = BytesMut::zeroed(len);
    reader.read_exact(&mut payload).await?;
    decode(&payload).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{LiveCellReport, WorkerRequest, WorkerSignal};

    #[tokio::test]
    async fn test_frames_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        write_frame(&mut a, &WorkerRequest::Signal(WorkerSignal::Pause)).await.unwrap();
        write_frame(&mut a, &LiveCellReport { turn: 3, live_cells: 12 }).await.unwrap();
        drop(a);

        let first: Option<WorkerRequest> = read_frame(&mut b).await.unwrap();
        assert!(matches!(first, Some(WorkerRequest::Signal(WorkerSignal::Pause))));

        let second: Option<LiveCellReport> = read_frame(&mut b).await.unwrap();
        assert_eq!(second, Some(LiveCellReport { turn: 3, live_cells: 12 }));

        let end: Option<LiveCellReport> = read_frame(&mut b).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_oversized_header_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(u32::MAX).await.unwrap();

        let result: Result<Option<LiveCellReport>> = read_frame(&mut b).await;
        assert!(matches!(result, Err(GolError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_garbage_payload() {
        let result: Result<LiveCellReport> = decode(b"not json");
        assert!(matches!(result, Err(GolError::InvalidMessage { .. })));
    }
}
