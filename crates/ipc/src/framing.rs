//! Length-prefixed framing: `u32` little-endian payload length, then payload.

use anyhow::{Result, bail};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_FRAME_BYTES: usize = 1024 * 1024;
const PREFIX: usize = 4;

/// Prefix `payload` with its length.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.is_empty() || payload.len() > MAX_FRAME_BYTES {
        bail!("invalid frame payload size {}", payload.len());
    }
    let mut out = Vec::with_capacity(PREFIX + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Split one frame off the front of `buf`; returns the payload and the remainder.
pub fn decode_frame(buf: &[u8]) -> Result<(Vec<u8>, &[u8])> {
    if buf.len() < PREFIX {
        bail!("frame shorter than length prefix");
    }
    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len == 0 || len > MAX_FRAME_BYTES {
        bail!("invalid frame size {len}");
    }
    let body = &buf[PREFIX..];
    if body.len() < len {
        bail!("frame truncated: want {len} bytes, have {}", body.len());
    }
    Ok((body[..len].to_vec(), &body[len..]))
}

/// Read one frame; `Ok(None)` on clean EOF before a prefix.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; PREFIX];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(prefix) as usize;
    if len == 0 || len > MAX_FRAME_BYTES {
        bail!("invalid frame size {len}");
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let framed = encode_frame(payload)?;
    writer.write_all(&framed).await?;
    writer.flush().await?;
    Ok(())
}
