//! Length-prefixed JSON framing for the TCP push/pull links.
//!
//! Wire format: `[u32 BE length][JSON payload]`, where the length counts the
//! payload bytes only. Frames larger than [`MAX_FRAME_SIZE`] are refused on
//! both ends.

use serde::{Serialize, de::DeserializeOwned};
use std::{fmt, io};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted payload: 64 MiB, room for a base64 snapshot.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

const HEADER_LEN: usize = 4;

/// Errors that can occur while reading or writing frames.
#[derive(Debug)]
pub enum FrameError {
    /// Underlying I/O error.
    Io(io::Error),
    /// The payload exceeds [`MAX_FRAME_SIZE`].
    TooLarge { size: u32 },
    /// The payload is not the expected JSON.
    Json(serde_json::Error),
    /// The peer closed the connection between frames.
    ConnectionClosed,
}

impl FrameError {
    /// Whether the link is still usable after this error.
    ///
    /// A JSON error is raised only after the whole payload was consumed, so
    /// the stream is still aligned on the next frame.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::TooLarge { size } => {
                write!(f, "frame of {size} bytes exceeds the {MAX_FRAME_SIZE} byte limit")
            }
            Self::Json(e) => write!(f, "malformed payload: {e}"),
            Self::ConnectionClosed => f.write_str("connection closed"),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::TooLarge { .. } | Self::ConnectionClosed => None,
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for FrameError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Counts bytes written through it.
struct ByteCount(u64);

impl io::Write for ByteCount {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Payload size `msg` would have on the wire, without allocating it.
pub fn payload_len<T: Serialize>(msg: &T) -> Result<u64, FrameError> {
    let mut count = ByteCount(0);
    serde_json::to_writer(&mut count, msg)?;
    Ok(count.0)
}

/// Fail with [`FrameError::TooLarge`] if `msg` would not fit in one frame.
pub fn check_fits<T: Serialize>(msg: &T) -> Result<(), FrameError> {
    let len = payload_len(msg)?;
    match u32::try_from(len) {
        Ok(size) if size <= MAX_FRAME_SIZE => Ok(()),
        Ok(size) => Err(FrameError::TooLarge { size }),
        Err(_) => Err(FrameError::TooLarge { size: u32::MAX }),
    }
}

/// Serialize `msg` into a complete frame, header included.
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>, FrameError> {
    let mut frame = vec![0u8; HEADER_LEN];
    serde_json::to_writer(&mut frame, msg)?;

    let size = u32::try_from(frame.len() - HEADER_LEN)
        .map_err(|_| FrameError::TooLarge { size: u32::MAX })?;
    if size > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge { size });
    }
    frame[..HEADER_LEN].copy_from_slice(&size.to_be_bytes());
    Ok(frame)
}

/// Write `msg` as one frame and flush.
pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(msg)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame's payload.
///
/// A clean EOF before the header is [`FrameError::ConnectionClosed`]; an EOF
/// inside a frame is an I/O error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    if let Err(e) = reader.read_exact(&mut header).await {
        return Err(match e.kind() {
            io::ErrorKind::UnexpectedEof => FrameError::ConnectionClosed,
            _ => FrameError::Io(e),
        });
    }

    let size = u32::from_be_bytes(header);
    if size > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge { size });
    }

    let mut payload = vec![0u8; size as usize];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Read one frame and decode it as `T`.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let payload = read_frame(reader).await?;
    Ok(serde_json::from_slice(&payload)?)
}
