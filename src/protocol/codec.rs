//! Envelope framing
//!
//! The transport is a raw byte stream, so envelopes travel as
//! newline-delimited JSON: one serialized envelope per line. The line break
//! provides framing and the `type` field provides discrimination.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{CodecError, ProtocolError};
use crate::protocol::Envelope;

/// Upper bound on a single serialized envelope, in bytes.
pub const MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Reads the next envelope from `reader`.
///
/// Returns `Ok(None)` when the connection has been closed cleanly. A
/// complete line that cannot be decoded is a `CodecError::Protocol`; the
/// stream stays usable and the caller may keep reading. I/O failures are
/// `CodecError::Io` and end the session.
pub async fn read_envelope<R>(reader: &mut R) -> Result<Option<Envelope>, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }

        if line.len() > MAX_FRAME_LENGTH {
            return Err(ProtocolError::FrameTooLong(line.len()).into());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope: Envelope =
            serde_json::from_str(trimmed).map_err(ProtocolError::from)?;
        envelope.validate()?;
        return Ok(Some(envelope));
    }
}

/// Serializes one envelope and writes it as a single frame.
pub async fn write_envelope<W>(writer: &mut W, envelope: &Envelope) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = serde_json::to_vec(envelope).map_err(ProtocolError::from)?;
    frame.push(b'\n');
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
