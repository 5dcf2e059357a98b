//! Frame reading and writing over async byte streams.

use std::io;

use bytes::BytesMut;
use tandem_proto::{Frame, FrameHeader, ProtocolError};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Failure reading or writing one frame
#[derive(Error, Debug)]
pub enum CodecError {
    /// Socket failure or truncated stream
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Bytes did not form a valid frame
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Read one frame.
///
/// Returns `Ok(None)` on a clean end of stream before the first header byte.
///
/// # Errors
///
/// - `CodecError::Protocol` if the header is corrupt; the stream cannot be
///   resynchronized after this
/// - `CodecError::Io` if the socket fails or closes mid-frame
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FrameHeader::SIZE];
    let mut filled = 0;
    while filled < header.len() {
        match reader.read(&mut header[filled..]).await? {
            0 if filled == 0 => return Ok(None),
            0 => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
            n => filled += n,
        }
    }

    let header = FrameHeader::from_bytes(&header)?;

    let mut payload = BytesMut::zeroed(header.payload_len());
    reader.read_exact(&mut payload).await?;

    Ok(Some(Frame::new(header, payload.freeze())))
}

/// Encode and write one frame, then flush.
///
/// # Errors
///
/// Returns `CodecError::Io` if the socket fails.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(frame.encoded_len());
    frame.encode(&mut buf)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tandem_proto::{ClientEvent, ServerEvent};

    use super::*;

    #[tokio::test]
    async fn frames_survive_a_stream() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let frame = ServerEvent::error("slow down").into_frame().expect("encodes");
        write_frame(&mut server, &frame).await.expect("write");
        write_frame(&mut server, &frame).await.expect("write");
        drop(server);

        assert_eq!(read_frame(&mut client).await.expect("read"), Some(frame.clone()));
        assert_eq!(read_frame(&mut client).await.expect("read"), Some(frame));
        assert_eq!(read_frame(&mut client).await.expect("read"), None);
    }

    #[tokio::test]
    async fn decoded_frame_yields_client_event() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let frame = ClientEvent::FindNewPartner.into_frame().expect("encodes");
        write_frame(&mut client, &frame).await.expect("write");

        let read = read_frame(&mut server).await.expect("read").expect("one frame");
        assert_eq!(ClientEvent::from_frame(&read), Ok(ClientEvent::FindNewPartner));
    }

    #[tokio::test]
    async fn corrupt_header_is_a_protocol_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(b"garbage!").await.expect("write");

        let err = read_frame(&mut server).await.expect_err("bad magic");
        assert!(matches!(err, CodecError::Protocol(ProtocolError::InvalidMagic)));
    }

    #[tokio::test]
    async fn stream_closing_mid_frame_is_an_io_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0x54, 0x44, 0x01]).await.expect("write");
        drop(client);

        let err = read_frame(&mut server).await.expect_err("truncated");
        assert!(matches!(err, CodecError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }
}
