use std::net::ToSocketAddrs;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::error::{LoomError, Result};

/// Maximum frame size (100 MB)
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Resolve-and-connect helper for `host:port` addresses.
///
/// The address may resolve to multiple socket addresses; each is tried in
/// order until one connects. `TCP_NODELAY` is set on the resulting stream so
/// small request frames are not delayed by Nagle's algorithm.
pub struct TcpConnector;

impl TcpConnector {
    pub async fn connect(addr: &str) -> Result<TcpStream> {
        let socket_addrs = addr.to_socket_addrs().map_err(|e| LoomError::Connect {
            addr: addr.to_string(),
            reason: format!("invalid address: {}", e),
        })?;

        let mut last_err = None;
        for socket_addr in socket_addrs {
            match TcpStream::connect(&socket_addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true).map_err(|e| LoomError::Connect {
                        addr: addr.to_string(),
                        reason: format!("failed to set nodelay: {}", e),
                    })?;
                    return Ok(stream);
                }
                Err(e) => {
                    last_err = Some(e);
                }
            }
        }

        Err(LoomError::Connect {
            addr: addr.to_string(),
            reason: last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "address resolved to nothing".to_string()),
        })
    }
}

/// Writes one frame with a length prefix.
///
/// Wire format: `[4-byte length as u32 big-endian] + [data]`. The whole
/// envelope is written before returning; callers serialize concurrent writers
/// so two frames never interleave.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> Result<()> {
    if data.len() > MAX_FRAME_SIZE {
        return Err(LoomError::InvalidFrame(format!(
            "frame too large: {} bytes (max {} bytes)",
            data.len(),
            MAX_FRAME_SIZE
        )));
    }

    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;

    Ok(())
}

/// Reads one length-prefixed frame.
///
/// Returns the frame payload, or an error if the prefix announces more than
/// [`MAX_FRAME_SIZE`] bytes. EOF surfaces as an `Io` error with
/// `UnexpectedEof`, which readers treat as the peer closing the connection.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(LoomError::InvalidFrame(format!(
            "frame too large: {} bytes (max {} bytes)",
            len, MAX_FRAME_SIZE
        )));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;

    Ok(buf)
}
