//! MJPEG multipart framing
//!
//! The stream is a single never-ending HTTP response of content type
//! `multipart/x-mixed-replace` with boundary `frame`. Each part carries
//! one complete JPEG image:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: <len>\r\n
//! \r\n
//! <len JPEG bytes>\r\n
//! ```
//!
//! Browsers render this natively from `<img src="/stream">`.

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Multipart boundary token
pub const BOUNDARY: &str = "frame";

/// Fixed response preamble sent once per client session
pub const RESPONSE_PREAMBLE: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\
\r\n";

/// Part header for a frame of `len` bytes
pub fn part_header(len: usize) -> Vec<u8> {
    format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY, len
    )
    .into_bytes()
}

/// Write one complete multipart part: header, payload, trailing separator.
pub async fn write_part<W>(writer: &mut W, data: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&part_header(data.len())).await?;
    writer.write_all(data).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await
}
