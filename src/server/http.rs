//! Minimal HTTP/1.1 request handling
//!
//! The server speaks exactly enough HTTP to accept `GET /` and
//! `GET /stream` and reply with a multipart stream. Requests are read up
//! to a bounded size; anything malformed tears the connection down.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Error while reading a client request
#[derive(Debug)]
pub enum HttpError {
    /// Socket error
    Io(std::io::Error),
    /// Peer closed before finishing the request
    ConnectionClosed,
    /// Request exceeded the configured size bound
    TooLarge,
    /// Request line or headers did not parse
    Malformed,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::Io(e) => write!(f, "I/O error: {}", e),
            HttpError::ConnectionClosed => write!(f, "connection closed mid-request"),
            HttpError::TooLarge => write!(f, "request too large"),
            HttpError::Malformed => write!(f, "malformed request"),
        }
    }
}

impl std::error::Error for HttpError {}

impl From<std::io::Error> for HttpError {
    fn from(e: std::io::Error) -> Self {
        HttpError::Io(e)
    }
}

/// A parsed request line plus headers
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub path: String,
    headers: Vec<(String, String)>,
}

impl Request {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Read one request (request line + headers) from `reader`.
///
/// Stops at the blank line; request bodies are not supported and not
/// expected for the GET-only surface.
pub async fn read_request<R>(reader: &mut R, max_size: usize) -> Result<Request, HttpError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(512);
    let mut chunk = [0u8; 512];

    let header_end = loop {
        if let Some(pos) = find_terminator(&buf) {
            break pos;
        }
        if buf.len() >= max_size {
            return Err(HttpError::TooLarge);
        }
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(HttpError::ConnectionClosed);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = std::str::from_utf8(&buf[..header_end]).map_err(|_| HttpError::Malformed)?;
    parse_head(head)
}

/// Position of the `\r\n\r\n` header terminator, if present.
fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_head(head: &str) -> Result<Request, HttpError> {
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or(HttpError::Malformed)?;

    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or(HttpError::Malformed)?.to_string();
    let path = parts.next().ok_or(HttpError::Malformed)?.to_string();
    let version = parts.next().ok_or(HttpError::Malformed)?;
    if !version.starts_with("HTTP/") {
        return Err(HttpError::Malformed);
    }

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or(HttpError::Malformed)?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(Request {
        method,
        path,
        headers,
    })
}

/// 404 response for unknown paths
pub const NOT_FOUND: &[u8] =
    b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// 405 response for anything but GET
pub const METHOD_NOT_ALLOWED: &[u8] =
    b"HTTP/1.1 405 Method Not Allowed\r\nAllow: GET\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
