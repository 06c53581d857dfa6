use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::ProxyError;
use crate::http::request::{Header, Method, Request, Target};

/// Longest request or header line accepted, terminator included.
pub const MAX_LINE: usize = 8192;

/// Most header lines accepted in one request.
pub const MAX_HEADERS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("unsupported method")]
    InvalidMethod,
    #[error("URI has no scheme separator")]
    MissingScheme,
    #[error("URI has no path")]
    MissingPath,
    #[error("URI has an empty host")]
    EmptyHost,
    #[error("URI has an invalid port")]
    InvalidPort,
    #[error("header line has no \": \" separator")]
    InvalidHeader,
    #[error("line longer than {} bytes", MAX_LINE)]
    LineTooLong,
    #[error("more than {} headers", MAX_HEADERS)]
    TooManyHeaders,
    #[error("request is not valid UTF-8")]
    InvalidEncoding,
    #[error("connection closed before the header block ended")]
    UnexpectedEof,
}

/// Reads one request (request line plus header block) from `reader`.
///
/// Returns `Ok(None)` when the peer closes the connection before sending
/// anything. The whole header block is consumed before any of it is
/// validated, and nothing past the blank line that ends it is read.
pub async fn read_request<R>(reader: &mut R) -> Result<Option<Request>, ProxyError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::with_capacity(256);

    let request_line = match read_line(reader, &mut buf).await? {
        Some(line) => line,
        None => return Ok(None),
    };

    let mut header_lines = Vec::new();
    loop {
        let line = read_line(reader, &mut buf)
            .await?
            .ok_or(ParseError::UnexpectedEof)?;

        if line.is_empty() {
            break;
        }
        if header_lines.len() == MAX_HEADERS {
            return Err(ParseError::TooManyHeaders.into());
        }
        header_lines.push(line);
    }

    let (method, target, version) = parse_request_line(&request_line)?;
    let headers = header_lines
        .iter()
        .map(|line| parse_header(line))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Request {
        method,
        target,
        version,
        headers,
    }))
}

/// Reads a single line without its terminator. `None` means EOF.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<Option<String>, ProxyError>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();

    // One byte over the limit tells an overlong line apart from one that
    // fills the limit exactly.
    let n = (&mut *reader)
        .take(MAX_LINE as u64 + 1)
        .read_until(b'\n', buf)
        .await
        .map_err(ProxyError::ClientIo)?;

    if n == 0 {
        return Ok(None);
    }
    if buf.len() > MAX_LINE {
        return Err(ParseError::LineTooLong.into());
    }
    if buf.last() != Some(&b'\n') {
        return Err(ParseError::UnexpectedEof.into());
    }

    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }

    let line = std::str::from_utf8(buf).map_err(|_| ParseError::InvalidEncoding)?;
    Ok(Some(line.to_string()))
}

/// Splits `METHOD absolute-URI VERSION` into its parts.
pub fn parse_request_line(line: &str) -> Result<(Method, Target, String), ParseError> {
    let mut parts = line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let uri = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if parts.next().is_some() {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;
    let target = parse_uri(uri)?;

    Ok((method, target, version.to_string()))
}

/// Decomposes an absolute-URI into host, port and path.
///
/// The authority runs from after `://` to the next `/`. A `:` inside the
/// authority introduces the port, which otherwise defaults to "80".
pub fn parse_uri(uri: &str) -> Result<Target, ParseError> {
    let (_scheme, rest) = uri.split_once("://").ok_or(ParseError::MissingScheme)?;
    let slash = rest.find('/').ok_or(ParseError::MissingPath)?;
    let (authority, path) = rest.split_at(slash);

    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => {
            if port.is_empty() || port.parse::<u16>().is_err() {
                return Err(ParseError::InvalidPort);
            }
            (host, port)
        }
        None => (authority, "80"),
    };

    if host.is_empty() {
        return Err(ParseError::EmptyHost);
    }

    Ok(Target {
        host: host.to_string(),
        port: port.to_string(),
        path: path.to_string(),
    })
}

/// Splits a `Key: Value` line at the first `": "`.
pub fn parse_header(line: &str) -> Result<Header, ParseError> {
    let (key, value) = line.split_once(": ").ok_or(ParseError::InvalidHeader)?;
    Ok(Header::new(key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parse_simple_get() {
        let mut req: &[u8] = b"GET http://example.com/ HTTP/1.0\r\nAccept: */*\r\n\r\n";

        let parsed = read_request(&mut req).await.unwrap().unwrap();

        assert_eq!(parsed.target.path, "/");
        assert_eq!(parsed.header("Accept"), Some("*/*"));
        assert!(req.is_empty());
    }

    #[test]
    fn colon_in_path_is_not_a_port() {
        let target = parse_uri("http://example.com/a:b").unwrap();

        assert_eq!(target.host, "example.com");
        assert_eq!(target.port, "80");
        assert_eq!(target.path, "/a:b");
    }
}
