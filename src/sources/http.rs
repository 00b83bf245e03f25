//! Minimal blocking HTTP GET used by the upstream lookup sources.
//!
//! Every call is time-bounded: connect, read, and write all share the
//! caller's timeout so a slow upstream cannot stall the refresh loop.

use crate::sources::SourceError;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

pub struct ParsedUrl {
    pub host: String,
    pub port: u16,
    pub path: String,
}

pub fn parse_http_url(endpoint: &str) -> Result<ParsedUrl, SourceError> {
    let trimmed = endpoint
        .strip_prefix("http://")
        .ok_or_else(|| SourceError::InvalidUrl("only http:// supported".to_string()))?;

    let mut parts = trimmed.splitn(2, '/');
    let host_port = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SourceError::InvalidUrl("missing host".to_string()))?;
    let path = match parts.next() {
        Some(path) if !path.is_empty() => format!("/{path}"),
        _ => "/".to_string(),
    };

    let mut host_parts = host_port.splitn(2, ':');
    let host = host_parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SourceError::InvalidUrl("missing host".to_string()))?;
    let port = match host_parts.next() {
        Some(port_str) if !port_str.is_empty() => port_str
            .parse::<u16>()
            .map_err(|_| SourceError::InvalidUrl("invalid port".to_string()))?,
        _ => 80,
    };

    Ok(ParsedUrl {
        host: host.to_string(),
        port,
        path,
    })
}

fn classify_io(err: std::io::Error, what: &str) -> SourceError {
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => {
            SourceError::Timeout(format!("{what}: {err}"))
        }
        _ => SourceError::Unavailable(format!("{what}: {err}")),
    }
}

/// Issue a GET against `endpoint` (path and query included) and return the
/// response body, failing on any non-2xx/3xx status.
pub fn send_http_get(endpoint: &str, timeout: Duration) -> Result<String, SourceError> {
    let parsed = parse_http_url(endpoint)?;
    let addr = (parsed.host.as_str(), parsed.port)
        .to_socket_addrs()
        .map_err(|err| SourceError::Unavailable(format!("dns: {err}")))?
        .next()
        .ok_or_else(|| SourceError::Unavailable("no addresses resolved".to_string()))?;

    let mut stream =
        TcpStream::connect_timeout(&addr, timeout).map_err(|err| classify_io(err, "connect"))?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|err| classify_io(err, "io"))?;
    stream
        .set_write_timeout(Some(timeout))
        .map_err(|err| classify_io(err, "io"))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nAccept: application/json\r\nConnection: close\r\n\r\n",
        parsed.path, parsed.host,
    );

    stream
        .write_all(request.as_bytes())
        .map_err(|err| classify_io(err, "write"))?;

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .map_err(|err| classify_io(err, "read"))?;

    let (headers, body) = response
        .split_once("\r\n\r\n")
        .ok_or_else(|| SourceError::InvalidPayload("invalid http response".to_string()))?;

    let status_line = headers
        .lines()
        .next()
        .ok_or_else(|| SourceError::InvalidPayload("missing status line".to_string()))?;
    let status_code = status_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| SourceError::InvalidPayload("missing status code".to_string()))?
        .parse::<u16>()
        .map_err(|_| SourceError::InvalidPayload("invalid status code".to_string()))?;

    if status_code >= 400 {
        return Err(SourceError::Unavailable(format!(
            "http status {status_code} ({})",
            body.trim()
        )));
    }

    Ok(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port_and_path() -> Result<(), SourceError> {
        let parsed = parse_http_url("http://lots.example:9000/api/search?lat=1")?;
        assert_eq!(parsed.host, "lots.example");
        assert_eq!(parsed.port, 9000);
        assert_eq!(parsed.path, "/api/search?lat=1");
        Ok(())
    }

    #[test]
    fn defaults_port_and_path() -> Result<(), SourceError> {
        let parsed = parse_http_url("http://lots.example")?;
        assert_eq!(parsed.port, 80);
        assert_eq!(parsed.path, "/");
        Ok(())
    }

    #[test]
    fn rejects_https_and_empty_host() {
        assert!(matches!(
            parse_http_url("https://lots.example"),
            Err(SourceError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_http_url("http://"),
            Err(SourceError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_http_url("http://host:notaport/x"),
            Err(SourceError::InvalidUrl(_))
        ));
    }
}
