use std::collections::HashMap;
use std::io::{Read, Write};

use serde_json::json;

use crate::error::{GuestCounterError, Result};

const MAX_HEAD_BYTES: usize = 16 * 1024;

#[derive(Debug)]
pub(crate) struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Read one request: the head up to the blank line, then a body of exactly
/// `Content-Length` bytes. Bodies over `max_body` are refused before reading.
pub(crate) fn read_request<S: Read + Write>(stream: &mut S, max_body: usize) -> Result<HttpRequest> {
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    let head_end = loop {
        if let Some(pos) = find_head_end(&data) {
            break pos;
        }
        if data.len() > MAX_HEAD_BYTES {
            return Err(GuestCounterError::BadRequest("request head too large".into()));
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(GuestCounterError::BadRequest("connection closed mid-request".into()));
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines
        .next()
        .ok_or_else(|| GuestCounterError::BadRequest("empty request".into()))?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| GuestCounterError::BadRequest("missing method".into()))?;
    let raw_path = parts
        .next()
        .ok_or_else(|| GuestCounterError::BadRequest("missing path".into()))?;
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();

    let content_length = match headers.get("content-length") {
        Some(value) => value
            .parse::<usize>()
            .map_err(|_| GuestCounterError::BadRequest("invalid content-length".into()))?,
        None => 0,
    };
    if content_length > max_body {
        return Err(GuestCounterError::PayloadTooLarge(content_length));
    }

    let mut body = data[head_end + 4..].to_vec();
    if body.len() < content_length
        && headers
            .get("expect")
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"))
    {
        stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n")?;
    }
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(GuestCounterError::BadRequest("request body truncated".into()));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    Ok(HttpRequest {
        method: method.to_string(),
        path,
        headers,
        body,
    })
}

fn find_head_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

#[derive(Debug)]
pub(crate) struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub extra_headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            extra_headers: Vec::new(),
            body,
        }
    }

    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self::new(status, "application/json", value.to_string().into_bytes())
    }

    pub fn error(err: &GuestCounterError) -> Self {
        Self::json(err.status_code(), json!({ "error": err.to_string() }))
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.extra_headers.push((name, value.into()));
        self
    }

    pub fn write_to<W: Write>(&self, stream: &mut W) -> std::io::Result<()> {
        let mut header = format!(
            "{}\r\nContent-Type: {}\r\nContent-Length: {}\r\nCache-Control: no-store\r\nConnection: close\r\n",
            status_line(self.status),
            self.content_type,
            self.body.len()
        );
        for (name, value) in &self.extra_headers {
            header.push_str(&format!("{name}: {value}\r\n"));
        }
        header.push_str("\r\n");
        stream.write_all(header.as_bytes())?;
        stream.write_all(&self.body)?;
        stream.flush()
    }
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        413 => "HTTP/1.1 413 Payload Too Large",
        _ => "HTTP/1.1 500 Internal Server Error",
    }
}
