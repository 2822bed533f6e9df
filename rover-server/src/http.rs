// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

//! Just enough HTTP/1.1 to serve the control pages.
//!
//! One request per connection, the connection is closed after the response.

use std::{error, fmt, io};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum size of the request line and headers.
const MAX_HEAD_SIZE: usize = 8 * 1024;
/// Maximum size of a request body.
const MAX_BODY_SIZE: usize = 16 * 1024;

#[derive(Debug)]
pub enum HttpError {
    /// Connection failed while reading the request.
    Io(io::Error),
    /// The request could not be parsed.
    Malformed(&'static str),
    /// The request exceeds the size limits.
    TooLarge,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::Io(e) => write!(f, "io error: {}", e),
            HttpError::Malformed(reason) => write!(f, "malformed request: {}", reason),
            HttpError::TooLarge => write!(f, "request too large"),
        }
    }
}

impl error::Error for HttpError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            HttpError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for HttpError {
    fn from(value: io::Error) -> Self {
        HttpError::Io(value)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Other,
}

impl From<&str> for Method {
    fn from(value: &str) -> Self {
        match value {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            _ => Method::Other,
        }
    }
}

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    /// Read a request from the stream.
    pub async fn read<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Self, HttpError> {
        let mut head_size = 0;

        let request_line = read_line(reader, &mut head_size).await?;
        if request_line.is_empty() {
            return Err(HttpError::Malformed("empty request"));
        }

        let mut parts = request_line.split_whitespace();
        let method = parts.next().ok_or(HttpError::Malformed("missing method"))?;
        let target = parts.next().ok_or(HttpError::Malformed("missing target"))?;
        let version = parts.next().ok_or(HttpError::Malformed("missing version"))?;

        if !version.starts_with("HTTP/1.") {
            return Err(HttpError::Malformed("unsupported version"));
        }

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };

        let mut headers = Vec::new();
        loop {
            let line = read_line(reader, &mut head_size).await?;
            if line.is_empty() {
                break;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or(HttpError::Malformed("invalid header"))?;
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_owned()));
        }

        let mut request = Self {
            method: Method::from(method),
            path: path.to_owned(),
            query: query.to_owned(),
            headers,
            body: Vec::new(),
        };

        if let Some(length) = request.header("content-length") {
            let length: usize = length
                .parse()
                .map_err(|_| HttpError::Malformed("invalid content length"))?;
            if length > MAX_BODY_SIZE {
                return Err(HttpError::TooLarge);
            }

            request.body.resize(length, 0);
            reader.read_exact(&mut request.body).await?;
        }

        Ok(request)
    }

    /// Return the value of header `name`, names are case insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Query string parameters followed by url encoded form parameters.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = parse_params(&self.query);

        let is_form = self
            .header("content-type")
            .map(|value| value.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        if is_form {
            params.extend(parse_params(&String::from_utf8_lossy(&self.body)));
        }

        params
    }

    /// Return the first parameter called `name`.
    pub fn param(&self, name: &str) -> Option<String> {
        self.params()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

async fn read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    head_size: &mut usize,
) -> Result<String, HttpError> {
    let mut buf = Vec::new();
    let limit = (MAX_HEAD_SIZE - *head_size) as u64 + 1;

    let size = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    *head_size += size;
    if *head_size > MAX_HEAD_SIZE {
        return Err(HttpError::TooLarge);
    }
    if size == 0 {
        return Err(HttpError::Malformed("unexpected end of stream"));
    }

    let line = String::from_utf8(buf).map_err(|_| HttpError::Malformed("invalid utf-8"))?;

    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_owned())
}

/// Parse `application/x-www-form-urlencoded` pairs.
pub fn parse_params(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (url_decode(key), url_decode(value)),
            None => (url_decode(pair), String::new()),
        })
        .collect()
}

/// Decode percent escapes and `+` as space.
///
/// Invalid escapes are kept verbatim.
pub fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => output.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());

                match hex {
                    Some(value) => {
                        output.push(value);
                        i += 2;
                    }
                    None => output.push(b'%'),
                }
            }
            byte => output.push(byte),
        }
        i += 1;
    }

    String::from_utf8_lossy(&output).into_owned()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::MethodNotAllowed => 405,
            Status::InternalServerError => 500,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::MethodNotAllowed => "Method Not Allowed",
            Status::InternalServerError => "Internal Server Error",
        }
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: Status,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    pub fn html(status: Status, body: String) -> Self {
        Self {
            status,
            content_type: "text/html; charset=utf-8",
            body,
        }
    }

    pub fn text(status: Status, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.into(),
        }
    }

    /// Write the response, the body is omitted for `HEAD` requests.
    pub async fn write<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        include_body: bool,
    ) -> io::Result<()> {
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
            self.status.code(),
            self.status.reason(),
            self.content_type,
            self.body.len()
        );

        writer.write_all(head.as_bytes()).await?;
        if include_body {
            writer.write_all(self.body.as_bytes()).await?;
        }
        writer.flush().await
    }
}
