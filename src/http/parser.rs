//! Incremental HTTP/1.x request parser.
//!
//! The connection loop keeps appending socket reads to one buffer and calls
//! [`parse_request`] until it reports a complete request, so every combinator
//! here is a `nom` *streaming* parser: running out of input yields
//! `Incomplete` instead of an error.

use nom::bytes::streaming::{tag, take_till, take_while1};
use nom::character::streaming::{char, digit1, line_ending};
use nom::combinator::recognize;
use nom::sequence::tuple;
use nom::IResult;

use crate::error::ParseError;
use crate::http::types::{HttpHeaders, HttpMethod, HttpRequest};

/// Size limits applied while reading a request off a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    pub max_head_bytes: usize,
    pub max_body_bytes: usize,
}

impl ParseLimits {
    pub const fn unbounded() -> Self {
        ParseLimits {
            max_head_bytes: usize::MAX,
            max_body_bytes: usize::MAX,
        }
    }
}

impl Default for ParseLimits {
    fn default() -> Self {
        ParseLimits {
            max_head_bytes: 16 * 1024,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Outcome of feeding the current buffer to the parser.
#[derive(Debug)]
pub enum ParseStatus {
    /// A full request was read; `consumed` bytes belong to it.
    Complete {
        request: HttpRequest,
        consumed: usize,
    },
    /// More bytes are needed.
    Incomplete,
}

struct RequestHead {
    method: HttpMethod,
    target: String,
    http_version: String,
    headers: HttpHeaders,
}

/// Parse one request from the front of `buf`.
///
/// The body is exactly `Content-Length` bytes (zero when absent); anything
/// after it is left for the next request on the connection.
pub fn parse_request(buf: &[u8], limits: &ParseLimits) -> Result<ParseStatus, ParseError> {
    let Some((head, head_len)) = parse_head(buf, limits)? else {
        return Ok(ParseStatus::Incomplete);
    };

    let content_length = content_length(&head.headers)?.unwrap_or(0);
    if content_length > limits.max_body_bytes {
        return Err(ParseError::BodyTooLarge {
            length: content_length,
            limit: limits.max_body_bytes,
        });
    }

    let rest = &buf[head_len..];
    if rest.len() < content_length {
        return Ok(ParseStatus::Incomplete);
    }

    let request = head.into_request(rest[..content_length].to_vec());
    Ok(ParseStatus::Complete {
        request,
        consumed: head_len + content_length,
    })
}

/// Parse a request that is expected to be entirely contained in `buf`.
pub(crate) fn parse_complete(buf: &[u8]) -> Result<HttpRequest, ParseError> {
    let limits = ParseLimits::unbounded();
    let (head, head_len) = parse_head(buf, &limits)?.ok_or(ParseError::Incomplete)?;
    let rest = &buf[head_len..];

    let body = match content_length(&head.headers)? {
        Some(length) if length > rest.len() => return Err(ParseError::Incomplete),
        Some(length) => &rest[..length],
        None => rest,
    };

    Ok(head.into_request(body.to_vec()))
}

fn parse_head(
    buf: &[u8],
    limits: &ParseLimits,
) -> Result<Option<(RequestHead, usize)>, ParseError> {
    let too_large = || ParseError::HeadTooLarge {
        limit: limits.max_head_bytes,
    };

    let (rest, (method, target, version)) = match request_line(buf) {
        Ok(parsed) => parsed,
        Err(nom::Err::Incomplete(_)) if buf.len() > limits.max_head_bytes => {
            return Err(too_large())
        }
        Err(nom::Err::Incomplete(_)) => return Ok(None),
        Err(_) => return Err(ParseError::MalformedRequestLine),
    };

    let method = as_text(method)
        .parse::<HttpMethod>()
        .map_err(|_| ParseError::UnknownMethod(as_text(method)))?;
    let http_version = as_text(version);
    if http_version != "HTTP/1.1" && http_version != "HTTP/1.0" {
        return Err(ParseError::UnsupportedVersion(http_version));
    }

    let (rest, fields) = match header_block(rest) {
        Ok(parsed) => parsed,
        Err(nom::Err::Incomplete(_)) if buf.len() > limits.max_head_bytes => {
            return Err(too_large())
        }
        Err(nom::Err::Incomplete(_)) => return Ok(None),
        Err(_) => return Err(ParseError::MalformedHeader),
    };

    let head_len = buf.len() - rest.len();
    if head_len > limits.max_head_bytes {
        return Err(too_large());
    }

    // Repeated Content-Length headers must agree; otherwise the body length
    // is ambiguous.
    let mut lengths = fields
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case(b"content-length"))
        .map(|(_, value)| *value);
    if let Some(first) = lengths.next() {
        if let Some(other) = lengths.find(|value| *value != first) {
            return Err(ParseError::InvalidContentLength(format!(
                "{}, {}",
                as_text(first),
                as_text(other)
            )));
        }
    }

    let headers = fields
        .into_iter()
        .map(|(name, value)| (as_text(name), as_text(value)))
        .collect::<HttpHeaders>();

    if let Some(encoding) = headers.get("Transfer-Encoding") {
        if !encoding.trim().eq_ignore_ascii_case("identity") {
            return Err(ParseError::UnsupportedTransferEncoding(encoding.to_string()));
        }
    }

    let head = RequestHead {
        method,
        target: as_text(target),
        http_version,
        headers,
    };
    Ok(Some((head, head_len)))
}

impl RequestHead {
    fn into_request(self, body: Vec<u8>) -> HttpRequest {
        HttpRequest::new(
            self.method,
            self.target,
            self.http_version,
            self.headers,
            body,
        )
    }
}

/// Get the Content-Length from headers, `None` if not present
fn content_length(headers: &HttpHeaders) -> Result<Option<usize>, ParseError> {
    match headers.get("Content-Length") {
        Some(value) => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ParseError::InvalidContentLength(value.to_string())),
        None => Ok(None),
    }
}

/// `METHOD SP target SP HTTP/x.y CRLF`
fn request_line(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8], &[u8])> {
    let (input, method) = take_while1(is_token)(input)?;
    let (input, _) = char(' ')(input)?;
    let (input, target) = take_while1(|c: u8| c.is_ascii_graphic())(input)?;
    let (input, _) = char(' ')(input)?;
    let (input, version) = recognize(tuple((tag("HTTP/"), digit1, char('.'), digit1)))(input)?;
    let (input, _) = line_ending(input)?;
    Ok((input, (method, target, version)))
}

/// `name ":" OWS value OWS CRLF`
fn header_line(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    let (input, name) = take_while1(is_token)(input)?;
    let (input, _) = char(':')(input)?;
    let (input, value) = take_till(|c| c == b'\r' || c == b'\n')(input)?;
    let (input, _) = line_ending(input)?;
    Ok((input, (name, value.trim_ascii())))
}

/// Header lines up to and including the blank line that ends the head.
fn header_block(mut input: &[u8]) -> IResult<&[u8], Vec<(&[u8], &[u8])>> {
    let mut fields = Vec::new();
    loop {
        match line_ending::<&[u8], nom::error::Error<&[u8]>>(input) {
            Ok((rest, _)) => return Ok((rest, fields)),
            Err(nom::Err::Incomplete(needed)) => return Err(nom::Err::Incomplete(needed)),
            Err(_) => {}
        }
        let (rest, field) = header_line(input)?;
        fields.push(field);
        input = rest;
    }
}

pub(super) fn is_token(c: u8) -> bool {
    c.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&c)
}

fn as_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
