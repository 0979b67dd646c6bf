use std::io::{Result as IoResult, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::http::{status, Body, HttpHeaders, HttpResponse};

/// Compress data using gzip
pub fn gzip_encode(data: &[u8]) -> IoResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut encoder = GzEncoder::new(&mut buffer, Compression::default());
    encoder.write_all(data)?;
    encoder.finish()?;
    Ok(buffer)
}

/// Whether the request's `Accept-Encoding` allows gzip.
///
/// `q=0` is a refusal. An explicit `gzip` entry takes priority over `*`.
pub fn accepts_gzip(headers: &HttpHeaders) -> bool {
    let Some(accept_encoding) = headers.get("Accept-Encoding") else {
        return false;
    };

    let mut wildcard = None;
    for entry in accept_encoding.split(',') {
        let mut params = entry.split(';').map(str::trim);
        let coding = params.next().unwrap_or_default();
        let refused = params.any(|p| {
            p.strip_prefix("q=")
                .and_then(|q| q.parse::<f32>().ok())
                .is_some_and(|q| q == 0.0)
        });

        if coding.eq_ignore_ascii_case("gzip") {
            return !refused;
        }
        if coding == "*" {
            wildcard = Some(!refused);
        }
    }
    wildcard.unwrap_or(false)
}

/// Gzip the response body in place unless it is empty or already encoded.
pub fn compress_response(response: &mut HttpResponse) {
    if !response.has_body()
        || status::forbids_body(response.status_code())
        || response.header_value("Content-Encoding").is_some()
    {
        return;
    }

    let body = response.body.take().unwrap_or_default();
    let content_type = body.content_type();
    match gzip_encode(&body.to_bytes()) {
        Ok(compressed) => {
            let headers = response.headers_mut();
            if let Some(content_type) = content_type {
                if !headers.contains("Content-Type") {
                    headers.insert("Content-Type", content_type);
                }
            }
            headers.insert("Content-Encoding", "gzip");
            headers.insert("Vary", "Accept-Encoding");
            response.body = Some(Body::from(compressed));
        }
        Err(e) => {
            log::warn!("gzip compression failed, sending identity body: {}", e);
            response.body = Some(body);
        }
    }
}
