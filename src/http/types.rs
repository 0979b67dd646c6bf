use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use itertools::Itertools;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;

use crate::error::ParseError;
use crate::http::{parser, status};

/// HTTP request methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    /// Methods are case-sensitive on the wire.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(format!("Unknown HTTP method: {}", s)),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP headers - case-insensitive key lookup, one value per name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    headers: HashMap<String, String>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        HttpHeaders {
            headers: HashMap::new(),
        }
    }

    /// Add a header, replacing any previous value for the same name
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.headers.insert(key.into().to_lowercase(), value.into());
    }

    /// Get a header value (case-insensitive)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_lowercase()).map(|v| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.headers.contains_key(&key.to_lowercase())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.headers.remove(&key.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Get all headers as an iterator
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.headers.iter()
    }

    /// Name of a header that cannot be written to the wire, if any.
    pub fn first_invalid(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, v)| !is_valid_field(k, v))
            .map(|(k, _)| k.as_str())
    }

    /// Headers ordered by name.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// A name must be a token; a value must not contain CR, LF or NUL, which
/// would end the header line early.
fn is_valid_field(name: &str, value: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(parser::is_token)
        && !value.bytes().any(|c| matches!(c, b'\r' | b'\n' | b'\0'))
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HttpHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = HttpHeaders::new();
        for (key, value) in iter {
            headers.insert(key, value);
        }
        headers
    }
}

/// Free-form state a handler can attach to a request.
pub type Context = serde_json::Value;

/// HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: HttpMethod,
    target: String,
    path: String,
    query: HashMap<String, String>,
    http_version: String,
    headers: HttpHeaders,
    body: Bytes,
    params: HashMap<String, String>,
    context: Context,
}

impl HttpRequest {
    pub fn new(
        method: HttpMethod,
        target: String,
        http_version: String,
        headers: HttpHeaders,
        body: impl Into<Bytes>,
    ) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), parse_query(query)),
            None => (target.clone(), HashMap::new()),
        };

        HttpRequest {
            method,
            target,
            path,
            query,
            http_version,
            headers,
            body: body.into(),
            params: HashMap::new(),
            context: Context::Object(serde_json::Map::new()),
        }
    }

    /// Parse a complete raw request.
    ///
    /// Without a `Content-Length` header everything after the blank line is
    /// taken as the body.
    pub fn from_string(request: &str) -> Result<Self, ParseError> {
        parser::parse_complete(request.as_bytes())
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Path component of the request target, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request target exactly as it appeared on the request line.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn http_version(&self) -> &str {
        &self.http_version
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Body as text. Invalid UTF-8 sequences are replaced.
    pub fn body(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Decoded query-string parameters.
    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// Parameters captured by the matched route pattern.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|v| v.as_str())
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn set_context(&mut self, context: Context) {
        self.context = context;
    }

    /// Whether the connection should stay open after this exchange.
    pub fn keep_alive(&self) -> bool {
        let connection = self.headers.get("Connection").map(|v| v.to_ascii_lowercase());
        match connection.as_deref() {
            Some(value) if value.split(',').any(|t| t.trim() == "close") => false,
            Some(value) if value.split(',').any(|t| t.trim() == "keep-alive") => true,
            _ => self.http_version != "HTTP/1.0",
        }
    }
}

impl FromStr for HttpRequest {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpRequest::from_string(s)
    }
}

/// Split `a=1&b=two` into decoded pairs. A repeated key keeps its last value.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Response payload
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Bytes(Bytes),
    Json(serde_json::Value),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Text(text) => text.is_empty(),
            Body::Bytes(bytes) => bytes.is_empty(),
            Body::Json(_) => false,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            Body::Empty => Bytes::new(),
            Body::Text(text) => Bytes::from(text.clone()),
            Body::Bytes(bytes) => bytes.clone(),
            Body::Json(value) => Bytes::from(value.to_string()),
        }
    }

    /// Content-Type sent when the handler did not set one.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Body::Empty => None,
            Body::Text(_) => Some("text/plain; charset=utf-8"),
            Body::Bytes(_) => Some("application/octet-stream"),
            Body::Json(_) => Some("application/json"),
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(value)
    }
}

/// HTTP response. Absent fields fall back to status 200, no extra headers
/// and an empty body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: Option<u16>,
    pub headers: Option<HttpHeaders>,
    pub body: Option<Body>,
}

impl HttpResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok() -> Self {
        Self::with_status(200)
    }

    pub fn created() -> Self {
        Self::with_status(201)
    }

    pub fn not_found() -> Self {
        Self::with_status(404)
    }

    pub fn internal_error() -> Self {
        Self::with_status(500)
    }

    pub fn with_status(status: u16) -> Self {
        HttpResponse {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::ok().body(Body::Text(body.into()))
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self::ok().body(Body::Json(value))
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers_mut().insert(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers.as_ref().and_then(|h| h.get(key))
    }

    /// Name of a header that would break the response framing.
    pub fn invalid_header(&self) -> Option<&str> {
        self.headers.as_ref().and_then(HttpHeaders::first_invalid)
    }

    pub fn headers_mut(&mut self) -> &mut HttpHeaders {
        self.headers.get_or_insert_with(HttpHeaders::new)
    }

    pub fn has_body(&self) -> bool {
        self.body.as_ref().is_some_and(|b| !b.is_empty())
    }

    pub fn body_bytes(&self) -> Bytes {
        self.body.as_ref().map(Body::to_bytes).unwrap_or_default()
    }

    /// Body decoded as text, for logging and tests.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes()).into_owned()
    }

    /// Format the status line and headers as bytes.
    ///
    /// `content-length` and a default `content-type` are filled in here.
    pub fn serialize(&self, content_length: usize) -> Vec<u8> {
        let code = self.status_code();
        let mut result = format!("HTTP/1.1 {} {}\r\n", code, status::reason_phrase(code));

        let mut headers = self.headers.clone().unwrap_or_default();
        headers.remove("Content-Length");
        if !status::forbids_body(code) {
            headers.insert("Content-Length", content_length.to_string());
            if !headers.contains("Content-Type") {
                if let Some(content_type) = self.body.as_ref().and_then(Body::content_type) {
                    if content_length > 0 {
                        headers.insert("Content-Type", content_type);
                    }
                }
            }
        }

        // Sort headers for deterministic output
        for (key, value) in headers
            .iter()
            .filter(|(key, value)| {
                let valid = is_valid_field(key, value);
                if !valid {
                    log::warn!("Dropping response header {:?} with invalid characters", key);
                }
                valid
            })
            .sorted_by(|a, b| a.0.cmp(b.0))
        {
            result.push_str(&format!("{}: {}\r\n", key, value));
        }

        result.push_str("\r\n");
        result.into_bytes()
    }

    /// Combine headers and body into complete response
    pub fn to_bytes(&self) -> Vec<u8> {
        if status::forbids_body(self.status_code()) {
            return self.serialize(0);
        }
        let body = self.body_bytes();
        let mut response = self.serialize(body.len());
        response.extend_from_slice(&body);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn request(target: &str) -> HttpRequest {
        HttpRequest::new(
            HttpMethod::Get,
            target.to_string(),
            "HTTP/1.1".to_string(),
            HttpHeaders::new(),
            Vec::new(),
        )
    }

    #[test]
    fn test_http_method_from_str() {
        assert_eq!("GET".parse::<HttpMethod>(), Ok(HttpMethod::Get));
        assert_eq!("POST".parse::<HttpMethod>(), Ok(HttpMethod::Post));
        assert_eq!("PATCH".parse::<HttpMethod>(), Ok(HttpMethod::Patch));
        assert_eq!("OPTIONS".parse::<HttpMethod>(), Ok(HttpMethod::Options));
        assert!("get".parse::<HttpMethod>().is_err());
        assert!("INVALID".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_http_method_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_http_headers_case_insensitive() {
        let mut headers = HttpHeaders::new();
        headers.insert("Content-Type", "text/plain");

        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert!(headers.contains("Content-type"));
    }

    #[test]
    fn test_http_headers_last_value_wins() {
        let headers: HttpHeaders = [("X-Id", "1"), ("x-id", "2")].into_iter().collect();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("X-Id"), Some("2"));
    }

    #[test]
    fn test_request_splits_query() {
        let req = request("/search?q=rust+lang&page=2&empty");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.target(), "/search?q=rust+lang&page=2&empty");
        assert_eq!(req.query().get("q").map(String::as_str), Some("rust lang"));
        assert_eq!(req.query().get("page").map(String::as_str), Some("2"));
        assert_eq!(req.query().get("empty").map(String::as_str), Some(""));
    }

    #[test]
    fn test_request_query_percent_decoding() {
        let req = request("/p?name=J%C3%BCrgen%20K");
        assert_eq!(req.query().get("name").map(String::as_str), Some("Jürgen K"));
    }

    #[test]
    fn test_request_context_defaults_to_empty_object() {
        let mut req = request("/");
        assert_eq!(req.context(), &json!({}));

        req.context_mut()["user"] = json!("alice");
        assert_eq!(req.context()["user"], "alice");
    }

    #[test]
    fn test_request_json_body() {
        #[derive(serde::Deserialize)]
        struct Login {
            user: String,
        }

        let req = HttpRequest::new(
            HttpMethod::Post,
            "/login".to_string(),
            "HTTP/1.1".to_string(),
            HttpHeaders::new(),
            br#"{"user":"bob"}"#.to_vec(),
        );
        let login: Login = req.json().unwrap();
        assert_eq!(login.user, "bob");
    }

    #[test]
    fn test_keep_alive_defaults_by_version() {
        let req = request("/");
        assert!(req.keep_alive());

        let mut headers = HttpHeaders::new();
        headers.insert("Connection", "close");
        let req = HttpRequest::new(
            HttpMethod::Get,
            "/".to_string(),
            "HTTP/1.1".to_string(),
            headers,
            Vec::new(),
        );
        assert!(!req.keep_alive());

        let req = HttpRequest::new(
            HttpMethod::Get,
            "/".to_string(),
            "HTTP/1.0".to_string(),
            HttpHeaders::new(),
            Vec::new(),
        );
        assert!(!req.keep_alive());

        let mut headers = HttpHeaders::new();
        headers.insert("Connection", "Keep-Alive");
        let req = HttpRequest::new(
            HttpMethod::Get,
            "/".to_string(),
            "HTTP/1.0".to_string(),
            headers,
            Vec::new(),
        );
        assert!(req.keep_alive());
    }

    #[test]
    fn test_http_response_defaults() {
        let response = HttpResponse::new();
        assert_eq!(response.status_code(), 200);
        assert!(!response.has_body());
        assert_eq!(response.body_bytes(), "");
    }

    #[test]
    fn test_http_response_formatting() {
        let response = HttpResponse::text("Hello");
        let bytes = response.to_bytes();

        // Assert exact serialization (headers are sorted alphabetically)
        let expected = "HTTP/1.1 200 OK\r\ncontent-length: 5\r\ncontent-type: text/plain; charset=utf-8\r\n\r\nHello";

        assert_eq!(String::from_utf8_lossy(&bytes), expected);
    }

    #[test]
    fn test_http_response_keeps_explicit_content_type() {
        let response = HttpResponse::text("<p>hi</p>")
            .header("Content-Type", "text/html")
            .header("Content-Length", "999");
        let text = String::from_utf8(response.to_bytes()).unwrap();

        assert!(text.contains("content-type: text/html\r\n"));
        assert!(text.contains("content-length: 9\r\n"));
    }

    #[test]
    fn test_http_response_json_body() {
        let response = HttpResponse::json(json!({"id": 7}));
        let text = String::from_utf8(response.to_bytes()).unwrap();

        assert!(text.contains("content-type: application/json\r\n"));
        assert!(text.ends_with("\r\n\r\n{\"id\":7}"));
    }

    #[test]
    fn test_http_response_no_content_has_no_body() {
        let response = HttpResponse::with_status(204).body("ignored");
        assert_eq!(
            String::from_utf8(response.to_bytes()).unwrap(),
            "HTTP/1.1 204 No Content\r\n\r\n"
        );
    }

    #[test]
    fn test_header_with_line_break_is_not_written() {
        let response = HttpResponse::text("x").header("Location", "/a\r\nSet-Cookie: evil=1");
        assert_eq!(response.invalid_header(), Some("location"));

        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(!text.contains("Set-Cookie"));
        assert!(!text.contains("location"));
        assert_eq!(
            text,
            "HTTP/1.1 200 OK\r\ncontent-length: 1\r\ncontent-type: text/plain; charset=utf-8\r\n\r\nx"
        );
    }

    #[test]
    fn test_header_name_must_be_a_token() {
        let response = HttpResponse::ok().header("Bad Name", "v");
        assert_eq!(response.invalid_header(), Some("bad name"));
        assert_eq!(HttpResponse::ok().header("X-Ok", "v").invalid_header(), None);
        assert_eq!(HttpResponse::ok().invalid_header(), None);
    }
}
