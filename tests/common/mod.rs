// Integration test utilities
#![allow(dead_code)]

use std::time::Duration;

use aou::{handlers, Instance, Server, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Timeout for socket read/write operations.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

/// A parsed HTTP response as seen by the client.
#[derive(Debug)]
pub struct ClientResponse {
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ClientResponse {
    pub fn status(&self) -> u16 {
        self.status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .expect("Invalid status line")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Test server that wraps a real Instance for integration testing.
pub struct TestServer {
    instance: Instance,
}

impl TestServer {
    /// Start the built-in routes on a dynamic port
    pub async fn start(config: ServerConfig) -> Self {
        let mut server = Server::new(config);
        handlers::register(&mut server).expect("Failed to register routes");
        Self::start_with(server).await
    }

    /// Start an already configured server on a dynamic port
    pub async fn start_with(server: Server) -> Self {
        let instance = server
            .listen("127.0.0.1", 0)
            .await
            .expect("Failed to start test server");
        TestServer { instance }
    }

    pub fn port(&self) -> u16 {
        self.instance.port()
    }

    pub fn addr(&self) -> String {
        self.instance.addr().to_string()
    }

    pub fn into_instance(self) -> Instance {
        self.instance
    }

    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.instance.addr())
            .await
            .expect("Failed to connect to test server")
    }

    /// Send one raw request on a fresh connection and read one response.
    pub async fn send_request(&self, request: &str) -> ClientResponse {
        self.send_requests(&[request])
            .await
            .pop()
            .expect("No response")
    }

    /// Send multiple requests over a single persistent connection, reading
    /// each response before sending the next request.
    pub async fn send_requests(&self, requests: &[&str]) -> Vec<ClientResponse> {
        let mut reader = BufReader::new(self.connect().await);
        let mut responses = Vec::with_capacity(requests.len());

        for request in requests {
            reader
                .get_mut()
                .write_all(request.as_bytes())
                .await
                .expect("Failed to write request");
            responses.push(read_response(&mut reader).await);
        }

        responses
    }

    /// Send raw bytes and read until the server closes the connection.
    pub async fn send_request_bytes(&self, request: &[u8]) -> Vec<u8> {
        let mut stream = self.connect().await;
        stream
            .write_all(request)
            .await
            .expect("Failed to write request");

        let mut response = Vec::new();
        timeout(SOCKET_TIMEOUT, stream.read_to_end(&mut response))
            .await
            .expect("Timed out waiting for the server to close")
            .expect("Failed to read response");
        response
    }
}

/// Read a single HTTP response by parsing headers for Content-Length
pub async fn read_response<R>(reader: &mut R) -> ClientResponse
where
    R: AsyncBufReadExt + Unpin,
{
    timeout(SOCKET_TIMEOUT, read_response_inner(reader))
        .await
        .expect("Timed out reading response")
}

async fn read_response_inner<R>(reader: &mut R) -> ClientResponse
where
    R: AsyncBufReadExt + Unpin,
{
    // Read status line (e.g., "HTTP/1.1 200 OK\r\n")
    let mut status_line = String::new();
    reader
        .read_line(&mut status_line)
        .await
        .expect("Failed to read status line");

    // Read headers until empty line
    let mut headers = Vec::new();
    let mut content_length: usize = 0;
    loop {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .await
            .expect("Failed to read header line");
        if line == "\r\n" || line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':').expect("Malformed header");
        let (name, value) = (name.trim().to_string(), value.trim().to_string());
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse().expect("Invalid Content-Length");
        }
        headers.push((name, value));
    }

    // Read body based on Content-Length
    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await.expect("Failed to read body");
    }

    ClientResponse {
        status_line: status_line.trim_end().to_string(),
        headers,
        body,
    }
}
