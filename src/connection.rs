//! Per-connection request loop.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::{Buf, BytesMut};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::compression;
use crate::config::ServerConfig;
use crate::http::{parse_request, status, HttpMethod, HttpResponse, ParseStatus};
use crate::router::Router;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Shared state every connection task needs.
pub(crate) struct ConnectionContext {
    pub router: Arc<Router>,
    pub config: Arc<ServerConfig>,
    pub shutdown: watch::Receiver<bool>,
}

/// Serve requests on `stream` until the client closes, asks to close, stays
/// idle past the keep-alive timeout or the server shuts down.
pub(crate) async fn serve(
    mut stream: TcpStream,
    peer: SocketAddr,
    id: u64,
    mut ctx: ConnectionContext,
) -> Result<()> {
    let limits = ctx.config.parse_limits();
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
    let mut served = 0u64;

    loop {
        match parse_request(&buf, &limits) {
            Ok(ParseStatus::Complete { request, consumed }) => {
                buf.advance(consumed);
                served += 1;

                let method = request.method();
                let target = request.target().to_string();
                let mut keep_alive = request.keep_alive() && !*ctx.shutdown.borrow();
                let gzip = ctx.config.compression && compression::accepts_gzip(request.headers());

                let mut response = ctx.router.dispatch(request).await;
                keep_alive &= !asks_to_close(&response);
                log::debug!(
                    "[conn {}] {} {} -> {}",
                    id,
                    method,
                    target,
                    response.status_code()
                );

                if gzip {
                    compression::compress_response(&mut response);
                }
                let bytes = render(response, &ctx.config, method, keep_alive);
                stream
                    .write_all(&bytes)
                    .await
                    .context("Failed to write response")?;

                if !keep_alive {
                    break;
                }
                continue;
            }
            Ok(ParseStatus::Incomplete) => {}
            Err(e) => {
                log::debug!("[conn {}] rejecting request from {}: {}", id, peer, e);
                let response = HttpResponse::with_status(e.status());
                let bytes = render(response, &ctx.config, HttpMethod::Get, false);
                stream
                    .write_all(&bytes)
                    .await
                    .context("Failed to write error response")?;
                break;
            }
        }

        let read = if buf.is_empty() {
            // Between requests: shutdown closes the connection right away.
            tokio::select! {
                biased;
                _ = ctx.shutdown.changed() => break,
                read = timeout(ctx.config.keep_alive_timeout, stream.read_buf(&mut buf)) => read,
            }
        } else {
            timeout(ctx.config.keep_alive_timeout, stream.read_buf(&mut buf)).await
        };

        match read {
            Ok(Ok(0)) => {
                if !buf.is_empty() {
                    log::debug!("[conn {}] closed mid-request ({} bytes buffered)", id, buf.len());
                }
                break;
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e).context("Failed to read request"),
            Err(_) => {
                log::debug!("[conn {}] idle timeout", id);
                break;
            }
        }
    }

    log::debug!("[conn {}] closed after {} request(s)", id, served);
    let _ = stream.shutdown().await;
    Ok(())
}

/// Whether the handler set `Connection: close` on its response.
fn asks_to_close(response: &HttpResponse) -> bool {
    response.header_value("Connection").is_some_and(|value| {
        value
            .split(',')
            .any(|option| option.trim().eq_ignore_ascii_case("close"))
    })
}

/// Apply server options to a handler response and serialize it.
pub(crate) fn render(
    mut response: HttpResponse,
    config: &ServerConfig,
    method: HttpMethod,
    keep_alive: bool,
) -> Vec<u8> {
    let code = response.status_code();
    if config.json && code >= 400 && !response.has_body() {
        response = response.body(json!({
            "error": status::reason_phrase(code),
            "status": code,
        }));
    }

    if !keep_alive {
        response.headers_mut().insert("Connection", "close");
    }

    if method == HttpMethod::Head {
        let length = response.body_bytes().len();
        return response.serialize(length);
    }
    response.to_bytes()
}
