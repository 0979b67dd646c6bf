use crate::http::{HttpRequest, HttpResponse};
use crate::router::HandlerResult;

/// Handle GET request to "/echo/*": the rest of the path is the body
pub async fn handle_echo(request: HttpRequest) -> HandlerResult {
    let echo_text = request.param("*").unwrap_or_default();
    Ok(HttpResponse::text(echo_text))
}

/// Handle POST request to "/echo": the request body is sent back as is
pub async fn handle_echo_body(request: HttpRequest) -> HandlerResult {
    let mut response = HttpResponse::ok().body(request.body_bytes().clone());
    if let Some(content_type) = request.header("Content-Type") {
        response = response.header("Content-Type", content_type);
    }
    Ok(response)
}
