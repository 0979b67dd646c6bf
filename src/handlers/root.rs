use crate::http::{HttpRequest, HttpResponse};
use crate::router::HandlerResult;

/// Handle GET request to "/"
pub async fn handle_root(_request: HttpRequest) -> HandlerResult {
    Ok(HttpResponse::ok())
}
