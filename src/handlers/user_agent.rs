use crate::http::{HttpRequest, HttpResponse};
use crate::router::HandlerResult;

/// Handle GET request to "/user-agent"
pub async fn handle_user_agent(request: HttpRequest) -> HandlerResult {
    let user_agent = request.header("User-Agent").unwrap_or("Unknown");
    Ok(HttpResponse::text(user_agent))
}
