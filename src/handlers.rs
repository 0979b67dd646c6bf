//! Built-in routes served by the `aou` binary.

use crate::error::RouteError;
use crate::server::Server;

pub mod echo;
pub mod root;
pub mod user_agent;

pub use echo::{handle_echo, handle_echo_body};
pub use root::handle_root;
pub use user_agent::handle_user_agent;

/// Register the demo routes on `server`.
pub fn register(server: &mut Server) -> Result<(), RouteError> {
    server.get("/", handle_root)?;
    server.get("/echo/*", handle_echo)?;
    server.post("/echo", handle_echo_body)?;
    server.get("/user-agent", handle_user_agent)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpHeaders, HttpMethod, HttpRequest};

    fn request(method: HttpMethod, target: &str) -> HttpRequest {
        HttpRequest::new(
            method,
            target.to_string(),
            "HTTP/1.1".to_string(),
            HttpHeaders::new(),
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn test_register_routes() {
        let mut server = Server::default();
        register(&mut server).unwrap();
        let router = server.router();

        assert_eq!(router.len(), 4);
        assert_eq!(router.dispatch(request(HttpMethod::Get, "/")).await.status_code(), 200);
        assert_eq!(
            router.dispatch(request(HttpMethod::Get, "/unknown")).await.status_code(),
            404
        );
        assert_eq!(
            router.dispatch(request(HttpMethod::Get, "/echo/hi")).await.body_text(),
            "hi"
        );
    }
}
