pub mod parser;
pub mod status;
pub mod types;

pub use parser::{parse_request, ParseLimits, ParseStatus};
pub use types::{Body, Context, HttpHeaders, HttpMethod, HttpRequest, HttpResponse};
