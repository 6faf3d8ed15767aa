//! Mapping of transport and HTTP failures into [`ProviderError`].

use reqwest::StatusCode;
use synapse_types::ProviderError;

/// Cap on how much of an error response body ends up in an error message.
const MAX_ERROR_BODY: usize = 4 * 1024;

/// Map a transport-level `reqwest` error.
pub(crate) fn map_reqwest_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(Box::new(error))
    }
}

/// Map a non-success HTTP status plus (truncated) response body.
pub(crate) fn map_http_status(status: StatusCode, body: &str) -> ProviderError {
    let body = truncate_body(body);
    match status {
        StatusCode::NOT_FOUND => ProviderError::ModelNotFound(body),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimit,
        StatusCode::BAD_REQUEST => ProviderError::InvalidRequest(body),
        s if s.is_server_error() => ProviderError::ServiceUnavailable(body),
        s => ProviderError::InvalidRequest(format!("unexpected status {s}: {body}")),
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        body.to_owned()
    } else {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}
