use etlcore::ConnectorError;
use reqwest::StatusCode;

/// Map a non-success HTTP status to the right connector error. Server-side
/// failures and rate limits are retryable; auth and client errors are not.
pub(crate) fn status_error(system: &str, status: StatusCode) -> ConnectorError {
    match status.as_u16() {
        401 | 403 => ConnectorError::Unauthorized(format!("{} returned {}", system, status)),
        429 => ConnectorError::RateLimited(format!("{} returned {}", system, status)),
        s if s >= 500 => ConnectorError::Remote {
            message: format!("{} returned {}", system, status),
            retryable: true,
        },
        _ => ConnectorError::Remote {
            message: format!("{} returned {}", system, status),
            retryable: false,
        },
    }
}

/// Map a transport-level reqwest failure
pub(crate) fn transport_error(system: &str, err: reqwest::Error) -> ConnectorError {
    ConnectorError::Connection(format!("{} request failed: {}", system, err))
}
