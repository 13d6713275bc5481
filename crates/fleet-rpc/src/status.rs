//! Maps [`ErrorCode`] to and from HTTP status, the boundary every handler
//! and client call crosses.

use axum::http::StatusCode;
use fleet_error::ErrorCode;

/// The HTTP status a server handler returns for `code`.
#[must_use]
pub fn status_for_code(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::InvalidArgument | ErrorCode::ParseFailed | ErrorCode::UnknownType => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthenticated | ErrorCode::MissingSecret => StatusCode::UNAUTHORIZED,
        ErrorCode::AccessDenied => StatusCode::FORBIDDEN,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Cancelled => StatusCode::REQUEST_TIMEOUT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The [`ErrorCode`] a client call reconstructs from a response status.
#[must_use]
pub fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::BAD_REQUEST => ErrorCode::InvalidArgument,
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthenticated,
        StatusCode::FORBIDDEN => ErrorCode::AccessDenied,
        StatusCode::CONFLICT => ErrorCode::Conflict,
        StatusCode::REQUEST_TIMEOUT => ErrorCode::Cancelled,
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => ErrorCode::Unavailable,
        _ => ErrorCode::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_status_for_retryable_codes() {
        assert_eq!(code_for_status(status_for_code(ErrorCode::Unavailable)), ErrorCode::Unavailable);
        assert_eq!(code_for_status(status_for_code(ErrorCode::NotFound)), ErrorCode::NotFound);
    }

    #[test]
    fn server_errors_map_to_unavailable() {
        assert_eq!(code_for_status(StatusCode::BAD_GATEWAY), ErrorCode::Unavailable);
        assert_eq!(code_for_status(StatusCode::TOO_MANY_REQUESTS), ErrorCode::Unavailable);
    }
}
