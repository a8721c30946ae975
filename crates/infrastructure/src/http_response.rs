use reqwest::{Response, StatusCode};
use tokenrelay_core::{AppError, AppResult};

/// Passes successful responses through and maps every other status to an error.
pub(crate) async fn ensure_success(response: Response, endpoint: &str) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_owned());
    let message = format!("{endpoint} returned status {}: {body}", status.as_u16());

    Err(match status {
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            AppError::Unavailable(message)
        }
        status if status.is_server_error() => AppError::Unavailable(message),
        _ => AppError::Internal(message),
    })
}

pub(crate) fn transport_error(endpoint: &str, error: &reqwest::Error) -> AppError {
    AppError::Unavailable(format!("failed to call {endpoint}: {error}"))
}
