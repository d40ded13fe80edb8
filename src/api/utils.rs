//! API utility functions
//!
//! Pure, stateless helpers for HTTP request processing, kept apart from the
//! handlers so they can be unit tested.

use axum::http::HeaderMap;
use http_body_util::LengthLimitError;

use crate::api::error::ApiError;

pub const USER_HEADER: &str = "X-Harvest-User";

/// The caller's owner id from `X-Harvest-User`. Missing, empty or
/// non-UTF-8 values are unauthenticated.
pub fn caller(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or(ApiError::Unauthenticated)
}

/// Parses and validates Content-Type header for application/json
///
/// Accepts:
/// - `application/json`
/// - `application/json; charset=utf-8`
///
/// Rejects `application/jsonp`, `text/json` and malformed media types.
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type.parse().map_err(|_| {
        ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type))
    })?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

/// Map a failed body read. Only hitting the size limit is a 413; a corrupt
/// compressed stream or a dropped connection is the client's bad payload.
pub fn body_error(err: axum::Error, limit: u64) -> ApiError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
    while let Some(current) = source {
        if current.is::<LengthLimitError>() {
            return ApiError::PayloadTooLarge(limit);
        }
        source = current.source();
    }
    ApiError::InvalidPayload(format!("unreadable request body: {err}"))
}

/// `attachment` disposition for a download. Quotes and backslashes are
/// dropped from the name rather than escaped.
pub fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_content_type_valid() {
        assert!(parse_content_type("application/json").is_ok());
        assert!(parse_content_type("application/json; charset=utf-8").is_ok());
        assert!(parse_content_type("application/json; charset=UTF-8").is_ok());
    }

    #[test]
    fn test_parse_content_type_invalid() {
        assert!(parse_content_type("application/jsonp").is_err());
        assert!(parse_content_type("text/json").is_err());
        assert!(parse_content_type("text/plain").is_err());
        assert!(parse_content_type("not a media type").is_err());
    }

    #[test]
    fn test_caller_requires_non_empty_header() {
        let mut headers = HeaderMap::new();
        assert!(matches!(caller(&headers), Err(ApiError::Unauthenticated)));

        headers.insert(USER_HEADER, HeaderValue::from_static("   "));
        assert!(matches!(caller(&headers), Err(ApiError::Unauthenticated)));

        headers.insert(USER_HEADER, HeaderValue::from_static("user-1"));
        assert_eq!(caller(&headers).unwrap(), "user-1");
    }

    #[tokio::test]
    async fn test_body_error_only_limit_is_too_large() {
        let err = axum::body::to_bytes(axum::body::Body::from("0123456789"), 4)
            .await
            .unwrap_err();
        assert!(matches!(body_error(err, 4), ApiError::PayloadTooLarge(4)));

        let err = axum::Error::new(std::io::Error::other("corrupt deflate stream"));
        match body_error(err, 4) {
            ApiError::InvalidPayload(message) => assert!(message.contains("corrupt deflate")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("amazon_data.csv"),
            "attachment; filename=\"amazon_data.csv\""
        );
        assert_eq!(
            content_disposition("a\"b.csv"),
            "attachment; filename=\"ab.csv\""
        );
    }
}
