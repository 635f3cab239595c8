//! Response assembly. Every response carries permissive CORS headers so
//! browser clients can call the API directly.

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::errors::ApiError;

pub type HandlerBody = http_body_util::combinators::BoxBody<Bytes, ApiError>;

const CORS_ALLOW_ORIGIN: (&str, &str) = ("access-control-allow-origin", "*");
const CORS_ALLOW_HEADERS: (&str, &str) = ("access-control-allow-headers", "Content-Type");
const CORS_ALLOW_METHODS: (&str, &str) = ("access-control-allow-methods", "GET,OPTIONS,POST");

fn with_cors(mut response: Response<HandlerBody>) -> Response<HandlerBody> {
    let headers = response.headers_mut();
    for (name, value) in [CORS_ALLOW_ORIGIN, CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS] {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

fn full_body(bytes: Bytes) -> HandlerBody {
    Full::new(bytes).map_err(|e| match e {}).boxed()
}

pub fn json_response<T: Serialize>(
    status: StatusCode,
    payload: &T,
) -> Result<Response<HandlerBody>, ApiError> {
    let body = serde_json::to_vec(payload)
        .map_err(|e| ApiError::ResponseSerialization(e.to_string()))?;

    let mut response = Response::new(full_body(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(with_cors(response))
}

pub fn error_response(error: &ApiError) -> Response<HandlerBody> {
    let payload = serde_json::json!({ "error": error.to_string() });
    let mut response = Response::new(full_body(Bytes::from(payload.to_string())));
    *response.status_mut() = error.status();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    with_cors(response)
}

pub fn options_response() -> Response<HandlerBody> {
    let mut response = Response::new(full_body(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    with_cors(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_response_has_cors_headers() {
        let response =
            json_response(StatusCode::OK, &serde_json::json!({"success": true})).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_error_response_carries_status_and_message() {
        let error = ApiError::UnsupportedAction("bad_action".into());
        let response = error_response(&error);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_options_response() {
        let response = options_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-methods")
                .unwrap(),
            "GET,OPTIONS,POST"
        );
    }
}
