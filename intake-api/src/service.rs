//! Hyper service that fronts the action handlers.
//!
//! The public surface is a single POST endpoint taking a JSON envelope with
//! an `action` discriminator, plus a webhook endpoint authenticated by HMAC
//! signature instead of an id token. Handler failures become JSON error
//! responses, never transport errors.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::warn;

use record_store::{BlobStore, RecordStore};

use crate::auth::TokenVerifier;
use crate::email::SubmissionNotifier;
use crate::errors::{ApiError, ApiResult};
use crate::handlers::{self, Probe};
use crate::metrics_defs;
use crate::response::{HandlerBody, error_response, json_response, options_response};
use crate::router::FieldRouter;

pub struct AppState {
    pub router: FieldRouter,
    pub store: Arc<dyn RecordStore>,
    pub blob: Arc<dyn BlobStore>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub notifier: Option<SubmissionNotifier>,
    pub max_file_size_mb: u64,
    pub webhook_secret: String,
}

#[derive(Clone)]
pub struct IntakeService {
    state: Arc<AppState>,
}

impl IntakeService {
    pub fn new(state: Arc<AppState>) -> Self {
        IntakeService { state }
    }

    async fn read_body<B>(request: Request<B>) -> ApiResult<(hyper::http::request::Parts, Vec<u8>)>
    where
        B: hyper::body::Body + Send,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = request.into_parts();
        let bytes = body
            .collect()
            .await
            .map_err(|e| ApiError::RequestBody(e.to_string()))?
            .to_bytes();
        Ok((parts, bytes.to_vec()))
    }

    fn payload<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
        serde_json::from_slice(body)
            .map_err(|e| ApiError::MalformedInput(format!("invalid request body: {e}")))
    }

    async fn dispatch_action(state: &AppState, body: &[u8]) -> ApiResult<serde_json::Value> {
        let probe: Probe = Self::payload(body)?;
        let claims = state.verifier.verify(&probe.id_token).await?;
        let email = claims.email.as_str();

        let result = match probe.action.as_str() {
            "get_details" => {
                handlers::get_details::handle(state, email, Self::payload(body)?).await
            }
            "update_details" => {
                handlers::update_details::handle(state, email, Self::payload(body)?).await
            }
            "upload_file" => {
                handlers::documents::handle_upload(state, email, Self::payload(body)?).await
            }
            "delete_file" => {
                handlers::documents::handle_delete(state, email, Self::payload(body)?).await
            }
            other => Err(ApiError::UnsupportedAction(other.to_string())),
        }?;

        let mut envelope = json!({ "success": true });
        if let (Some(envelope), Some(extra)) = (envelope.as_object_mut(), result.as_object()) {
            for (k, v) in extra {
                envelope.insert(k.clone(), v.clone());
            }
        }
        Ok(envelope)
    }

    /// Routes to a handler. Every failure surfaces as `Err` here so `handle`
    /// can render it; this function never builds error responses itself.
    async fn route<B>(
        state: &AppState,
        request: Request<B>,
    ) -> ApiResult<Response<HandlerBody>>
    where
        B: hyper::body::Body + Send,
        B::Error: std::fmt::Display,
    {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        match (method, path.as_str()) {
            (Method::POST, "/") => {
                let (_, body) = Self::read_body(request).await?;
                let payload = Self::dispatch_action(state, &body).await?;
                json_response(StatusCode::OK, &payload)
            }
            (Method::POST, "/payments/webhook") => {
                let (parts, body) = Self::read_body(request).await?;
                let signature = parts
                    .headers
                    .get(handlers::payment::SIGNATURE_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                let payload = handlers::payment::handle(state, &body, signature).await?;
                json_response(StatusCode::OK, &payload)
            }
            _ => Err(ApiError::NotFound),
        }
    }

    /// Bounded label for the requests counter; raw paths would give the
    /// metric unbounded cardinality.
    fn route_label(method: &Method, path: &str) -> &'static str {
        match (method, path) {
            (&Method::POST, "/") => "action",
            (&Method::POST, "/payments/webhook") => "payments_webhook",
            _ => "unknown",
        }
    }

    async fn handle<B>(
        state: Arc<AppState>,
        request: Request<B>,
    ) -> ApiResult<Response<HandlerBody>>
    where
        B: hyper::body::Body + Send,
        B::Error: std::fmt::Display,
    {
        if request.method() == Method::OPTIONS {
            return Ok(options_response());
        }

        let started = Instant::now();
        let path = request.uri().path().to_string();
        let route = Self::route_label(request.method(), &path);

        let response = match Self::route(&state, request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(path, %error, "request failed");
                error_response(&error)
            }
        };

        let status = response.status().as_u16().to_string();
        metrics::counter!(metrics_defs::REQUESTS, "route" => route, "status" => status)
            .increment(1);
        metrics::histogram!(metrics_defs::REQUEST_DURATION).record(started.elapsed().as_secs_f64());

        Ok(response)
    }
}

impl Service<Request<Incoming>> for IntakeService {
    type Response = Response<HandlerBody>;
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, request: Request<Incoming>) -> Self::Future {
        let state = self.state.clone();
        Box::pin(Self::handle(state, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{TEST_TOKEN_SECRET, test_state, test_token};
    use http_body_util::Full;
    use hyper::body::Bytes;
    use serde_json::json;

    /// Body that fails mid-read, standing in for a dropped client.
    struct BrokenBody;

    impl hyper::body::Body for BrokenBody {
        type Data = Bytes;
        type Error = std::io::Error;

        fn poll_frame(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Option<Result<hyper::body::Frame<Self::Data>, Self::Error>>> {
            std::task::Poll::Ready(Some(Err(std::io::Error::other("connection reset"))))
        }
    }

    fn request(method: Method, path: &str, body: &[u8]) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::copy_from_slice(body)))
            .unwrap()
    }

    fn envelope(action: &str, extra: serde_json::Value) -> Vec<u8> {
        let mut body = json!({
            "action": action,
            "id_token": test_token("user@example.com"),
        });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                body.insert(k.clone(), v.clone());
            }
        }
        body.to_string().into_bytes()
    }

    #[tokio::test]
    async fn test_update_then_get_round_trip() {
        let state = test_state();

        let body = envelope(
            "update_details",
            json!({
                "application_id": "app-1",
                "key_to_update": "first_name",
                "value_to_update": {"value": "Yentah"},
            }),
        );
        let written = IntakeService::dispatch_action(&state, &body).await.unwrap();
        assert_eq!(written["success"], json!(true));

        let body = envelope("get_details", json!({"application_id": "app-1"}));
        let fetched = IntakeService::dispatch_action(&state, &body).await.unwrap();
        assert_eq!(fetched["record"]["first_name"]["value"], json!("Yentah"));
    }

    #[tokio::test]
    async fn test_unknown_action_is_forbidden() {
        let state = test_state();
        let body = envelope("drop_tables", json!({}));

        let err = IntakeService::dispatch_action(&state, &body).await.unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedAction(_)));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bad_token_is_rejected_before_dispatch() {
        let state = test_state();
        let body = json!({
            "action": "get_details",
            "id_token": "garbage",
            "application_id": "app-1",
        })
        .to_string()
        .into_bytes();

        let err = IntakeService::dispatch_action(&state, &body).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[tokio::test]
    async fn test_token_email_scopes_the_record() {
        let state = test_state();

        let body = envelope(
            "update_details",
            json!({
                "application_id": "app-1",
                "key_to_update": "first_name",
                "value_to_update": {"value": "Yehuda"},
            }),
        );
        IntakeService::dispatch_action(&state, &body).await.unwrap();

        // A different caller with the same application id sees nothing.
        let body = json!({
            "action": "get_details",
            "id_token": crate::auth::make_test_token(
                TEST_TOKEN_SECRET,
                "test-key",
                "other@example.com",
                chrono::Utc::now().timestamp() + 3600,
            ),
            "application_id": "app-1",
        })
        .to_string()
        .into_bytes();
        let fetched = IntakeService::dispatch_action(&state, &body).await.unwrap();
        assert!(fetched["record"]["first_name"].is_null());
    }

    #[tokio::test]
    async fn test_malformed_envelope() {
        let state = test_state();
        let err = IntakeService::dispatch_action(&state, b"not json")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn test_unknown_path_renders_as_json_404() {
        let state = test_state();
        let response = IntakeService::handle(state, request(Method::POST, "/nope", b"{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(hyper::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_body_read_failure_renders_as_response_not_transport_error() {
        let state = test_state();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(BrokenBody)
            .unwrap();

        let response = IntakeService::handle(state, req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_options_preflight() {
        let state = test_state();
        let response = IntakeService::handle(state, request(Method::OPTIONS, "/", b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_route_label_is_bounded() {
        assert_eq!(IntakeService::route_label(&Method::POST, "/"), "action");
        assert_eq!(
            IntakeService::route_label(&Method::POST, "/payments/webhook"),
            "payments_webhook"
        );
        assert_eq!(
            IntakeService::route_label(&Method::GET, "/records/someone@example.com"),
            "unknown"
        );
    }
}
