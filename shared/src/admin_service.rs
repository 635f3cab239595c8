use crate::http::make_error_response;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

/// Administrative endpoints served on a separate listener.
///
/// `/health` always succeeds once the process is up; `/ready` consults the
/// readiness probe supplied by the owning service.
pub struct AdminService<F, E> {
    is_ready: F,
    _error: PhantomData<E>,
}

impl<F, E> AdminService<F, E>
where
    F: Fn() -> bool,
{
    pub fn new(is_ready: F) -> Self {
        Self {
            is_ready,
            _error: PhantomData,
        }
    }
}

impl<F, E> Service<Request<Incoming>> for AdminService<F, E>
where
    F: Fn() -> bool + Clone + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let ready = (self.is_ready)();

        Box::pin(async move {
            let ok = || {
                Response::new(
                    Full::new(Bytes::from_static(b"ok\n"))
                        .map_err(|e| match e {})
                        .boxed(),
                )
            };

            let response = match req.uri().path() {
                "/health" => ok(),
                "/ready" if ready => ok(),
                "/ready" => make_error_response(StatusCode::SERVICE_UNAVAILABLE),
                _ => make_error_response(StatusCode::NOT_FOUND),
            };
            Ok(response)
        })
    }
}
