//! Whole-request deadline.
//!
//! # Responsibilities
//! - Stamp every inbound request with a [`Deadline`] extension
//! - Answer with the 504 envelope if the handler is still running after it
//!
//! # Design Decisions
//! - Outbound calls read the deadline and cap their own timeouts, so a hung
//!   backend surfaces as a service timeout or a fallback long before this
//!   guard fires; the guard only catches work nothing else bounded
//! - The guard waits a short grace period past the deadline so those capped
//!   timeouts win the race

use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::GatewayError;
use crate::http::request::RequestIdExt;
use crate::resilience::Deadline;

const GRACE: Duration = Duration::from_millis(250);

pub async fn enforce_deadline(State(budget): State<Duration>, mut request: Request<Body>, next: Next) -> Response {
    let request_id = request.request_id();
    request.extensions_mut().insert(Deadline::after(budget));

    match tokio::time::timeout(budget + GRACE, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            let err = GatewayError::DeadlineExceeded(budget);
            err.log("gateway", &request_id);
            err.into_response_with(&request_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Extension, Router};
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{}", addr)
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn test_overrun_becomes_gateway_timeout_envelope() {
        let router = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .layer(middleware::from_fn_with_state(Duration::from_millis(50), enforce_deadline));
        let base = serve(router).await;

        let resp = client()
            .get(format!("{}/slow", base))
            .header("x-request-id", "slow-1")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT.as_u16());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Gateway timeout");
        assert_eq!(body["request_id"], "slow-1");
    }

    #[tokio::test]
    async fn test_handlers_see_the_deadline() {
        let router = Router::new()
            .route(
                "/budget",
                get(|Extension(deadline): Extension<Deadline>| async move {
                    deadline.remaining().as_secs().to_string()
                }),
            )
            .layer(middleware::from_fn_with_state(Duration::from_secs(30), enforce_deadline));
        let base = serve(router).await;

        let text = client()
            .get(format!("{}/budget", base))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let secs: u64 = text.parse().unwrap();
        assert!((28..=30).contains(&secs));
    }
}
