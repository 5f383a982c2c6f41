//! HTTP surface of the relay
//!
//! `POST /api/sos-alert` runs a request through [`SosAlertRelay::handle`];
//! `GET /health` reports the relay counters without contacting the SMTP
//! server.

use crate::config::ServerConfig;
use crate::provider::SosAlertRelay;
use anyhow::{Context, Result};
use hyper::body::HttpBody;
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Serialize;
use serde_json::json;
use sos_alert_common::{AlertRequestBody, AlertResponse};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const SOS_ALERT_PATH: &str = "/api/sos-alert";
pub const HEALTH_PATH: &str = "/health";

/// Serve until `shutdown` resolves
pub async fn serve<F>(relay: Arc<SosAlertRelay>, config: ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let addr = config.socket_addr().map_err(anyhow::Error::msg)?;
    let max_body_bytes = config.max_body_bytes;

    let make_svc = make_service_fn(move |_conn| {
        let relay = relay.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                handle_request(relay.clone(), req, max_body_bytes)
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind relay server on {}", addr))?
        .serve(make_svc);

    info!("🚨 SOS alert relay listening on http://{}{}", server.local_addr(), SOS_ALERT_PATH);

    server
        .with_graceful_shutdown(shutdown)
        .await
        .context("Relay server error")
}

/// Route one request
pub async fn handle_request(
    relay: Arc<SosAlertRelay>,
    req: Request<Body>,
    max_body_bytes: usize,
) -> Result<Response<Body>, Infallible> {
    debug!("{} {}", req.method(), req.uri().path());

    let response = match (req.method(), req.uri().path()) {
        (&Method::POST, SOS_ALERT_PATH) => handle_sos_alert(&relay, req, max_body_bytes).await,
        (&Method::GET, HEALTH_PATH) => handle_health(&relay),
        (_, SOS_ALERT_PATH) | (_, HEALTH_PATH) => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &AlertResponse::failure("Method not allowed"),
        ),
        _ => json_response(StatusCode::NOT_FOUND, &AlertResponse::failure("Not found")),
    };

    Ok(response)
}

async fn handle_sos_alert(
    relay: &SosAlertRelay,
    req: Request<Body>,
    max_body_bytes: usize,
) -> Response<Body> {
    info!("🚨 SOS alert API called");

    let declared_length = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_length.is_some_and(|len| len > max_body_bytes) {
        return payload_too_large();
    }

    let bytes = match read_body(req.into_body(), max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(BodyReadError::TooLarge) => return payload_too_large(),
        Err(BodyReadError::Transport(e)) => {
            warn!("Failed to read SOS alert body: {}", e);
            return json_response(
                StatusCode::BAD_REQUEST,
                &AlertResponse::failure_with_details("Failed to read request body", e.to_string()),
            );
        }
    };

    let body: AlertRequestBody = match serde_json::from_slice(&bytes) {
        Ok(body) => body,
        Err(e) => {
            warn!("Malformed SOS alert body: {}", e);
            return json_response(
                StatusCode::BAD_REQUEST,
                &AlertResponse::failure_with_details("Invalid JSON body", e.to_string()),
            );
        }
    };

    let (status, response) = relay.handle(body).await;
    json_response(status, &response)
}

enum BodyReadError {
    TooLarge,
    Transport(hyper::Error),
}

/// Collect the body chunk by chunk, giving up as soon as it exceeds `limit`
async fn read_body(mut body: Body, limit: usize) -> Result<Vec<u8>, BodyReadError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(BodyReadError::Transport)?;
        if bytes.len() + chunk.len() > limit {
            return Err(BodyReadError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn handle_health(relay: &SosAlertRelay) -> Response<Body> {
    json_response(
        StatusCode::OK,
        &json!({
            "status": "ok",
            "service": "sos-alert-relay",
            "metrics": relay.metrics(),
        }),
    )
}

fn payload_too_large() -> Response<Body> {
    json_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        &AlertResponse::failure("Request body too large"),
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"success":false,"message":"Failed to process SOS alert"}"#.to_vec(),
            )
        }
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
