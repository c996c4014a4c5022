//! reqwest-backed upstream and health probe

use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, Request, Response, header};

use crate::domain::ports::{HealthProbe, ProbeOutcome, Upstream};
use crate::domain::service::ServiceRoute;
use crate::error::{GatewayError, GatewayResult};

const USER_AGENT: &str = concat!("api-gateway/", env!("CARGO_PKG_VERSION"));

/// Connection-scoped headers (RFC 9110 7.6.1) plus the ones the client
/// recomputes.
static HOP_BY_HOP: [HeaderName; 10] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
    header::CONTENT_LENGTH,
];

#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    probe_timeout: Duration,
    max_body_bytes: usize,
}

impl HttpUpstream {
    pub fn new(probe_timeout: Duration, max_body_bytes: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            probe_timeout,
            max_body_bytes,
        })
    }
}

/// Drop hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP.iter().chain(named.iter()) {
        headers.remove(name);
    }
}

impl Upstream for HttpUpstream {
    async fn forward(
        &self,
        route: &ServiceRoute,
        request: Request<Body>,
    ) -> GatewayResult<Response<Body>> {
        let (mut parts, body) = request.into_parts();

        let body: Bytes = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|_| GatewayError::PayloadTooLarge)?;

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", route.url, path_and_query);

        strip_hop_by_hop(&mut parts.headers);

        tracing::debug!(service = %route.name, method = %parts.method, url = %url, "Proxying request");

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(parts.headers)
            .timeout(route.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| GatewayError::unavailable(&route.name, e))?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let bytes = upstream
            .bytes()
            .await
            .map_err(|e| GatewayError::unavailable(&route.name, e))?;

        tracing::debug!(service = %route.name, status = status.as_u16(), "Upstream responded");

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

impl HealthProbe for HttpUpstream {
    async fn probe(&self, route: &ServiceRoute) -> ProbeOutcome {
        let started = Instant::now();
        let result = self
            .client
            .get(route.health_url())
            .timeout(self.probe_timeout)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let details = response.json::<serde_json::Value>().await.ok();
                ProbeOutcome {
                    status: Some(status),
                    details,
                    error: None,
                    elapsed: started.elapsed(),
                }
            }
            Err(e) => ProbeOutcome {
                status: None,
                details: None,
                error: Some(if e.is_timeout() {
                    "Health check timed out".to_string()
                } else {
                    "Service unreachable".to_string()
                }),
                elapsed: started.elapsed(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn strips_connection_scoped_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-secret"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-secret", HeaderValue::from_static("1"));
        headers.insert(header::HOST, HeaderValue::from_static("gateway"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        strip_hop_by_hop(&mut headers);

        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("keep-alive").is_none());
        assert!(headers.get("x-secret").is_none());
        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
        assert!(headers.get(header::AUTHORIZATION).is_some());
        assert!(headers.get(header::CONTENT_TYPE).is_some());
    }
}
