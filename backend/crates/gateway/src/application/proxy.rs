//! Request dispatch to downstream services

use std::net::SocketAddr;
use std::sync::Arc;

use auth::domain::RevocationRegistry;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderName, HeaderValue, Request, Response};
use platform::client::append_forwarded_for;
use uuid::Uuid;

use crate::application::access_guard::AccessGuard;
use crate::domain::identity::{CallerIdentity, strip_identity};
use crate::domain::ports::Upstream;
use crate::domain::service::{RouteClass, ServiceRegistry};
use crate::error::{GatewayError, GatewayResult};

pub const X_GATEWAY: HeaderName = HeaderName::from_static("x-gateway");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const GATEWAY_NAME: &str = "api-gateway";

/// Matches a request to its service, settles the caller's identity and
/// relays the request.
pub struct ProxyService<V, U> {
    registry: ServiceRegistry,
    guard: AccessGuard<V>,
    upstream: Arc<U>,
}

impl<V, U> ProxyService<V, U>
where
    V: RevocationRegistry + Sync,
    U: Upstream + Sync,
{
    pub fn new(registry: ServiceRegistry, guard: AccessGuard<V>, upstream: Arc<U>) -> Self {
        Self {
            registry,
            guard,
            upstream,
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// The path is forwarded unchanged, prefix included. The socket peer is
    /// appended to `X-Forwarded-For` so downstream services that trust the
    /// gateway see the real client.
    pub async fn dispatch(&self, request: Request<Body>) -> GatewayResult<Response<Body>> {
        let (mut parts, body) = request.into_parts();

        let route = self
            .registry
            .match_path(parts.uri.path())
            .ok_or(GatewayError::RouteNotFound)?;

        // The auth service checks its own tokens; a bad token there is not
        // the gateway's call to reject.
        let identity: Option<CallerIdentity> =
            if route.class == RouteClass::Auth || self.registry.is_public(parts.uri.path()) {
                self.guard.identify(&parts.headers).await
            } else {
                Some(self.guard.authenticate(&parts.headers).await?)
            };

        strip_identity(&mut parts.headers);
        if let Some(identity) = &identity {
            identity.apply(&mut parts.headers);
        }

        if let Some(ConnectInfo(peer)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            append_forwarded_for(&mut parts.headers, peer.ip());
        }
        parts
            .headers
            .insert(X_GATEWAY, HeaderValue::from_static(GATEWAY_NAME));
        if !parts.headers.contains_key(X_REQUEST_ID) {
            if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
                parts.headers.insert(X_REQUEST_ID, value);
            }
        }

        tracing::debug!(
            service = %route.name,
            path = %parts.uri.path(),
            user_id = identity.as_ref().map(|i| i.user_id.as_str()).unwrap_or("-"),
            "Routing request"
        );

        self.upstream
            .forward(route, Request::from_parts(parts, body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use auth::MemoryAuthStore;
    use axum::http::{StatusCode, header};
    use platform::token::{TokenCodec, TokenKind, TokenSubject};

    use crate::domain::identity::X_USER_ID;
    use crate::domain::service::{DEFAULT_SERVICES, ServiceRoute};

    const SECRET: &[u8] = b"proxy-test-secret-proxy-test-secret!";

    /// Records what it was asked to send and answers 200.
    #[derive(Default)]
    struct RecordingUpstream {
        seen: Mutex<Vec<(String, axum::http::HeaderMap, String)>>,
    }

    impl Upstream for RecordingUpstream {
        async fn forward(
            &self,
            route: &ServiceRoute,
            request: Request<Body>,
        ) -> GatewayResult<Response<Body>> {
            self.seen.lock().unwrap().push((
                route.name.clone(),
                request.headers().clone(),
                request.uri().path().to_string(),
            ));
            Ok(Response::new(Body::empty()))
        }
    }

    fn service() -> (ProxyService<MemoryAuthStore, RecordingUpstream>, Arc<RecordingUpstream>) {
        let routes = DEFAULT_SERVICES
            .iter()
            .map(|(name, path, _, url, secs)| {
                let class = if *name == "auth" {
                    RouteClass::Auth
                } else {
                    RouteClass::Standard
                };
                ServiceRoute::new(*name, *path, *url, Duration::from_secs(*secs), class)
            })
            .collect();
        let upstream = Arc::new(RecordingUpstream::default());
        let guard = AccessGuard::new(TokenCodec::new(SECRET), Arc::new(MemoryAuthStore::new()));
        (
            ProxyService::new(ServiceRegistry::new("/api/v1", routes), guard, upstream.clone()),
            upstream,
        )
    }

    fn access_token() -> String {
        TokenCodec::new(SECRET)
            .issue(
                &TokenSubject::new("user-9").with_role("citizen"),
                TokenKind::Access,
                Duration::from_secs(60),
            )
            .unwrap()
            .token
    }

    #[tokio::test]
    async fn protected_route_needs_token() {
        let (proxy, upstream) = service();
        let request = Request::get("/api/v1/healthcare/records")
            .body(Body::empty())
            .unwrap();
        assert!(matches!(
            proxy.dispatch(request).await,
            Err(GatewayError::TokenMissing)
        ));
        assert!(upstream.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn forwards_identity_and_full_path() {
        let (proxy, upstream) = service();
        let request = Request::get("/api/v1/healthcare/records?page=2")
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token()))
            .header("x-user-id", "spoofed")
            .body(Body::empty())
            .unwrap();

        let response = proxy.dispatch(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let seen = upstream.seen.lock().unwrap();
        let (name, headers, path) = &seen[0];
        assert_eq!(name, "healthcare");
        assert_eq!(path, "/api/v1/healthcare/records");
        assert_eq!(headers.get(X_USER_ID).unwrap(), "user-9");
        assert_eq!(headers.get(X_GATEWAY).unwrap(), "api-gateway");
        assert!(headers.contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn peer_is_appended_to_forwarded_chain() {
        let (proxy, upstream) = service();
        let mut request = Request::get("/api/v1/auth/login")
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([203, 0, 113, 9], 40000))));

        proxy.dispatch(request).await.unwrap();

        let seen = upstream.seen.lock().unwrap();
        assert_eq!(
            seen[0].1.get("x-forwarded-for").unwrap(),
            "198.51.100.4, 203.0.113.9"
        );
    }

    #[tokio::test]
    async fn auth_routes_pass_without_token() {
        let (proxy, upstream) = service();
        let request = Request::post("/api/v1/auth/profile")
            .header(header::AUTHORIZATION, "Bearer not-a-token")
            .header("x-user-role", "admin")
            .body(Body::empty())
            .unwrap();

        proxy.dispatch(request).await.unwrap();

        let seen = upstream.seen.lock().unwrap();
        assert_eq!(seen[0].0, "auth");
        assert!(seen[0].1.get("x-user-role").is_none());
    }

    #[tokio::test]
    async fn unknown_prefix_is_not_found() {
        let (proxy, _) = service();
        let request = Request::get("/api/v1/healthcareX").body(Body::empty()).unwrap();
        assert!(matches!(
            proxy.dispatch(request).await,
            Err(GatewayError::RouteNotFound)
        ));
    }
}
