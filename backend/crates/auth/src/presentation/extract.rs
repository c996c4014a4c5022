//! Request extractors

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use platform::client::{ClientInfo, TrustedProxies};

use crate::domain::AuthStore;
use crate::error::AuthError;
use crate::presentation::handlers::AuthAppState;

/// Client IP and user agent. The IP is unknown when the server was started
/// without connect info (as in router tests).
#[derive(Debug, Clone)]
pub struct ClientContext(pub ClientInfo);

impl<R> FromRequestParts<AuthAppState<R>> for ClientContext
where
    R: AuthStore,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthAppState<R>,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientContext(client_info(
            parts,
            &state.services.config.trusted_proxies,
        )))
    }
}

pub(crate) fn client_info(parts: &Parts, trusted: &TrustedProxies) -> ClientInfo {
    let peer_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    ClientInfo::from_headers(&parts.headers, peer_ip, trusted)
}

/// JSON body whose rejections render as auth validation errors.
pub struct AuthJson<T>(pub T);

impl<S, T> FromRequest<S> for AuthJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AuthJson(value)),
            Err(rejection) => Err(AuthError::Validation(rejection.body_text())),
        }
    }
}
