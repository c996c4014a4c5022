//! Client identification utilities
//!
//! Helpers that read who is calling from HTTP headers: client IP (behind a
//! proxy), user agent and bearer credentials.

use std::net::{AddrParseError, IpAddr};
use std::str::FromStr;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, header};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Request metadata recorded with audit entries and login events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(
        headers: &HeaderMap,
        peer_ip: Option<IpAddr>,
        trusted: &TrustedProxies,
    ) -> Self {
        Self {
            ip: extract_client_ip(headers, peer_ip, trusted),
            user_agent: extract_user_agent(headers),
        }
    }

    /// IP as a string, `"unknown"` when it cannot be determined.
    pub fn ip_or_unknown(&self) -> String {
        self.ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Peers allowed to report the client address through `X-Forwarded-For`.
///
/// Empty means this service is the edge: only the socket peer counts.
/// Parsed from a comma-separated list such as `10.0.0.5, ::1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies(Arc<[IpAddr]>);

impl TrustedProxies {
    pub fn new(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        Self(addrs.into_iter().collect())
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.0.contains(ip)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for TrustedProxies {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<IpAddr>, _>>()
            .map(Self::new)
    }
}

/// Resolve the client address.
///
/// The socket peer is the answer unless it is a trusted proxy. Then the
/// `X-Forwarded-For` chain is walked right to left and the first hop that is
/// not itself trusted wins. An unparsable hop ends the walk at the last
/// address vouched for.
pub fn extract_client_ip(
    headers: &HeaderMap,
    peer_ip: Option<IpAddr>,
    trusted: &TrustedProxies,
) -> Option<IpAddr> {
    let peer = peer_ip?;
    if !trusted.contains(&peer) {
        return Some(peer);
    }

    let mut client = peer;
    for hop in forwarded_hops(headers).iter().rev() {
        match hop.parse::<IpAddr>() {
            Ok(ip) => {
                client = ip;
                if !trusted.contains(&ip) {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    Some(client)
}

/// Every `X-Forwarded-For` entry in order, across repeated headers.
fn forwarded_hops(headers: &HeaderMap) -> Vec<&str> {
    headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect()
}

/// Append `peer` to the `X-Forwarded-For` chain before relaying a request.
pub fn append_forwarded_for(headers: &mut HeaderMap, peer: IpAddr) {
    let mut chain = forwarded_hops(headers).join(", ");
    if !chain.is_empty() {
        chain.push_str(", ");
    }
    chain.push_str(&peer.to_string());

    let value = HeaderValue::from_str(&chain)
        .or_else(|_| HeaderValue::from_str(&peer.to_string()));
    if let Ok(value) = value {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Token from an `Authorization: Bearer <token>` header.
///
/// Returns `None` for a missing header, another scheme, or an empty token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
