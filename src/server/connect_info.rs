//! Peer address of the connection a request arrived on.
//!
//! Voter identity is the peer IP, never anything the client sends. The
//! extractor yields `None` when the router was not served with connect info
//! (some tests drive the router directly); handlers that need an identity
//! must reject such requests.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// ConnectInfo wrapper that yields `None` when connect info isn't available.
#[derive(Debug, Clone, Copy)]
pub struct MaybeConnectInfo(pub Option<SocketAddr>);

impl MaybeConnectInfo {
    /// Peer IP, if known
    pub fn ip(&self) -> Option<IpAddr> {
        self.0.map(|addr| addr.ip())
    }
}

impl<S> FromRequestParts<S> for MaybeConnectInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        async move { Ok(MaybeConnectInfo(addr)) }
    }
}
