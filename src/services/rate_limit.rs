use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request},
    response::{IntoResponse, Response},
};
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use std::{
    future::Future,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    pin::Pin,
    sync::Arc,
};
use tower::{Layer, Service};

use crate::modules::auth::interface::AuthError;

/// Idle client buckets are dropped once this many are tracked.
const MAX_TRACKED_CLIENTS: usize = 10_000;

pub type SharedRateLimiter = Arc<RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>>;

/// Per-client limiter for routes that send a code by email: `burst`
/// requests up front, then `per_minute` more each minute, for each address.
pub fn create_rate_limiter(burst: u32, per_minute: u32) -> SharedRateLimiter {
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);

    let quota = Quota::per_minute(per_minute).allow_burst(burst);
    Arc::new(RateLimiter::keyed(quota))
}

/// Address the limiter buckets a request under.
///
/// Priority: first `X-Forwarded-For` entry, then `X-Real-IP`, then the peer
/// address. Requests with none of these share the unspecified address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|value| value.trim().parse::<IpAddr>().ok());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<IpAddr>().ok())
    };

    forwarded
        .or_else(real_ip)
        .or_else(|| peer.map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: SharedRateLimiter,
}

impl RateLimitLayer {
    pub fn new(limiter: SharedRateLimiter) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: SharedRateLimiter,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();

        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let ip = client_ip(request.headers(), peer);

        Box::pin(async move {
            if limiter.len() > MAX_TRACKED_CLIENTS {
                limiter.retain_recent();
            }

            if limiter.check_key(&ip).is_err() {
                tracing::warn!(client_ip = %ip, path = %request.uri().path(), "rate limit exceeded");
                return Ok(AuthError::RateLimited.into_response());
            }
            inner.call(request).await
        })
    }
}
