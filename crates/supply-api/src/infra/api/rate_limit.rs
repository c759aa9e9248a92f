//! Per-client request limits on the data endpoints.

use {
    super::error::Kind,
    crate::infra::observe,
    axum::{
        Json,
        extract::{ConnectInfo, Request},
        http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    governor::{
        Quota,
        RateLimiter,
        clock::{Clock, DefaultClock},
        middleware::StateInformationMiddleware,
        state::keyed::DefaultKeyedStateStore,
    },
    std::{
        net::{IpAddr, Ipv4Addr, SocketAddr},
        num::NonZeroU32,
        sync::Arc,
        time::Duration,
    },
};

pub const LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Tracked clients above which idle entries get evicted.
const EVICTION_THRESHOLD: usize = 10_000;

type Clients = RateLimiter<
    IpAddr,
    DefaultKeyedStateStore<IpAddr>,
    DefaultClock,
    StateInformationMiddleware,
>;

#[derive(Clone)]
pub enum Limiter {
    Unlimited,
    /// Every client IP gets a burst of `limit` requests which refills evenly
    /// over a minute.
    PerClient {
        limit: NonZeroU32,
        clients: Arc<Clients>,
    },
}

impl Limiter {
    /// A limit of zero disables rate limiting.
    pub fn per_minute(limit: u32) -> Self {
        match NonZeroU32::new(limit) {
            None => {
                observe::rate_limit_disabled();
                Self::Unlimited
            }
            Some(limit) => Self::PerClient {
                limit,
                clients: Arc::new(
                    RateLimiter::keyed(Quota::per_minute(limit))
                        .with_middleware::<StateInformationMiddleware>(),
                ),
            },
        }
    }

    /// Counts one request of `client`. Returns the remaining burst capacity,
    /// or how long the client has to wait before its next request.
    fn check(&self, client: IpAddr) -> Result<Option<u32>, Duration> {
        let Self::PerClient { clients, .. } = self else {
            return Ok(None);
        };
        if clients.len() > EVICTION_THRESHOLD {
            clients.retain_recent();
        }
        match clients.check_key(&client) {
            Ok(snapshot) => Ok(Some(snapshot.remaining_burst_capacity())),
            Err(not_until) => Err(not_until.wait_time_from(DefaultClock::default().now())),
        }
    }

    fn limit(&self) -> Option<NonZeroU32> {
        match self {
            Self::Unlimited => None,
            Self::PerClient { limit, .. } => Some(*limit),
        }
    }
}

/// Rejects clients that exceeded their request budget and annotates allowed
/// responses with `RateLimit-*` headers.
pub(super) async fn limit_per_client(
    limiter: axum::extract::State<Limiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client(&request);
    match limiter.check(client) {
        Ok(remaining) => {
            let mut response = next.run(request).await;
            if let (Some(limit), Some(remaining)) = (limiter.limit(), remaining) {
                insert_headers(response.headers_mut(), limit, remaining, None);
            }
            response
        }
        Err(wait) => {
            observe::rate_limited(client, wait);
            let mut response =
                <(StatusCode, Json<super::Error>)>::from(Kind::RateLimited).into_response();
            if let Some(limit) = limiter.limit() {
                insert_headers(response.headers_mut(), limit, 0, Some(wait));
            }
            response
        }
    }
}

fn insert_headers(
    headers: &mut HeaderMap,
    limit: NonZeroU32,
    remaining: u32,
    wait: Option<Duration>,
) {
    headers.insert(LIMIT, HeaderValue::from(limit.get()));
    headers.insert(REMAINING, HeaderValue::from(remaining));
    if let Some(wait) = wait {
        // Whole seconds, rounded up so a client honouring it is admitted.
        let seconds = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        headers.insert(RESET, HeaderValue::from(seconds));
        headers.insert(header::RETRY_AFTER, HeaderValue::from(seconds));
    }
}

/// The peer address of the connection. Requests without connection info
/// share one bucket.
fn client(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
