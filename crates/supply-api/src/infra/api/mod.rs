use {
    crate::{domain, infra::observe},
    axum::http::Method,
    error::Error,
    std::{future::Future, net::SocketAddr, sync::Arc},
    tokio::sync::oneshot,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
};

pub mod auth;
mod error;
pub mod rate_limit;
mod routes;

pub struct Api {
    pub supply: domain::Supply,
    pub prices: domain::Prices,
    pub gate: auth::Gate,
    pub limiter: rate_limit::Limiter,
    pub addr: SocketAddr,
    /// If this channel is specified, the bound address will be sent to it. This
    /// allows the API to bind to 0.0.0.0:0 during testing.
    pub addr_sender: Option<oneshot::Sender<SocketAddr>>,
}

impl Api {
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let app = router(self.supply, self.prices, self.gate, self.limiter);

        // Start the server.
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        observe::serving(local_addr);
        if let Some(addr_sender) = self.addr_sender {
            addr_sender.send(local_addr).ok();
        }
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    }
}

fn router(
    supply: domain::Supply,
    prices: domain::Prices,
    gate: auth::Gate,
    limiter: rate_limit::Limiter,
) -> axum::Router {
    let gated = routes::prices(axum::Router::new()).route_layer(
        axum::middleware::from_fn_with_state(gate, auth::require_api_key),
    );
    // Health checks and metrics scrapes are never limited.
    let limited = routes::supply(axum::Router::new())
        .merge(gated)
        .route_layer(axum::middleware::from_fn_with_state(
            limiter,
            rate_limit::limit_per_client,
        ));

    routes::health(axum::Router::new())
        .merge(limited)
        .with_state(State(Arc::new(Inner { supply, prices })))
        .merge(::observe::metrics::handle_metrics())
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
}

#[derive(Clone)]
struct State(Arc<Inner>);

impl State {
    fn supply(&self) -> &domain::Supply {
        &self.0.supply
    }

    fn prices(&self) -> &domain::Prices {
        &self.0.prices
    }
}

struct Inner {
    supply: domain::Supply,
    prices: domain::Prices,
}
