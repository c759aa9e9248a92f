use {
    crate::{
        domain::{self, AddressLists, Aggregator},
        infra::{
            Api,
            CoinGecko,
            Ethereum,
            api::{auth, rate_limit},
            cli,
            observe,
        },
    },
    clap::Parser,
    freshness_cache::{Clock, FreshnessCache, Policy, SystemClock},
    std::{
        net::{Ipv4Addr, SocketAddr},
        sync::Arc,
    },
    tokio::sync::oneshot,
};

pub async fn start(args: impl Iterator<Item = String>) {
    let args = cli::Args::parse_from(args);
    observe::init(&::observe::Config::new(
        &args.log,
        args.stderr_threshold,
        args.use_json_logs,
    ));
    tracing::info!("running supply API with validated arguments:\n{}", args);
    run(args, None).await
}

/// This function exists to enable running the API for testing. The
/// `addr_sender` parameter is used so that the testing framework can get the
/// address of the server and connect to it. Outside the test suite, the
/// `addr_sender` parameter is unused.
pub async fn run(args: cli::Args, addr_sender: Option<oneshot::Sender<SocketAddr>>) {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let policy = match args.serve_stale {
        true => Policy::ServeStale,
        false => Policy::Wait,
    };

    let supply = supply(&args, policy, clock.clone());
    let prices = prices(&args, policy, clock);
    supply.warm_up();

    let (shutdown_sender, shutdown_receiver) = oneshot::channel();
    let serve = Api {
        supply,
        prices,
        gate: auth::Gate::new(args.environment, args.api_key.clone()),
        limiter: rate_limit::Limiter::per_minute(args.rate_limit_per_minute),
        addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port)),
        addr_sender,
    }
    .serve(async {
        let _ = shutdown_receiver.await;
    });

    futures::pin_mut!(serve);
    tokio::select! {
        result = &mut serve => panic!("serve task exited: {result:?}"),
        _ = shutdown_signal() => {
            shutdown_sender.send(()).expect("failed to send shutdown signal");
            match tokio::time::timeout(args.shutdown_timeout, serve).await {
                Ok(inner) => inner.expect("API failed during shutdown"),
                Err(_) => panic!("API shutdown exceeded timeout"),
            }
        }
    };
}

fn supply(args: &cli::Args, policy: Policy, clock: Arc<dyn Clock>) -> domain::Supply {
    let eth = Ethereum::new(
        args.node_url.clone(),
        args.multicall_address,
        args.upstream_timeout,
    );
    let aggregator = Aggregator::new(
        Arc::new(eth),
        args.token,
        AddressLists {
            burn: args.burn_addresses.clone(),
            locked: args.locked_addresses.clone(),
        },
        clock.clone(),
    );
    domain::Supply::new(
        aggregator,
        FreshnessCache::new("supply", args.cache_ttl, policy, clock),
    )
}

fn prices(args: &cli::Args, policy: Policy, clock: Arc<dyn Clock>) -> domain::Prices {
    let client = reqwest::Client::builder()
        .timeout(args.upstream_timeout)
        .build()
        .expect("failed to build HTTP client");
    let mapping = Arc::new(args.price_tokens.clone());
    let coingecko = CoinGecko::new(
        client,
        args.price_api_url.clone(),
        args.price_api_key.clone(),
        mapping.clone(),
    );
    domain::Prices::new(
        Arc::new(coingecko),
        mapping,
        FreshnessCache::new("prices", args.cache_ttl, policy, clock.clone()),
        clock,
    )
}

#[cfg(unix)]
async fn shutdown_signal() {
    // Intercept signals for graceful shutdown. Kubernetes sends sigterm, Ctrl-C
    // sends sigint.
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await
    };
    let sigint = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("failed to install SIGINT handler")
            .recv()
            .await;
    };
    futures::pin_mut!(sigint);
    futures::pin_mut!(sigterm);
    futures::future::select(sigterm, sigint).await;
}

#[cfg(windows)]
async fn shutdown_signal() {
    // No support for signal handling on Windows.
    std::future::pending().await
}
