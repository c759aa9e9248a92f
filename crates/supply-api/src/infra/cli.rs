use {
    super::{
        blockchain::contracts::MULTICALL3,
        config::{self, Environment},
    },
    crate::domain::TokenMapping,
    alloy::primitives::Address,
    std::{
        fmt::{self, Display, Formatter},
        time::Duration,
    },
    url::Url,
};

#[derive(Debug, clap::Parser)]
pub struct Args {
    /// The port to serve the API on.
    #[clap(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// The log filter.
    #[clap(
        long,
        env,
        default_value = "warn,supply_api=debug,freshness_cache=debug,observe=info"
    )]
    pub log: String,

    /// At which log level logs should be printed to stderr instead of stdout.
    #[clap(long, env)]
    pub stderr_threshold: Option<tracing::Level>,

    /// Whether to use JSON format for the logs.
    #[clap(long, env, default_value = "false")]
    pub use_json_logs: bool,

    /// The node RPC API endpoint.
    #[clap(long, env = "BASE_RPC_URL")]
    pub node_url: Url,

    /// Address of the Multicall3 contract used to batch reads.
    #[clap(long, env, default_value_t = MULTICALL3)]
    pub multicall_address: Address,

    /// The token whose supply is reported.
    #[clap(long, env, default_value_t = config::TOKEN)]
    pub token: Address,

    /// Addresses holding burned tokens. Their balances don't count towards
    /// the circulating supply.
    #[clap(long, env, use_value_delimiter = true, default_values_t = config::BURN_ADDRESSES)]
    pub burn_addresses: Vec<Address>,

    /// Team, vesting and treasury addresses. Their balances don't count
    /// towards the circulating supply.
    #[clap(long, env, use_value_delimiter = true, default_values_t = config::LOCKED_ADDRESSES)]
    pub locked_addresses: Vec<Address>,

    /// Comma separated `SYMBOL=id` pairs of the tokens quoted by the price
    /// endpoints, where `id` is the price API identifier of the token.
    #[clap(
        long,
        env,
        default_value = config::PRICE_TOKENS,
        value_parser = config::parse_token_mapping
    )]
    pub price_tokens: TokenMapping,

    /// Base URL of the CoinGecko compatible price API.
    #[clap(long, env, default_value = "https://api.coingecko.com/api/v3/")]
    pub price_api_url: Url,

    /// API key for the price API.
    #[clap(long, env)]
    pub price_api_key: Option<String>,

    /// Secret required in the `x-api-key` header of price requests. Price
    /// endpoints are open when unset.
    #[clap(long, env = "API_KEY")]
    pub api_key: Option<String>,

    /// Requests a single client IP may make per minute to the data
    /// endpoints. Zero disables the limit.
    #[clap(long, env, default_value = "20")]
    pub rate_limit_per_minute: u32,

    /// The deployment environment. `development` disables the API key gate.
    #[clap(long, env = "ENVIRONMENT", value_enum, default_value_t)]
    pub environment: Environment,

    /// How long computed supply and price data is served before it gets
    /// refreshed.
    #[clap(long, env, default_value = "30m", value_parser = humantime::parse_duration)]
    pub cache_ttl: Duration,

    /// Serve expired data right away while a refresh is in flight instead of
    /// waiting for the refresh.
    #[clap(long, env, default_value = "false")]
    pub serve_stale: bool,

    /// Timeout for individual RPC and price API requests.
    #[clap(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub upstream_timeout: Duration,

    /// How long in-flight requests are given to finish on shutdown.
    #[clap(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub shutdown_timeout: Duration,
}

impl Display for Args {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            port,
            log,
            stderr_threshold,
            use_json_logs,
            node_url: _,
            multicall_address,
            token,
            burn_addresses,
            locked_addresses,
            price_tokens,
            price_api_url,
            price_api_key,
            api_key,
            rate_limit_per_minute,
            environment,
            cache_ttl,
            serve_stale,
            upstream_timeout,
            shutdown_timeout,
        } = self;

        writeln!(f, "port: {port}")?;
        writeln!(f, "log: {log}")?;
        config::display_option(f, "stderr_threshold", stderr_threshold)?;
        writeln!(f, "use_json_logs: {use_json_logs}")?;
        writeln!(f, "node_url: SECRET")?;
        writeln!(f, "multicall_address: {multicall_address}")?;
        writeln!(f, "token: {token}")?;
        config::display_list(f, "burn_addresses", burn_addresses)?;
        config::display_list(f, "locked_addresses", locked_addresses)?;
        config::display_list(
            f,
            "price_tokens",
            price_tokens
                .iter()
                .map(|(symbol, id)| format!("{symbol}={id}")),
        )?;
        writeln!(f, "price_api_url: {price_api_url}")?;
        config::display_secret_option(f, "price_api_key", price_api_key)?;
        config::display_secret_option(f, "api_key", api_key)?;
        writeln!(f, "rate_limit_per_minute: {rate_limit_per_minute}")?;
        writeln!(f, "environment: {environment}")?;
        writeln!(f, "cache_ttl: {cache_ttl:?}")?;
        writeln!(f, "serve_stale: {serve_stale}")?;
        writeln!(f, "upstream_timeout: {upstream_timeout:?}")?;
        writeln!(f, "shutdown_timeout: {shutdown_timeout:?}")?;
        Ok(())
    }
}
