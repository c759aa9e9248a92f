//! USD quotes from a CoinGecko compatible `simple/price` API.

use {
    crate::domain::{Symbol, TokenMapping},
    bigdecimal::BigDecimal,
    reqwest::Client,
    serde::Deserialize,
    std::{collections::HashMap, str::FromStr, sync::Arc},
    url::Url,
};

/// Fetches the current USD prices of token symbols. Symbols the source has no
/// quote for are missing from the result.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait PriceReading: Send + Sync + 'static {
    async fn fetch_prices(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<Symbol, BigDecimal>, Error>;
}

#[derive(Debug, Deserialize)]
struct Response(HashMap<String, Price>);

#[derive(Debug, Deserialize)]
struct Price {
    usd: Option<f64>,
}

pub struct CoinGecko {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    mapping: Arc<TokenMapping>,
}

impl CoinGecko {
    /// Authorization header for CoinGecko
    const AUTHORIZATION: &'static str = "x-cg-pro-api-key";

    /// `client` is expected to be configured with the upstream request
    /// timeout.
    pub fn new(
        client: Client,
        base_url: Url,
        api_key: Option<String>,
        mapping: Arc<TokenMapping>,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            mapping,
        }
    }

    fn url(&self, ids: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.join("simple/price")?;
        url.query_pairs_mut()
            .append_pair("ids", &ids.join(","))
            .append_pair("vs_currencies", "usd")
            .append_pair("precision", "full");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl PriceReading for CoinGecko {
    async fn fetch_prices(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<Symbol, BigDecimal>, Error> {
        let ids = symbols
            .iter()
            .filter_map(|symbol| self.mapping.id(symbol))
            .collect::<Vec<_>>();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = self.url(&ids)?;
        let mut builder = self.client.get(url.clone());
        if let Some(ref api_key) = self.api_key {
            builder = builder.header(Self::AUTHORIZATION, api_key)
        }
        observe::coingecko_request(&url);
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            observe::coingecko_status(&url, status.as_u16());
            return Err(Error::Status(status.as_u16()));
        }
        let body = response.text().await;
        observe::coingecko_response(&url, body.as_ref().map(String::as_str));
        parse(&self.mapping, symbols, &body?)
    }
}

/// Extracts the quotes of `symbols` from a `simple/price` response body.
fn parse(
    mapping: &TokenMapping,
    symbols: &[Symbol],
    body: &str,
) -> Result<HashMap<Symbol, BigDecimal>, Error> {
    let Response(mut quotes) = serde_json::from_str(body)?;
    let mut prices = HashMap::new();
    for symbol in symbols {
        let Some(id) = mapping.id(symbol) else {
            continue;
        };
        let Some(usd) = quotes.remove(id).and_then(|price| price.usd) else {
            continue;
        };
        let price = BigDecimal::from_str(&usd.to_string())
            .map_err(|_| Error::InvalidPrice(symbol.clone(), usd))?;
        prices.insert(symbol.clone(), price);
    }
    Ok(prices)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid price API URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("price API request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("price API returned non-success status code {0}")]
    Status(u16),
    #[error("failed to parse price API response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("price API returned unusable price {1} for {0}")]
    InvalidPrice(Symbol, f64),
}

mod observe {
    use url::Url;

    /// Observe a request to be sent to CoinGecko
    pub(super) fn coingecko_request(endpoint: &Url) {
        tracing::trace!(%endpoint, "sending request to CoinGecko");
    }

    /// Observe that CoinGecko rejected a request
    pub(super) fn coingecko_status(endpoint: &Url, status: u16) {
        tracing::warn!(%endpoint, status, "CoinGecko returned non-success status code");
    }

    /// Observe that a response was received from CoinGecko
    pub(super) fn coingecko_response(endpoint: &Url, res: Result<&str, &reqwest::Error>) {
        match res {
            Ok(res) => {
                tracing::trace!(%endpoint, ?res, "received response from CoinGecko")
            }
            Err(err) => {
                tracing::warn!(%endpoint, ?err, "failed to receive response from CoinGecko")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        axum::{
            Json,
            Router,
            extract::Query,
            http::{HeaderMap, StatusCode},
            routing::get,
        },
        serde_json::json,
    };

    fn mapping() -> Arc<TokenMapping> {
        Arc::new(TokenMapping::new([
            (Symbol::new("ETH"), "ethereum".to_string()),
            (Symbol::new("USDC"), "usd-coin".to_string()),
            (Symbol::new("CLONES"), "clones".to_string()),
        ]))
    }

    fn symbols() -> Vec<Symbol> {
        mapping().symbols().cloned().collect()
    }

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    /// Serves `router` on an ephemeral local port and returns its base URL.
    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}/api/v3/").parse().unwrap()
    }

    #[test]
    fn parses_partial_responses() {
        let body = r#"{
            "ethereum": {"usd": 3120.55},
            "usd-coin": {"usd": 0.9998},
            "clones": {}
        }"#;
        let prices = parse(&mapping(), &symbols(), body).unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[&Symbol::new("ETH")], dec("3120.55"));
        assert_eq!(prices[&Symbol::new("USDC")], dec("0.9998"));
        assert!(!prices.contains_key(&Symbol::new("CLONES")));
    }

    #[test]
    fn ignores_unrequested_ids() {
        let body = r#"{"ethereum": {"usd": 1.5}, "bitcoin": {"usd": 60000}}"#;
        let prices = parse(&mapping(), &[Symbol::new("ETH")], body).unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[&Symbol::new("ETH")], dec("1.5"));
    }

    #[test]
    fn small_prices_keep_their_digits() {
        let body = r#"{"clones": {"usd": 0.00001234}}"#;
        let prices = parse(&mapping(), &[Symbol::new("CLONES")], body).unwrap();
        assert_eq!(prices[&Symbol::new("CLONES")], dec("0.00001234"));
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert!(matches!(
            parse(&mapping(), &symbols(), "<html>rate limited</html>"),
            Err(Error::Parse(_))
        ));
    }

    #[tokio::test]
    async fn fetches_all_ids_in_one_request() {
        async fn handler(
            Query(query): Query<HashMap<String, String>>,
            headers: HeaderMap,
        ) -> Json<serde_json::Value> {
            assert_eq!(query["ids"], "clones,ethereum,usd-coin");
            assert_eq!(query["vs_currencies"], "usd");
            assert_eq!(headers[CoinGecko::AUTHORIZATION], "secret");
            Json(json!({
                "ethereum": {"usd": 3120.55},
                "usd-coin": {"usd": 1.0}
            }))
        }

        let base_url = serve(Router::new().route("/api/v3/simple/price", get(handler))).await;
        let coingecko = CoinGecko::new(
            Client::new(),
            base_url,
            Some("secret".to_string()),
            mapping(),
        );

        let prices = coingecko.fetch_prices(&symbols()).await.unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[&Symbol::new("ETH")], dec("3120.55"));
        assert_eq!(prices[&Symbol::new("USDC")], dec("1"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let base_url = serve(Router::new().route(
            "/api/v3/simple/price",
            get(|| async { StatusCode::TOO_MANY_REQUESTS }),
        ))
        .await;
        let coingecko = CoinGecko::new(Client::new(), base_url, None, mapping());

        assert!(matches!(
            coingecko.fetch_prices(&symbols()).await,
            Err(Error::Status(429))
        ));
    }
}
