//! USD prices of the supported token symbols.

use {
    crate::infra::{observe, prices::PriceReading},
    bigdecimal::BigDecimal,
    chrono::{DateTime, Utc},
    freshness_cache::{Clock, FreshnessCache},
    std::{
        collections::{BTreeMap, HashMap},
        fmt,
        sync::Arc,
    },
};

/// An upper-cased token ticker symbol.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(symbol: &str) -> Self {
        Self(symbol.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps supported symbols to the identifiers the price source knows them by.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenMapping(BTreeMap<Symbol, String>);

impl TokenMapping {
    pub fn new(entries: impl IntoIterator<Item = (Symbol, String)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn id(&self, symbol: &Symbol) -> Option<&str> {
        self.0.get(symbol).map(String::as_str)
    }

    /// Supported symbols in sorted order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &str)> {
        self.0.iter().map(|(symbol, id)| (symbol, id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Prices of every symbol the source quoted in one fetch. Symbols the source
/// didn't quote are absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceRecord {
    pub prices: HashMap<Symbol, BigDecimal>,
    pub computed_at: DateTime<Utc>,
}

/// The price of a single symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: BigDecimal,
    pub computed_at: DateTime<Utc>,
}

/// Cached access to the current [`PriceRecord`].
#[derive(Clone)]
pub struct Prices {
    reader: Arc<dyn PriceReading>,
    mapping: Arc<TokenMapping>,
    cache: FreshnessCache<PriceRecord>,
    clock: Arc<dyn Clock>,
}

impl Prices {
    pub fn new(
        reader: Arc<dyn PriceReading>,
        mapping: Arc<TokenMapping>,
        cache: FreshnessCache<PriceRecord>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reader,
            mapping,
            cache,
            clock,
        }
    }

    /// Normalizes `symbol` and checks that it is supported. Never touches the
    /// upstream source.
    pub fn validate(&self, symbol: &str) -> Result<Symbol, LookupError> {
        let symbol = Symbol::new(symbol);
        match self.mapping.id(&symbol) {
            Some(_) => Ok(symbol),
            None => Err(LookupError::Unsupported {
                symbol,
                supported: self.mapping.symbols().cloned().collect(),
            }),
        }
    }

    pub async fn all(&self) -> Result<Arc<PriceRecord>, freshness_cache::Error> {
        let reader = self.reader.clone();
        let symbols = self.mapping.symbols().cloned().collect::<Vec<_>>();
        let clock = self.clock.clone();
        let cached = self
            .cache
            .get(move || async move {
                match reader.fetch_prices(&symbols).await {
                    Ok(prices) => {
                        let record = PriceRecord {
                            prices,
                            computed_at: clock.now(),
                        };
                        observe::fetched_prices(&record);
                        Ok(record)
                    }
                    Err(err) => {
                        observe::fetching_prices_failed(&err);
                        Err(anyhow::Error::from(err))
                    }
                }
            })
            .await?;
        Ok(cached.value)
    }

    pub async fn price(&self, symbol: &str) -> Result<Quote, LookupError> {
        let symbol = self.validate(symbol)?;
        let record = self.all().await?;
        match record.prices.get(&symbol) {
            Some(price) => Ok(Quote {
                symbol,
                price: price.clone(),
                computed_at: record.computed_at,
            }),
            None => Err(LookupError::NotQuoted(symbol)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("unsupported symbol {symbol}")]
    Unsupported {
        symbol: Symbol,
        supported: Vec<Symbol>,
    },
    #[error("no price available for {0}")]
    NotQuoted(Symbol),
    #[error(transparent)]
    Upstream(#[from] freshness_cache::Error),
}
