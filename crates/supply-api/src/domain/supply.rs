//! Total and circulating supply of the tracked token.
//!
//! Circulating supply is the total supply minus the balances held by the
//! configured burn and locked addresses. Both figures are derived from the
//! same on-chain reads and are always served together.

use {
    crate::infra::{
        blockchain::{self, ChainReading, ScalarField},
        observe,
    },
    alloy::primitives::{Address, U256},
    bigdecimal::BigDecimal,
    chrono::{DateTime, Utc},
    freshness_cache::{Cached, Clock, FreshnessCache},
    number::{u256_ext::U256Ext, units},
    std::sync::Arc,
};

/// Supply figures computed from one set of chain reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupplyRecord {
    pub total_supply: BigDecimal,
    pub circulating_supply: BigDecimal,
    pub decimals: u8,
    pub computed_at: DateTime<Utc>,
}

/// Holders whose balances don't count towards the circulating supply.
#[derive(Clone, Debug, Default)]
pub struct AddressLists {
    pub burn: Vec<Address>,
    pub locked: Vec<Address>,
}

impl AddressLists {
    /// Burn addresses followed by locked addresses. An address listed in
    /// both is only counted once.
    pub fn excluded(&self) -> Vec<Address> {
        let mut excluded = Vec::with_capacity(self.burn.len() + self.locked.len());
        for address in self.burn.iter().chain(&self.locked) {
            if !excluded.contains(address) {
                excluded.push(*address);
            }
        }
        excluded
    }
}

/// Computes [`SupplyRecord`]s from raw chain reads.
#[derive(Clone)]
pub struct Aggregator {
    reader: Arc<dyn ChainReading>,
    token: Address,
    addresses: AddressLists,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    pub fn new(
        reader: Arc<dyn ChainReading>,
        token: Address,
        addresses: AddressLists,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reader,
            token,
            addresses,
            clock,
        }
    }

    pub async fn compute_supply(&self) -> Result<SupplyRecord, Error> {
        observe::computing_supply(self.token);
        let result = self.read_supply().await;
        match &result {
            Ok(record) => observe::computed_supply(record),
            Err(err) => observe::computing_supply_failed(err),
        }
        result
    }

    async fn read_supply(&self) -> Result<SupplyRecord, Error> {
        let fields = self
            .reader
            .read_scalar_fields(
                self.token,
                &[ScalarField::TotalSupply, ScalarField::Decimals],
            )
            .await?;
        let [total_raw, decimals]: [U256; 2] = fields
            .try_into()
            .map_err(|fields: Vec<U256>| Error::UnexpectedLength(fields.len()))?;
        let decimals = u8::try_from(decimals).map_err(|_| Error::InvalidDecimals(decimals))?;

        let excluded = self.addresses.excluded();
        let balances = self.reader.batch_balance_of(self.token, &excluded).await?;
        if balances.len() != excluded.len() {
            return Err(Error::UnexpectedLength(balances.len()));
        }
        let excluded_raw = U256::checked_sum(&balances).ok_or(Error::Overflow)?;
        let circulating_raw = total_raw
            .checked_sub(excluded_raw)
            .ok_or(Error::ExcludedExceedsTotal {
                total: total_raw,
                excluded: excluded_raw,
            })?;

        Ok(SupplyRecord {
            total_supply: units::from_raw(total_raw, decimals),
            circulating_supply: units::from_raw(circulating_raw, decimals),
            decimals,
            computed_at: self.clock.now(),
        })
    }
}

/// Cached access to the current [`SupplyRecord`].
#[derive(Clone)]
pub struct Supply {
    aggregator: Aggregator,
    cache: FreshnessCache<SupplyRecord>,
}

impl Supply {
    pub fn new(aggregator: Aggregator, cache: FreshnessCache<SupplyRecord>) -> Self {
        Self { aggregator, cache }
    }

    pub async fn get(&self) -> Result<Cached<SupplyRecord>, freshness_cache::Error> {
        let aggregator = self.aggregator.clone();
        self.cache
            .get(move || async move {
                aggregator
                    .compute_supply()
                    .await
                    .map_err(anyhow::Error::from)
            })
            .await
    }

    /// Populates the cache in the background so the first request doesn't
    /// have to wait on the node.
    pub fn warm_up(&self) {
        let supply = self.clone();
        tokio::spawn(async move {
            match supply.get().await {
                Ok(_) => tracing::info!("supply cache warmed up"),
                Err(err) => tracing::warn!(?err, "failed to warm up supply cache"),
            }
        });
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Blockchain(#[from] blockchain::Error),
    #[error("token reports {0} decimals")]
    InvalidDecimals(U256),
    #[error("chain reader returned {0} results for the batch")]
    UnexpectedLength(usize),
    #[error("sum of excluded balances overflows")]
    Overflow,
    #[error("excluded balances {excluded} exceed total supply {total}")]
    ExcludedExceedsTotal { total: U256, excluded: U256 },
}
