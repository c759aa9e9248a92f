//! Supply and price figures as the API reports them, independent of where
//! the raw data comes from.

pub mod price;
pub mod supply;

pub use {
    price::{PriceRecord, Prices, Symbol, TokenMapping},
    supply::{AddressLists, Aggregator, Supply, SupplyRecord},
};
