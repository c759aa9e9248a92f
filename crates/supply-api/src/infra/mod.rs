pub mod api;
pub mod blockchain;
pub mod cli;
pub mod config;
pub mod observe;
pub mod prices;

pub use {api::Api, blockchain::Ethereum, prices::CoinGecko};
