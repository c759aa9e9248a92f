//! Conversions between on-chain integer amounts and exact decimal numbers.

pub mod u256_ext;
pub mod units;
