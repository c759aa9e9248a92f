//! Parsing and defaults for the values configured at start-up.

use {
    crate::domain::{Symbol, TokenMapping},
    alloy::primitives::{Address, address},
    std::fmt::{self, Display, Formatter},
};

/// The CLONES token on Base.
pub const TOKEN: Address = address!("0xaadd98Ad4660008C917C6FE7286Bc54b2eEF894d");

pub const BURN_ADDRESSES: [Address; 2] = [
    Address::ZERO,
    address!("0x000000000000000000000000000000000000dEaD"),
];

/// Team, vesting and treasury wallets.
pub const LOCKED_ADDRESSES: [Address; 5] = [
    // KOLs
    address!("0xe2326bB154053cF3A96BC3484e9f2c4D12cA445F"),
    // Team
    address!("0x15FecCC979828DE7aF82ec1f4672d519cF1b7F09"),
    // Marketing
    address!("0xCA5996B9447c092458D46eb143b8E9c332F65C76"),
    // Rewards
    address!("0x750FF2F710FbB1Aa08E4C69e0F96Ea4b39eA2299"),
    // Sablier team vesting
    address!("0xb5d78dd3276325f5faf3106cc4acc56e28e0fe3b"),
];

pub const PRICE_TOKENS: &str = "ETH=ethereum,USDC=usd-coin,CLONES=clones";

/// Deployment environment. Development disables the API key gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Development => f.write_str("development"),
        }
    }
}

/// Parses a comma separated list of `SYMBOL=id` pairs. Symbols are
/// case-insensitive.
pub fn parse_token_mapping(value: &str) -> Result<TokenMapping, Error> {
    let mut entries = Vec::new();
    for pair in value.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let (symbol, id) = pair
            .split_once('=')
            .ok_or_else(|| Error::MalformedMapping(pair.to_owned()))?;
        let (symbol, id) = (Symbol::new(symbol), id.trim());
        if symbol.as_str().is_empty() || id.is_empty() {
            return Err(Error::MalformedMapping(pair.to_owned()));
        }
        if entries.iter().any(|(existing, _)| *existing == symbol) {
            return Err(Error::DuplicateSymbol(symbol));
        }
        entries.push((symbol, id.to_owned()));
    }
    if entries.is_empty() {
        return Err(Error::EmptyMapping);
    }
    Ok(TokenMapping::new(entries))
}

pub fn display_secret_option<T>(
    f: &mut Formatter<'_>,
    name: &str,
    option: &Option<T>,
) -> fmt::Result {
    display_option(f, name, &option.as_ref().map(|_| "SECRET"))
}

pub fn display_option(
    f: &mut Formatter<'_>,
    name: &str,
    option: &Option<impl Display>,
) -> fmt::Result {
    write!(f, "{name}: ")?;
    match option {
        Some(display) => writeln!(f, "{display}"),
        None => writeln!(f, "None"),
    }
}

pub fn display_list<T: Display>(
    f: &mut Formatter<'_>,
    name: &str,
    items: impl IntoIterator<Item = T>,
) -> fmt::Result {
    let items = items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>();
    writeln!(f, "{name}: [{}]", items.join(", "))
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed token mapping entry {0:?}, expected SYMBOL=id")]
    MalformedMapping(String),
    #[error("symbol {0} is mapped more than once")]
    DuplicateSymbol(Symbol),
    #[error("token mapping is empty")]
    EmptyMapping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_mapping() {
        let mapping = parse_token_mapping(PRICE_TOKENS).unwrap();
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.id(&Symbol::new("eth")), Some("ethereum"));
        assert_eq!(mapping.id(&Symbol::new("USDC")), Some("usd-coin"));
        assert_eq!(mapping.id(&Symbol::new("Clones")), Some("clones"));
    }

    #[test]
    fn tolerates_whitespace_and_trailing_commas() {
        let mapping = parse_token_mapping(" eth = ethereum , ").unwrap();
        assert_eq!(mapping.id(&Symbol::new("ETH")), Some("ethereum"));
    }

    #[test]
    fn rejects_malformed_mappings() {
        assert!(matches!(
            parse_token_mapping("ETH"),
            Err(Error::MalformedMapping(_))
        ));
        assert!(matches!(
            parse_token_mapping("=ethereum"),
            Err(Error::MalformedMapping(_))
        ));
        assert!(matches!(
            parse_token_mapping("ETH=ethereum,eth=weth"),
            Err(Error::DuplicateSymbol(_))
        ));
        assert!(matches!(parse_token_mapping(""), Err(Error::EmptyMapping)));
    }

    #[test]
    fn default_addresses_are_distinct() {
        let all = BURN_ADDRESSES
            .iter()
            .chain(&LOCKED_ADDRESSES)
            .collect::<std::collections::HashSet<_>>();
        assert_eq!(all.len(), 7);
    }
}
