use {
    crate::u256_ext::U256Ext,
    alloy::primitives::U256,
    bigdecimal::BigDecimal,
    num::{BigInt, Signed},
};

/// Converts an amount in the smallest unit of a token into the exact decimal
/// token amount, i.e. `raw * 10^-decimals`.
pub fn from_raw(raw: U256, decimals: u8) -> BigDecimal {
    BigDecimal::new(raw.to_big_int(), i64::from(decimals))
}

/// Formats a decimal without exponent notation and without trailing zeros
/// in the fractional part: `1000000.500` becomes `1000000.5`, `1e6` becomes
/// `1000000`.
pub fn to_plain_string(value: &BigDecimal) -> String {
    let (digits, scale) = value.normalized().as_bigint_and_exponent();
    if scale <= 0 {
        let factor = BigInt::from(10).pow(scale.unsigned_abs() as u32);
        return (digits * factor).to_string();
    }

    let negative = digits.is_negative();
    let mut magnitude = digits.abs().to_string();
    let scale = scale as usize;
    if magnitude.len() <= scale {
        magnitude = format!("{}{magnitude}", "0".repeat(scale - magnitude.len() + 1));
    }
    let (integer, fraction) = magnitude.split_at(magnitude.len() - scale);
    format!("{}{integer}.{fraction}", if negative { "-" } else { "" })
}

/// Lossy conversion for wire formats that only carry IEEE-754 numbers.
/// Rounds to the nearest representable value.
pub fn to_f64_lossy(value: &BigDecimal) -> f64 {
    to_plain_string(value).parse().unwrap_or(f64::NAN)
}
