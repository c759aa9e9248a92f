//! Extension trait for U256 conversions and arithmetic.

use {
    alloy::primitives::U256,
    num::{BigInt, BigUint, bigint::Sign},
};

/// Extension trait for U256 to add utility methods.
pub trait U256Ext: Sized {
    /// Convert to BigInt.
    fn to_big_int(&self) -> BigInt;

    /// Convert to BigUint.
    fn to_big_uint(&self) -> BigUint;

    /// Sums all values, returning `None` on overflow.
    fn checked_sum<'a>(values: impl IntoIterator<Item = &'a Self>) -> Option<Self>
    where
        Self: 'a;
}

impl U256Ext for U256 {
    fn to_big_int(&self) -> BigInt {
        BigInt::from_biguint(Sign::Plus, self.to_big_uint())
    }

    fn to_big_uint(&self) -> BigUint {
        BigUint::from_bytes_be(self.to_be_bytes::<32>().as_slice())
    }

    fn checked_sum<'a>(values: impl IntoIterator<Item = &'a Self>) -> Option<Self> {
        values
            .into_iter()
            .try_fold(U256::ZERO, |sum, value| sum.checked_add(*value))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, num::Zero, std::str::FromStr};

    #[test]
    fn u256_to_big_uint() {
        assert_eq!(U256::ZERO.to_big_uint(), BigUint::zero());
        assert_eq!(
            U256::MAX.to_big_uint(),
            BigUint::from_str(
                "115792089237316195423570985008687907853269984665640564039457584007913129639935"
            )
            .unwrap()
        );
    }

    #[test]
    fn u256_to_big_int() {
        assert_eq!(U256::from(1337u64).to_big_int(), BigInt::from(1337));
        assert_eq!(U256::MAX.to_big_int().sign(), Sign::Plus);
    }

    #[test]
    fn sums_until_overflow() {
        let values = [U256::from(1), U256::from(2), U256::from(3)];
        assert_eq!(U256::checked_sum(&values), Some(U256::from(6)));
        assert_eq!(U256::checked_sum(&[]), Some(U256::ZERO));
        assert_eq!(U256::checked_sum(&[U256::MAX, U256::from(1)]), None);
    }
}
