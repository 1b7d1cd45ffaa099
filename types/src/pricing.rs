use crate::constants::{ENERGY_BASE_PRICE, MULTITAP_BASE_PRICE, PRICE_GROWTH};

/// Repeatable upgrades with an exponential price curve. The skin is a flat
/// one-time purchase and does not go through this curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpgradeKind {
    MultiTap,
    Energy,
}

impl UpgradeKind {
    fn base_price(self) -> u64 {
        match self {
            Self::MultiTap => MULTITAP_BASE_PRICE,
            Self::Energy => ENERGY_BASE_PRICE,
        }
    }
}

/// Price of buying the next level of `kind` while holding `owned_level`.
/// `floor(base * growth^(owned_level - 1))`, floored to whole coins.
///
/// Pure and total: levels below 1 are treated as level 1.
pub fn upgrade_price(kind: UpgradeKind, owned_level: u32) -> u64 {
    let level = owned_level.max(1);
    let price = kind.base_price() as f64 * PRICE_GROWTH.powi(level as i32 - 1);
    price.floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_one_costs_the_base_price() {
        assert_eq!(upgrade_price(UpgradeKind::MultiTap, 1), 100);
        assert_eq!(upgrade_price(UpgradeKind::Energy, 1), 200);
    }

    #[test]
    fn level_zero_is_clamped_to_level_one() {
        assert_eq!(upgrade_price(UpgradeKind::MultiTap, 0), 100);
    }

    #[test]
    fn prices_are_strictly_increasing() {
        for kind in [UpgradeKind::MultiTap, UpgradeKind::Energy] {
            let mut previous = 0;
            for level in 1..=40 {
                let price = upgrade_price(kind, level);
                assert!(
                    price > previous,
                    "price at level {level} did not increase: {price} <= {previous}"
                );
                previous = price;
            }
        }
    }

    #[test]
    fn prices_are_whole_coins() {
        for level in 1..=40 {
            let price = upgrade_price(UpgradeKind::MultiTap, level);
            let raw = 100.0 * PRICE_GROWTH.powi(level as i32 - 1);
            assert_eq!(price, raw.floor() as u64);
        }
    }
}
