//! Legal VAT rate tables per fiscal region.
//!
//! Three regions, three non-zero tiers each. These values are fixed by law;
//! the pipeline never guesses or configures them.

use rust_decimal::Decimal;

use crate::models::invoice::{FiscalRegion, VatTier};

/// The three non-zero VAT rates of one fiscal region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VatRates {
    pub reduced: Decimal,
    pub intermediate: Decimal,
    pub standard: Decimal,
}

impl VatRates {
    /// Rate table for a fiscal region.
    pub fn for_region(region: FiscalRegion) -> Self {
        match region {
            FiscalRegion::Mainland => Self {
                reduced: Decimal::new(6, 2),
                intermediate: Decimal::new(13, 2),
                standard: Decimal::new(23, 2),
            },
            FiscalRegion::Azores => Self {
                reduced: Decimal::new(4, 2),
                intermediate: Decimal::new(9, 2),
                standard: Decimal::new(16, 2),
            },
            FiscalRegion::Madeira => Self {
                reduced: Decimal::new(5, 2),
                intermediate: Decimal::new(12, 2),
                standard: Decimal::new(22, 2),
            },
        }
    }

    /// Rate for a tier.
    pub fn rate(&self, tier: VatTier) -> Decimal {
        match tier {
            VatTier::Reduced => self.reduced,
            VatTier::Intermediate => self.intermediate,
            VatTier::Standard => self.standard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainland_rates() {
        let rates = VatRates::for_region(FiscalRegion::Mainland);
        assert_eq!(rates.rate(VatTier::Reduced), Decimal::new(6, 2));
        assert_eq!(rates.rate(VatTier::Intermediate), Decimal::new(13, 2));
        assert_eq!(rates.rate(VatTier::Standard), Decimal::new(23, 2));
    }

    #[test]
    fn test_island_rates_lower_than_mainland() {
        let mainland = VatRates::for_region(FiscalRegion::Mainland);
        for region in [FiscalRegion::Azores, FiscalRegion::Madeira] {
            let rates = VatRates::for_region(region);
            for tier in VatTier::ALL {
                assert!(rates.rate(tier) < mainland.rate(tier));
            }
        }
    }
}
