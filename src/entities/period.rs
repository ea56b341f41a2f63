// 📅 Period Entity - Immutable snapshot of one reporting interval
//
// A period freezes the partner contributions at the moment it was recorded,
// together with the reported account value and everything derived from it.
// Once created it is never edited, only deleted.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// PARTNER ALLOCATION (embedded in Period)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerAllocation {
    pub name: String,

    /// Contribution at snapshot time
    pub contribution: Decimal,

    /// Ownership share in percent (0-100)
    pub ownership: Decimal,

    /// Share of the period's profit/loss
    pub allocation: Decimal,

    /// contribution + allocation
    pub balance: Decimal,
}

// ============================================================================
// PERIOD ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    /// Creation timestamp in milliseconds, unique and creation-ordered
    pub id: i64,

    pub date: NaiveDate,

    /// Reported total account value
    pub total_value: Decimal,

    pub total_contributions: Decimal,
    pub management_fee: Decimal,
    pub net_value: Decimal,
    pub profit_loss: Decimal,

    #[serde(default)]
    pub notes: String,

    /// One entry per partner, in roster order
    pub partners: Vec<PartnerAllocation>,
}

impl Period {
    /// Profit/loss as a percentage of contributed capital; 0 when there is
    /// no capital or the ratio does not fit a Decimal
    pub fn return_pct(&self) -> Decimal {
        if self.total_contributions.is_zero() {
            return Decimal::ZERO;
        }
        self.profit_loss
            .checked_div(self.total_contributions)
            .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_profitable(&self) -> bool {
        self.profit_loss >= Decimal::ZERO
    }

    pub fn allocation_for(&self, name: &str) -> Option<&PartnerAllocation> {
        self.partners.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn create_test_period(total_contributions: Decimal, profit_loss: Decimal) -> Period {
        Period {
            id: 1_700_000_000_000,
            date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            total_value: total_contributions + profit_loss,
            total_contributions,
            management_fee: Decimal::ZERO,
            net_value: total_contributions + profit_loss,
            profit_loss,
            notes: String::new(),
            partners: vec![PartnerAllocation {
                name: "Desmond Leahy".to_string(),
                contribution: total_contributions,
                ownership: dec!(100),
                allocation: profit_loss,
                balance: total_contributions + profit_loss,
            }],
        }
    }

    #[test]
    fn test_return_pct() {
        let period = create_test_period(dec!(5000), dec!(250));
        assert_eq!(period.return_pct(), dec!(5));
        assert!(period.is_profitable());

        let period = create_test_period(dec!(5000), dec!(-500));
        assert_eq!(period.return_pct(), dec!(-10));
        assert!(!period.is_profitable());
    }

    #[test]
    fn test_return_pct_without_capital() {
        let period = create_test_period(Decimal::ZERO, dec!(10));
        assert_eq!(period.return_pct(), Decimal::ZERO);
    }

    #[test]
    fn test_return_pct_that_cannot_be_represented() {
        let period = create_test_period(dec!(0.0000000001), dec!(70000000000000000000000000000));
        assert_eq!(period.return_pct(), Decimal::ZERO);
    }

    #[test]
    fn test_serialized_field_names() {
        let period = create_test_period(dec!(1000), dec!(10));
        let json = serde_json::to_value(&period).unwrap();

        assert!(json.get("totalValue").is_some());
        assert!(json.get("totalContributions").is_some());
        assert!(json.get("managementFee").is_some());
        assert!(json.get("profitLoss").is_some());
        assert_eq!(json["date"], "2025-01-31");
    }

    #[test]
    fn test_allocation_for() {
        let period = create_test_period(dec!(1000), dec!(10));
        assert!(period.allocation_for("Desmond Leahy").is_some());
        assert!(period.allocation_for("Nobody").is_none());
    }
}
