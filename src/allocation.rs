// 📊 Allocation Engine - Split a period's P&L across partners
//
// Following the formula:
//   management_fee = total_value × annual_rate / 12
//   net_value      = total_value − management_fee
//   profit_loss    = net_value − total_contributions
//   ownership_i    = contribution_i / total_contributions × 100
//   allocation_i   = profit_loss × ownership_i / 100
//   balance_i      = contribution_i + allocation_i
//
// Pure arithmetic over Decimal: no I/O, no clock, the partner list is never
// mutated. Either a complete Period comes out or an error does.

use crate::entities::{Partner, PartnerAllocation, Period};
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Annual management fee rate (2%)
pub const DEFAULT_FEE_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// Fee is charged monthly out of an annual rate
const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

/// Shown when a period can't be recorded for lack of value or capital
pub const MISSING_INPUTS_MESSAGE: &str =
    "Please enter partner contributions and total account value";

// ============================================================================
// OWNERSHIP
// ============================================================================

/// Shown when an amount, or a figure derived from it, exceeds what a Decimal holds
pub const AMOUNT_TOO_LARGE_MESSAGE: &str = "Amount is too large";

fn too_large() -> LedgerError {
    LedgerError::validation(AMOUNT_TOO_LARGE_MESSAGE)
}

/// Sum of all partner contributions
pub fn total_contributions(partners: &[Partner]) -> Result<Decimal> {
    partners
        .iter()
        .try_fold(Decimal::ZERO, |total, p| total.checked_add(p.contribution))
        .ok_or_else(too_large)
}

/// Validate a roster before it becomes ledger state: no negative
/// contribution, and a total that fits. Returns the total.
pub fn check_roster(partners: &[Partner]) -> Result<Decimal> {
    if let Some(p) = partners.iter().find(|p| p.contribution < Decimal::ZERO) {
        return Err(LedgerError::validation(format!(
            "Contribution for {} cannot be negative",
            p.name
        )));
    }
    total_contributions(partners)
}

/// Ownership share in percent; 0 for everyone while the fund holds no capital.
///
/// A contribution never exceeds a non-negative total, so the share is at most
/// 100. Inputs outside that range that cannot be represented also give 0.
pub fn compute_ownership(contribution: Decimal, total_contributions: Decimal) -> Decimal {
    if total_contributions.is_zero() {
        return Decimal::ZERO;
    }
    contribution
        .checked_div(total_contributions)
        .and_then(|share| share.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

// ============================================================================
// PERIOD INPUT
// ============================================================================

/// What the partner types into the "record period" form
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodInput {
    pub id: i64,
    pub date: NaiveDate,
    pub total_value: Decimal,
    pub notes: String,
}

// ============================================================================
// ALLOCATION ENGINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationEngine {
    /// Annual management fee rate (0.02 = 2%)
    pub fee_rate: Decimal,
}

impl Default for AllocationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_FEE_RATE)
    }
}

impl AllocationEngine {
    pub fn new(fee_rate: Decimal) -> Self {
        Self { fee_rate }
    }

    /// Monthly proration of the annual fee
    pub fn management_fee(&self, total_value: Decimal) -> Result<Decimal> {
        total_value
            .checked_mul(self.fee_rate)
            .and_then(|annual| annual.checked_div(MONTHS_PER_YEAR))
            .ok_or_else(too_large)
    }

    /// Snapshot the partners into a new period.
    ///
    /// Rejects the period when no account value was reported, the fund
    /// holds no capital yet, or any figure would overflow.
    pub fn record_period(&self, partners: &[Partner], input: PeriodInput) -> Result<Period> {
        let total_contributions = check_roster(partners)?;

        if input.total_value <= Decimal::ZERO || total_contributions.is_zero() {
            return Err(LedgerError::validation(MISSING_INPUTS_MESSAGE));
        }

        let management_fee = self.management_fee(input.total_value)?;
        let net_value = input
            .total_value
            .checked_sub(management_fee)
            .ok_or_else(too_large)?;
        let profit_loss = net_value
            .checked_sub(total_contributions)
            .ok_or_else(too_large)?;

        // Return % is derived on display; refuse periods where it can't be
        profit_loss
            .checked_div(total_contributions)
            .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or_else(too_large)?;

        let allocations = partners
            .iter()
            .map(|p| {
                // share <= 1, so |allocation| <= |profit_loss|
                let share = p
                    .contribution
                    .checked_div(total_contributions)
                    .ok_or_else(too_large)?;
                let ownership = share.checked_mul(Decimal::ONE_HUNDRED).ok_or_else(too_large)?;
                let allocation = profit_loss.checked_mul(share).ok_or_else(too_large)?;
                let balance = p.contribution.checked_add(allocation).ok_or_else(too_large)?;

                Ok(PartnerAllocation {
                    name: p.name.clone(),
                    contribution: p.contribution,
                    ownership,
                    allocation,
                    balance,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Period {
            id: input.id,
            date: input.date,
            total_value: input.total_value,
            total_contributions,
            management_fee,
            net_value,
            profit_loss,
            notes: input.notes,
            partners: allocations,
        })
    }
}

// ============================================================================
// SUMMARY (header cards)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    /// Sum of current contributions
    pub total_capital: Decimal,

    /// Partners with contribution > 0
    pub active_partners: usize,

    /// Profit/loss of the most recent period
    pub latest_profit_loss: Option<Decimal>,
}

pub fn summarize(partners: &[Partner], periods: &[Period]) -> Result<LedgerSummary> {
    Ok(LedgerSummary {
        total_capital: total_contributions(partners)?,
        active_partners: partners.iter().filter(|p| p.is_active()).count(),
        latest_profit_loss: periods.last().map(|p| p.profit_loss),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn create_partners(contributions: &[Decimal]) -> Vec<Partner> {
        contributions
            .iter()
            .enumerate()
            .map(|(i, c)| Partner::new(i as u32 + 1, format!("Partner {}", i + 1)).with_contribution(*c))
            .collect()
    }

    fn create_input(total_value: Decimal) -> PeriodInput {
        PeriodInput {
            id: 1,
            date: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            total_value,
            notes: "Quarter end".to_string(),
        }
    }

    fn approx_eq(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.0000001)
    }

    #[test]
    fn test_default_fee_rate() {
        assert_eq!(DEFAULT_FEE_RATE, dec!(0.02));
        assert_eq!(AllocationEngine::default().fee_rate, dec!(0.02));
    }

    #[test]
    fn test_ownership_zero_total() {
        assert_eq!(compute_ownership(dec!(100), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(compute_ownership(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_ownership_sums_to_hundred() {
        let splits: [&[Decimal]; 4] = [
            &[dec!(1), dec!(1), dec!(1)],
            &[dec!(1000), dec!(2000), dec!(2000)],
            &[dec!(0), dec!(333.33), dec!(0.01), dec!(7)],
            &[dec!(12345.67), dec!(0.5), dec!(98765.43), dec!(1), dec!(3)],
        ];

        for split in splits {
            let partners = create_partners(split);
            let total = total_contributions(&partners).unwrap();
            let sum: Decimal = partners
                .iter()
                .map(|p| compute_ownership(p.contribution, total))
                .sum();

            assert!(approx_eq(sum, dec!(100)), "ownership sum {} for {:?}", sum, split);
        }
    }

    #[test]
    fn test_reference_example() {
        let engine = AllocationEngine::default();
        let partners = create_partners(&[dec!(1000), dec!(2000), dec!(2000)]);

        let period = engine.record_period(&partners, create_input(dec!(5500))).unwrap();

        assert_eq!(period.total_contributions, dec!(5000));
        assert_eq!(period.management_fee.round_dp(4), dec!(9.1667));
        assert_eq!(period.net_value.round_dp(4), dec!(5490.8333));
        assert_eq!(period.profit_loss.round_dp(4), dec!(490.8333));

        let ownership: Vec<Decimal> = period.partners.iter().map(|p| p.ownership).collect();
        assert_eq!(ownership, vec![dec!(20), dec!(40), dec!(40)]);

        let allocations: Vec<Decimal> = period.partners.iter().map(|p| p.allocation.round_dp(4)).collect();
        assert_eq!(allocations, vec![dec!(98.1667), dec!(196.3333), dec!(196.3333)]);

        let balances: Vec<Decimal> = period.partners.iter().map(|p| p.balance.round_dp(4)).collect();
        assert_eq!(balances, vec![dec!(1098.1667), dec!(2196.3333), dec!(2196.3333)]);
    }

    #[test]
    fn test_fee_net_and_profit_identities() {
        let engine = AllocationEngine::new(dec!(0.015));
        let partners = create_partners(&[dec!(700), dec!(1300.25)]);
        let value = dec!(1890.10);

        let period = engine.record_period(&partners, create_input(value)).unwrap();

        assert_eq!(period.management_fee, value * dec!(0.015) / dec!(12));
        assert_eq!(period.net_value, value - period.management_fee);
        assert_eq!(period.profit_loss, period.net_value - period.total_contributions);
        assert!(period.profit_loss < Decimal::ZERO);
    }

    #[test]
    fn test_allocations_sum_to_profit_loss() {
        let engine = AllocationEngine::default();
        let partners = create_partners(&[dec!(1), dec!(1), dec!(1), dec!(0), dec!(10.33)]);

        let period = engine.record_period(&partners, create_input(dec!(17.77))).unwrap();
        let sum: Decimal = period.partners.iter().map(|p| p.allocation).sum();

        assert!(approx_eq(sum, period.profit_loss));
        assert_eq!(period.partners[3].ownership, Decimal::ZERO);
        assert_eq!(period.partners[3].balance, Decimal::ZERO);
    }

    #[test]
    fn test_rejects_zero_value() {
        let engine = AllocationEngine::default();
        let partners = create_partners(&[dec!(1000)]);

        let err = engine.record_period(&partners, create_input(Decimal::ZERO)).unwrap_err();
        assert_eq!(err.to_string(), MISSING_INPUTS_MESSAGE);
    }

    #[test]
    fn test_rejects_without_capital() {
        let engine = AllocationEngine::default();
        let partners = create_partners(&[Decimal::ZERO, Decimal::ZERO]);

        let result = engine.record_period(&partners, create_input(dec!(5500)));
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_rejects_negative_contribution() {
        let engine = AllocationEngine::default();
        let partners = create_partners(&[dec!(1000), dec!(-5)]);

        let result = engine.record_period(&partners, create_input(dec!(5500)));
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_deterministic_and_non_mutating() {
        let engine = AllocationEngine::default();
        let partners = create_partners(&[dec!(1200), dec!(800)]);
        let before = partners.clone();

        let first = engine.record_period(&partners, create_input(dec!(2100))).unwrap();
        let mut second_input = create_input(dec!(2100));
        second_input.id = 99;
        let mut second = engine.record_period(&partners, second_input).unwrap();
        second.id = first.id;

        assert_eq!(first, second);
        assert_eq!(partners, before);
    }

    #[test]
    fn test_summarize() {
        let engine = AllocationEngine::default();
        let partners = create_partners(&[dec!(1000), dec!(0), dec!(2000)]);

        let empty = summarize(&partners, &[]).unwrap();
        assert_eq!(empty.total_capital, dec!(3000));
        assert_eq!(empty.active_partners, 2);
        assert_eq!(empty.latest_profit_loss, None);

        let period = engine.record_period(&partners, create_input(dec!(3300))).unwrap();
        let summary = summarize(&partners, std::slice::from_ref(&period)).unwrap();
        assert_eq!(summary.latest_profit_loss, Some(period.profit_loss));
    }

    #[test]
    fn test_huge_account_value_is_rejected() {
        let engine = AllocationEngine::default();
        let partners = create_partners(&[dec!(1)]);

        let err = engine
            .record_period(&partners, create_input(dec!(70000000000000000000000000000)))
            .unwrap_err();

        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(err.to_string(), AMOUNT_TOO_LARGE_MESSAGE);
    }

    #[test]
    fn test_overflowing_roster_is_rejected() {
        let partners = create_partners(&[dec!(50000000000000000000000000000), dec!(50000000000000000000000000000)]);

        assert!(matches!(total_contributions(&partners), Err(LedgerError::Validation(_))));
        assert!(summarize(&partners, &[]).is_err());

        let result = AllocationEngine::default().record_period(&partners, create_input(dec!(5500)));
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_large_but_representable_amounts_allocate() {
        let engine = AllocationEngine::default();
        let partners = create_partners(&[dec!(10000000000000000000000000000), dec!(30000000000000000000000000000)]);

        let period = engine
            .record_period(&partners, create_input(dec!(50000000000000000000000000000)))
            .unwrap();

        assert_eq!(period.partners[0].ownership, dec!(25));
        let sum: Decimal = period.partners.iter().map(|p| p.allocation).sum();
        assert!((sum - period.profit_loss).abs() < dec!(1));
    }
}
