// 🤝 Partner Entity - Stable id + mutable capital contribution
//
// "Partner id is IDENTITY (never changes), contribution is a VALUE (edited any time)"
//
// Partners are created once from the fixed roster, edited in place when their
// contribution changes, and never deleted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// PARTNER ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    /// Stable identity - NEVER changes
    pub id: u32,

    /// Display name (also the login selection)
    pub name: String,

    /// Capital put into the fund, basis for ownership share
    #[serde(default)]
    pub contribution: Decimal,
}

impl Partner {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Partner {
            id,
            name: name.into(),
            contribution: Decimal::ZERO,
        }
    }

    pub fn with_contribution(mut self, contribution: Decimal) -> Self {
        self.contribution = contribution;
        self
    }

    /// A partner counts as active once they have capital in the fund
    pub fn is_active(&self) -> bool {
        self.contribution > Decimal::ZERO
    }
}

// ============================================================================
// DEFAULT ROSTER
// ============================================================================

/// Names of the founding partners, in roster order
pub const DEFAULT_PARTNER_NAMES: [&str; 5] = [
    "George Bierwirth",
    "Desmond Leahy",
    "Byron Smith",
    "Richard Starick",
    "James Warner",
];

/// Fixed roster used when storage holds no partners yet (all contributions 0)
pub fn default_roster() -> Vec<Partner> {
    DEFAULT_PARTNER_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| Partner::new(i as u32 + 1, *name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_roster() {
        let roster = default_roster();

        assert_eq!(roster.len(), 5);
        assert_eq!(roster[0].id, 1);
        assert_eq!(roster[0].name, "George Bierwirth");
        assert_eq!(roster[4].id, 5);
        assert_eq!(roster[4].name, "James Warner");
        assert!(roster.iter().all(|p| p.contribution == Decimal::ZERO));
    }

    #[test]
    fn test_is_active() {
        let partner = Partner::new(1, "Byron Smith");
        assert!(!partner.is_active());

        let partner = partner.with_contribution(dec!(250.50));
        assert!(partner.is_active());
    }

    #[test]
    fn test_missing_contribution_defaults_to_zero() {
        let partner: Partner = serde_json::from_str(r#"{"id":3,"name":"Byron Smith"}"#).unwrap();
        assert_eq!(partner.contribution, Decimal::ZERO);
    }
}
