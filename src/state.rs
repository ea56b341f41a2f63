//! Application state and the pure reducers behind every user action.
//!
//! `reduce` never touches storage or the clock: the caller supplies the period
//! id and date, and gets back either the next state or the error to show.

use crate::allocation::{check_roster, AllocationEngine, PeriodInput};
use crate::entities::{default_roster, Partner, Period};
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// DRAFT (pending "record period" form)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodDraft {
    pub date: NaiveDate,
    /// Raw text as typed; parsed when the period is recorded
    pub total_value: String,
    pub notes: String,
}

impl PeriodDraft {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            date: today,
            total_value: String::new(),
            notes: String::new(),
        }
    }
}

// ============================================================================
// LEDGER STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerState {
    pub partners: Vec<Partner>,
    pub periods: Vec<Period>,
    pub draft: PeriodDraft,
}

impl LedgerState {
    pub fn new(partners: Vec<Partner>, periods: Vec<Period>, today: NaiveDate) -> Self {
        Self {
            partners,
            periods,
            draft: PeriodDraft::new(today),
        }
    }

    /// Fixed roster, no history
    pub fn with_defaults(today: NaiveDate) -> Self {
        Self::new(default_roster(), Vec::new(), today)
    }

    pub fn partner(&self, id: u32) -> Option<&Partner> {
        self.partners.iter().find(|p| p.id == id)
    }

    pub fn period(&self, id: i64) -> Option<&Period> {
        self.periods.iter().find(|p| p.id == id)
    }

    pub fn latest_period(&self) -> Option<&Period> {
        self.periods.last()
    }

    /// Id for a period created at `now_millis`: the timestamp itself, bumped
    /// past the newest existing id so ids stay unique and creation-ordered.
    pub fn next_period_id(&self, now_millis: i64) -> i64 {
        match self.periods.iter().map(|p| p.id).max() {
            Some(last) if last >= now_millis => last + 1,
            _ => now_millis,
        }
    }
}

// ============================================================================
// ACTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    UpdateContribution {
        partner_id: u32,
        contribution: Decimal,
    },
    RecordPeriod {
        id: i64,
        date: NaiveDate,
        total_value: Decimal,
        notes: String,
    },
    DeletePeriod {
        id: i64,
    },
}

impl Action {
    /// Audit event name
    pub fn event_type(&self) -> &'static str {
        match self {
            Action::UpdateContribution { .. } => "contribution_updated",
            Action::RecordPeriod { .. } => "period_recorded",
            Action::DeletePeriod { .. } => "period_deleted",
        }
    }

    pub fn entity_id(&self) -> String {
        match self {
            Action::UpdateContribution { partner_id, .. } => partner_id.to_string(),
            Action::RecordPeriod { id, .. } | Action::DeletePeriod { id } => id.to_string(),
        }
    }
}

/// Apply one action to the state.
///
/// On error nothing has changed: the caller keeps the state it passed in.
pub fn reduce(state: &LedgerState, action: Action, engine: &AllocationEngine) -> Result<LedgerState> {
    let mut next = state.clone();

    match action {
        Action::UpdateContribution {
            partner_id,
            contribution,
        } => {
            if contribution < Decimal::ZERO {
                return Err(LedgerError::validation("Contribution cannot be negative"));
            }
            let partner = next
                .partners
                .iter_mut()
                .find(|p| p.id == partner_id)
                .ok_or_else(|| LedgerError::validation(format!("Unknown partner: {}", partner_id)))?;
            partner.contribution = contribution;
            check_roster(&next.partners)?;
        }

        Action::RecordPeriod {
            id,
            date,
            total_value,
            notes,
        } => {
            let period = engine.record_period(
                &next.partners,
                PeriodInput {
                    id,
                    date,
                    total_value,
                    notes,
                },
            )?;
            next.periods.push(period);
            next.draft.total_value.clear();
            next.draft.notes.clear();
        }

        Action::DeletePeriod { id } => {
            let before = next.periods.len();
            next.periods.retain(|p| p.id != id);
            if next.periods.len() == before {
                return Err(LedgerError::NotFound(format!("period {}", id)));
            }
        }
    }

    Ok(next)
}

// ============================================================================
// INPUT PARSING
// ============================================================================

/// Parse an amount typed by the user.
///
/// Blank input counts as 0, matching an untouched form field; a leading `$`
/// and thousands separators are accepted.
pub fn parse_amount(text: &str) -> Result<Decimal> {
    let cleaned: String = text
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    if cleaned.is_empty() {
        return Ok(Decimal::ZERO);
    }

    Decimal::from_str(&cleaned)
        .map_err(|_| LedgerError::validation(format!("Invalid amount: {}", text.trim())))
}

pub fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| LedgerError::validation(format!("Invalid date (expected YYYY-MM-DD): {}", text.trim())))
}
