//! Controller: owns the ledger state, runs reducers, and auto-saves.
//!
//! Persistence is fire-and-forget. A failed save is logged and reported as a
//! status message, but the in-memory state is never rolled back.

use crate::allocation::{check_roster, compute_ownership, summarize, total_contributions, AllocationEngine, LedgerSummary};
use crate::entities::{default_roster, Period};
use crate::error::Result;
use crate::export::generate_csv;
use crate::state::{parse_amount, parse_date, reduce, Action, LedgerState};
use crate::storage::{LedgerEvent, Storage};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

pub const STATUS_LOADED: &str = "Data loaded";
pub const STATUS_LOAD_FAILED: &str = "Load failed";
pub const STATUS_SAVED: &str = "Saved";
pub const STATUS_SAVE_FAILED: &str = "Save failed";

pub struct Controller<S: Storage> {
    storage: S,
    state: LedgerState,
    engine: AllocationEngine,
    status: Option<String>,
    actor: String,
}

impl<S: Storage> Controller<S> {
    /// Load saved partners and periods, falling back to the default roster
    /// and an empty history for anything missing or unreadable.
    pub fn load(storage: S, engine: AllocationEngine, today: NaiveDate) -> Self {
        let mut failed = false;

        let partners = match storage.load_partners() {
            Ok(Some(partners)) => match check_roster(&partners) {
                Ok(_) => partners,
                Err(e) => {
                    log::error!("Rejected saved partners: {}", e);
                    failed = true;
                    default_roster()
                }
            },
            Ok(None) => default_roster(),
            Err(e) => {
                log::error!("Error loading partners: {}", e);
                failed = true;
                default_roster()
            }
        };

        let periods = match storage.load_periods() {
            Ok(Some(periods)) => periods,
            Ok(None) => Vec::new(),
            Err(e) => {
                log::error!("Error loading periods: {}", e);
                failed = true;
                Vec::new()
            }
        };

        log::info!("Loaded {} partners and {} periods", partners.len(), periods.len());

        let status = if failed { STATUS_LOAD_FAILED } else { STATUS_LOADED };

        Self {
            storage,
            state: LedgerState::new(partners, periods, today),
            engine,
            status: Some(status.to_string()),
            actor: "system".to_string(),
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn engine(&self) -> &AllocationEngine {
        &self.engine
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// Partner named on audit events
    pub fn set_actor(&mut self, actor: impl Into<String>) {
        self.actor = actor.into();
    }

    pub fn summary(&self) -> Result<LedgerSummary> {
        summarize(&self.state.partners, &self.state.periods)
    }

    /// Current ownership of one partner, in percent
    pub fn ownership_of(&self, partner_id: u32) -> Decimal {
        match (total_contributions(&self.state.partners), self.state.partner(partner_id)) {
            (Ok(total), Some(p)) => compute_ownership(p.contribution, total),
            _ => Decimal::ZERO,
        }
    }

    pub fn export_csv(&self) -> Result<String> {
        generate_csv(&self.state.periods)
    }

    // ========================================================================
    // ACTIONS
    // ========================================================================

    /// Run one action. Errors leave the state untouched; success saves.
    pub fn dispatch(&mut self, action: Action) -> Result<()> {
        log::debug!("Dispatching {:?}", action);

        let next = match reduce(&self.state, action.clone(), &self.engine) {
            Ok(next) => next,
            Err(e) => {
                log::warn!("Rejected {}: {}", action.event_type(), e);
                return Err(e);
            }
        };
        self.state = next;

        self.persist();
        self.audit(&action);
        Ok(())
    }

    pub fn update_contribution(&mut self, partner_id: u32, contribution: Decimal) -> Result<()> {
        self.dispatch(Action::UpdateContribution {
            partner_id,
            contribution,
        })
    }

    /// Record a period stamped with the current time; returns its id
    pub fn record_period(&mut self, date: NaiveDate, total_value: Decimal, notes: impl Into<String>) -> Result<i64> {
        let now = Utc::now();
        let id = self.state.next_period_id(now.timestamp_millis());

        self.dispatch(Action::RecordPeriod {
            id,
            date,
            total_value,
            notes: notes.into(),
        })?;
        self.state.draft.date = now.date_naive();
        Ok(id)
    }

    /// Record whatever is in the draft form
    pub fn record_draft(&mut self) -> Result<i64> {
        let draft = self.state.draft.clone();
        let total_value = parse_amount(&draft.total_value)?;
        self.record_period(draft.date, total_value, draft.notes)
    }

    pub fn delete_period(&mut self, id: i64) -> Result<()> {
        self.dispatch(Action::DeletePeriod { id })
    }

    // ========================================================================
    // DRAFT EDITING (no persistence)
    // ========================================================================

    pub fn set_draft_date(&mut self, text: &str) -> Result<()> {
        self.state.draft.date = parse_date(text)?;
        Ok(())
    }

    pub fn set_draft_value(&mut self, text: impl Into<String>) {
        self.state.draft.total_value = text.into();
    }

    pub fn set_draft_notes(&mut self, text: impl Into<String>) {
        self.state.draft.notes = text.into();
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    /// Save partners then periods. Returns whether both writes succeeded.
    pub fn persist(&mut self) -> bool {
        let result = self
            .storage
            .save_partners(&self.state.partners)
            .and_then(|_| self.storage.save_periods(&self.state.periods));

        match result {
            Ok(()) => {
                log::info!(
                    "Saved {} partners and {} periods",
                    self.state.partners.len(),
                    self.state.periods.len()
                );
                self.status = Some(STATUS_SAVED.to_string());
                true
            }
            Err(e) => {
                log::error!("Error saving data: {}", e);
                self.status = Some(STATUS_SAVE_FAILED.to_string());
                false
            }
        }
    }

    fn audit(&mut self, action: &Action) {
        let data = match action {
            Action::UpdateContribution { contribution, .. } => {
                serde_json::json!({ "contribution": contribution })
            }
            Action::RecordPeriod { id, .. } => match self.state.period(*id) {
                Some(period) => period_event_data(period),
                None => serde_json::json!({}),
            },
            Action::DeletePeriod { .. } => serde_json::json!({}),
        };

        let event = LedgerEvent::new(action.event_type(), &action.entity_id(), data, &self.actor);
        if let Err(e) = self.storage.record_event(&event) {
            log::warn!("Could not record {} event: {}", event.event_type, e);
        }
    }
}

fn period_event_data(period: &Period) -> serde_json::Value {
    serde_json::json!({
        "date": period.date,
        "totalValue": period.total_value,
        "totalContributions": period.total_contributions,
        "profitLoss": period.profit_loss,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Partner;
    use crate::error::LedgerError;
    use crate::storage::MemoryStorage;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
    }

    fn create_controller() -> Controller<MemoryStorage> {
        Controller::load(MemoryStorage::new(), AllocationEngine::default(), today())
    }

    fn fund(controller: &mut Controller<MemoryStorage>) {
        controller.update_contribution(1, dec!(1000)).unwrap();
        controller.update_contribution(2, dec!(2000)).unwrap();
        controller.update_contribution(3, dec!(2000)).unwrap();
    }

    #[test]
    fn test_load_empty_storage_uses_defaults() {
        let controller = create_controller();

        assert_eq!(controller.state().partners, default_roster());
        assert!(controller.state().periods.is_empty());
        assert_eq!(controller.status(), Some(STATUS_LOADED));
    }

    #[test]
    fn test_load_failure_falls_back_to_defaults() {
        let mut storage = MemoryStorage::new();
        storage.set_fail_reads(true);

        let controller = Controller::load(storage, AllocationEngine::default(), today());

        assert_eq!(controller.state().partners, default_roster());
        assert_eq!(controller.status(), Some(STATUS_LOAD_FAILED));
    }

    #[test]
    fn test_load_keeps_saved_partners_when_periods_are_corrupt() {
        let mut storage = MemoryStorage::new();
        let roster = vec![Partner::new(9, "Solo").with_contribution(dec!(10))];
        storage.save_partners(&roster).unwrap();
        storage.write_blob(crate::storage::PERIODS_KEY, "nope").unwrap();

        let controller = Controller::load(storage, AllocationEngine::default(), today());

        assert_eq!(controller.state().partners, roster);
        assert!(controller.state().periods.is_empty());
        assert_eq!(controller.status(), Some(STATUS_LOAD_FAILED));
    }

    #[test]
    fn test_load_rejects_roster_that_cannot_be_summed() {
        let mut storage = MemoryStorage::new();
        let roster = vec![
            Partner::new(1, "A").with_contribution(dec!(50000000000000000000000000000)),
            Partner::new(2, "B").with_contribution(dec!(50000000000000000000000000000)),
        ];
        storage.save_partners(&roster).unwrap();

        let controller = Controller::load(storage, AllocationEngine::default(), today());

        assert_eq!(controller.state().partners, default_roster());
        assert_eq!(controller.status(), Some(STATUS_LOAD_FAILED));
        assert!(controller.summary().is_ok());
    }

    #[test]
    fn test_oversized_amounts_are_rejected_without_panicking() {
        let mut controller = create_controller();
        controller.update_contribution(1, dec!(50000000000000000000000000000)).unwrap();

        let err = controller
            .update_contribution(2, dec!(50000000000000000000000000000))
            .unwrap_err();
        assert!(err.is_user_facing());
        assert_eq!(controller.ownership_of(1), dec!(100));

        controller.update_contribution(1, dec!(1)).unwrap();
        let err = controller
            .record_period(today(), dec!(70000000000000000000000000000), "")
            .unwrap_err();
        assert!(err.is_user_facing());
        assert!(controller.state().periods.is_empty());
        assert_eq!(controller.summary().unwrap().total_capital, dec!(1));
    }

    #[test]
    fn test_every_change_is_saved() {
        let mut controller = create_controller();
        fund(&mut controller);

        let saved = controller.storage().load_partners().unwrap().unwrap();
        assert_eq!(saved[2].contribution, dec!(2000));
        assert_eq!(controller.status(), Some(STATUS_SAVED));

        let id = controller.record_period(today(), dec!(5500), "January").unwrap();
        let saved = controller.storage().load_periods().unwrap().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, id);
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let mut controller = create_controller();
        fund(&mut controller);
        controller.storage.set_fail_writes(true);

        controller.record_period(today(), dec!(5500), "").unwrap();

        assert_eq!(controller.state().periods.len(), 1);
        assert_eq!(controller.status(), Some(STATUS_SAVE_FAILED));
    }

    #[test]
    fn test_validation_error_leaves_state_unchanged() {
        let mut controller = create_controller();
        controller.clear_status();
        let before = controller.state().clone();

        let err = controller.record_period(today(), dec!(5500), "").unwrap_err();

        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(controller.state(), &before);
        assert_eq!(controller.status(), None);
        assert!(controller.storage().load_periods().unwrap().is_none());
    }

    #[test]
    fn test_record_draft() {
        let mut controller = create_controller();
        fund(&mut controller);
        controller.set_draft_date("2025-02-28").unwrap();
        controller.set_draft_value("$5,500");
        controller.set_draft_notes("Feb");

        let id = controller.record_draft().unwrap();
        let period = controller.state().period(id).unwrap();

        assert_eq!(period.date, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert_eq!(period.total_value, dec!(5500));
        assert_eq!(period.notes, "Feb");
        assert!(controller.state().draft.total_value.is_empty());
    }

    #[test]
    fn test_blank_draft_is_rejected() {
        let mut controller = create_controller();
        fund(&mut controller);

        assert!(matches!(controller.record_draft(), Err(LedgerError::Validation(_))));
        assert!(controller.state().periods.is_empty());
    }

    #[test]
    fn test_back_to_back_periods_get_distinct_ids() {
        let mut controller = create_controller();
        fund(&mut controller);

        let a = controller.record_period(today(), dec!(5500), "").unwrap();
        let b = controller.record_period(today(), dec!(5600), "").unwrap();

        assert!(b > a);
    }

    #[test]
    fn test_delete_period() {
        let mut controller = create_controller();
        fund(&mut controller);
        let a = controller.record_period(today(), dec!(5500), "").unwrap();
        let b = controller.record_period(today(), dec!(5600), "").unwrap();

        controller.delete_period(a).unwrap();

        let ids: Vec<i64> = controller.state().periods.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b]);
        assert_eq!(controller.state().partner(1).unwrap().contribution, dec!(1000));
        assert!(controller.delete_period(a).is_err());
    }

    #[test]
    fn test_audit_events_name_the_actor() {
        let mut controller = create_controller();
        controller.set_actor("Richard Starick");
        fund(&mut controller);
        let id = controller.record_period(today(), dec!(5500), "").unwrap();

        let events = controller.storage().events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[3].event_type, "period_recorded");
        assert_eq!(events[3].entity_id, id.to_string());
        assert!(events.iter().all(|e| e.actor == "Richard Starick"));
    }

    #[test]
    fn test_summary_and_ownership() {
        let mut controller = create_controller();
        fund(&mut controller);

        assert_eq!(controller.ownership_of(1), dec!(20));
        assert_eq!(controller.ownership_of(5), Decimal::ZERO);

        let summary = controller.summary().unwrap();
        assert_eq!(summary.total_capital, dec!(5000));
        assert_eq!(summary.active_partners, 3);
        assert_eq!(summary.latest_profit_loss, None);
    }
}
