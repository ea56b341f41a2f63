// Entity Models
// "Identity persists, values change"
//
// - Partner: stable id, contribution edited in place
// - Period: immutable snapshot of partner capital + derived P&L

pub mod partner;
pub mod period;

pub use partner::{default_roster, Partner, DEFAULT_PARTNER_NAMES};
pub use period::{PartnerAllocation, Period};
