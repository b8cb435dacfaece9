//! Ledger rows, money math and wire payloads shared by the spend guard service
//! and its operational callers.

pub mod ads;
pub mod guard;
pub mod payloads;
pub mod wallet;

pub use ads::{
    AdStatus, AdTargets, Insights, LiveAd, MissingField, SettlementSnapshot, unpaid_spend,
};
pub use guard::{GuardDecision, GuardSkip, PauseReason, decide, precheck};
pub use wallet::{TopupStatus, WalletDeduction, WalletSummary, WalletTopup, available_balance};
