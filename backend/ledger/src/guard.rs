//! Wallet solvency guard.
//!
//! An ad keeps delivering only while `available > 0 && available >= unpaid`.
//! The balance is deliberately compared raw, so a wallet already in debt trips
//! the guard.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ads::AdStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardSkip {
    AlreadyHalted(AdStatus),
    NothingUnpaid,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    NonPositiveBalance,
    InsufficientBalance,
}

impl PauseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            PauseReason::NonPositiveBalance => "non_positive_balance",
            PauseReason::InsufficientBalance => "insufficient_balance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Covered,
    Pause(PauseReason),
}

/// Cheap checks that avoid reading the wallet at all.
pub fn precheck(status: AdStatus, unpaid: Decimal) -> Option<GuardSkip> {
    if status.is_halted() {
        return Some(GuardSkip::AlreadyHalted(status));
    }

    if unpaid <= Decimal::ZERO {
        return Some(GuardSkip::NothingUnpaid);
    }

    None
}

pub fn decide(unpaid: Decimal, available: Decimal) -> GuardDecision {
    if available <= Decimal::ZERO {
        return GuardDecision::Pause(PauseReason::NonPositiveBalance);
    }

    if available < unpaid {
        return GuardDecision::Pause(PauseReason::InsufficientBalance);
    }

    GuardDecision::Covered
}
