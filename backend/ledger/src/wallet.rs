use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TopupStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
    Refunded,
    #[serde(other)]
    Unknown,
}

/// A row of `wallet_topups`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct WalletTopup {
    pub id: Option<String>,
    pub affiliate_email: Option<String>,
    pub amount_gross: Option<Decimal>,
    pub amount_net: Option<Decimal>,
    pub amount_refunded: Option<Decimal>,
    pub status: Option<TopupStatus>,
}

impl WalletTopup {
    pub fn succeeded(&self) -> bool {
        self.status == Some(TopupStatus::Succeeded)
    }

    /// Net amount still sitting in the wallet. Falls back to the gross amount
    /// for rows written before fees were recorded.
    pub fn net(&self) -> Decimal {
        self.amount_net.or(self.amount_gross).unwrap_or_default()
    }

    pub fn refunded(&self) -> Decimal {
        self.amount_refunded.unwrap_or_default()
    }

    pub fn remaining(&self) -> Decimal {
        (self.net() - self.refunded()).max(Decimal::ZERO)
    }
}

/// A row of `wallet_deductions`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct WalletDeduction {
    pub id: Option<String>,
    pub affiliate_email: Option<String>,
    pub live_ad_id: Option<String>,
    pub amount: Option<Decimal>,
}

impl WalletDeduction {
    pub fn amount(&self) -> Decimal {
        self.amount.unwrap_or_default()
    }
}

/// Balance an affiliate can still spend. Not clamped: a negative value means the
/// wallet is already in debt.
pub fn available_balance(topups: &[WalletTopup], deductions: &[WalletDeduction]) -> Decimal {
    let funded: Decimal = topups
        .iter()
        .filter(|t| t.succeeded())
        .map(WalletTopup::remaining)
        .sum();
    let deducted: Decimal = deductions.iter().map(WalletDeduction::amount).sum();

    funded - deducted
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub affiliate_email: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub topped_up: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub refunded: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub deducted: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub available: Decimal,
    pub topup_count: usize,
    pub deduction_count: usize,
}

impl WalletSummary {
    pub fn from_rows(
        affiliate_email: impl Into<String>,
        topups: &[WalletTopup],
        deductions: &[WalletDeduction],
    ) -> Self {
        let succeeded: Vec<&WalletTopup> = topups.iter().filter(|t| t.succeeded()).collect();

        Self {
            affiliate_email: affiliate_email.into(),
            topped_up: succeeded.iter().map(|t| t.net()).sum(),
            refunded: succeeded.iter().map(|t| t.refunded()).sum(),
            deducted: deductions.iter().map(WalletDeduction::amount).sum(),
            available: available_balance(topups, deductions),
            topup_count: succeeded.len(),
            deduction_count: deductions.len(),
        }
    }
}
