use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdStatus {
    #[default]
    Active,
    Paused,
    Archived,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl AdStatus {
    /// Halted ads no longer deliver, so the wallet guard leaves them alone.
    pub fn is_halted(self) -> bool {
        matches!(self, AdStatus::Paused | AdStatus::Archived | AdStatus::Deleted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdStatus::Active => "active",
            AdStatus::Paused => "paused",
            AdStatus::Archived => "archived",
            AdStatus::Deleted => "deleted",
            AdStatus::Unknown => "unknown",
        }
    }
}

/// A row of `live_ads`: an approved ad idea pushed to the ads platform.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct LiveAd {
    pub id: String,
    pub meta_ad_id: Option<String>,
    pub meta_adset_id: Option<String>,
    pub meta_campaign_id: Option<String>,
    pub business_email: Option<String>,
    pub affiliate_email: Option<String>,
    pub spend: Option<Decimal>,
    pub clicks: Option<i64>,
    pub spend_transferred: Option<Decimal>,
    pub status: Option<AdStatus>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("live ad is missing {0}")]
pub struct MissingField(pub &'static str);

/// The identifiers a spend check cannot run without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdTargets {
    pub meta_ad_id: String,
    pub affiliate_email: String,
    pub business_email: Option<String>,
}

impl LiveAd {
    pub fn targets(&self) -> Result<AdTargets, MissingField> {
        let meta_ad_id = present(&self.meta_ad_id).ok_or(MissingField("meta_ad_id"))?;
        let affiliate_email =
            present(&self.affiliate_email).ok_or(MissingField("affiliate_email"))?;

        Ok(AdTargets {
            meta_ad_id,
            affiliate_email,
            business_email: present(&self.business_email),
        })
    }

    pub fn status(&self) -> AdStatus {
        self.status.unwrap_or_default()
    }

    pub fn snapshot(&self) -> SettlementSnapshot {
        SettlementSnapshot {
            spend: self.spend,
            spend_transferred: self.spend_transferred,
            status: self.status,
        }
    }
}

fn present(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Freshest settlement columns of an ad, re-read right before the guard runs.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct SettlementSnapshot {
    pub spend: Option<Decimal>,
    pub spend_transferred: Option<Decimal>,
    pub status: Option<AdStatus>,
}

impl SettlementSnapshot {
    pub fn status(&self) -> AdStatus {
        self.status.unwrap_or_default()
    }

    pub fn unpaid(&self) -> Decimal {
        unpaid_spend(
            self.spend.unwrap_or_default(),
            self.spend_transferred.unwrap_or_default(),
        )
    }
}

/// Lifetime totals reported by the ads platform. These replace stored values.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Insights {
    pub spend: Decimal,
    pub clicks: u64,
}

pub fn unpaid_spend(spend: Decimal, spend_transferred: Decimal) -> Decimal {
    (spend - spend_transferred).max(Decimal::ZERO)
}
