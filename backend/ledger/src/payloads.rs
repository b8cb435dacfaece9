//! JSON bodies of the spend endpoints, shared by the service and the CLI.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::guard::PauseReason;

/// Either a single `adId`, a list of `adIds`, or both (single id first).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdIdsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_ids: Option<Vec<String>>,
}

impl AdIdsRequest {
    pub fn batch(ad_ids: Vec<String>) -> Self {
        Self {
            ad_id: None,
            ad_ids: Some(ad_ids),
        }
    }

    pub fn into_ids(self) -> Vec<String> {
        self.ad_id
            .into_iter()
            .chain(self.ad_ids.unwrap_or_default())
            .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    LiveAdNotFound,
    MissingMetaIds,
    MissingMetaToken,
    MetaInsightsFailed,
    SpendUpdateFailed,
    DatabaseError,
    #[serde(other)]
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_payload: Option<Value>,
}

impl ItemError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            upstream_status: None,
            upstream_payload: None,
        }
    }

    pub fn with_upstream(mut self, status: Option<u16>, payload: Option<Value>) -> Self {
        self.upstream_status = status;
        self.upstream_payload = payload;
        self
    }
}

/// What the wallet guard did for one ad.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuardOutcome {
    AlreadyHalted,
    NothingUnpaid,
    BalanceUnavailable,
    Covered,
    AutoPaused,
    PauseFailed,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdResult {
    pub ad_id: String,
    pub success: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub spend: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clicks: Option<u64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub spend_transferred: Option<Decimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub unpaid: Option<Decimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub available_balance: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<GuardOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_reason: Option<PauseReason>,
    #[serde(default)]
    pub auto_paused: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemError>,
}

impl AdResult {
    pub fn succeeded(ad_id: impl Into<String>) -> Self {
        Self {
            ad_id: ad_id.into(),
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(ad_id: impl Into<String>, error: ItemError) -> Self {
        Self {
            ad_id: ad_id.into(),
            success: false,
            error: Some(error),
            ..Default::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub auto_paused: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct BatchResponse {
    pub success: bool,
    pub results: Vec<AdResult>,
    pub summary: BatchSummary,
}

impl BatchResponse {
    pub fn from_results(results: Vec<AdResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        let summary = BatchSummary {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            auto_paused: results.iter().filter(|r| r.auto_paused).count(),
        };

        Self {
            success: summary.failed == 0,
            results,
            summary,
        }
    }
}
