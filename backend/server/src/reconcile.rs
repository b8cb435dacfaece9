//! Spend reconciliation and the wallet guard.
//!
//! Per ad: pull lifetime totals from the ads platform, overwrite the stored
//! spend and clicks, re-read the settlement columns, and pause the ad when the
//! affiliate's wallet can no longer cover its unpaid spend. Batches run
//! sequentially and one ad's failure never stops the rest. Nothing is retried,
//! callers re-run the check on their own schedule.

use std::sync::Arc;

use ledger::{
    AdTargets, GuardDecision, GuardSkip, Insights, LiveAd, MissingField, PauseReason,
    SettlementSnapshot, WalletSummary,
    guard::{decide, precheck},
    payloads::{AdResult, BatchResponse, ErrorCode, GuardOutcome, ItemError},
};
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    database::{PauseAnnotation, Store, StoreError},
    meta::{AdsPlatform, MetaError},
};

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Live ad {0} not found")]
    NotFound(String),

    #[error("Live ad {ad_id} cannot be checked: {missing}")]
    MissingIds {
        ad_id: String,
        missing: MissingField,
    },

    #[error("Failed to load live ad: {0}")]
    Lookup(#[source] StoreError),

    #[error("Failed to fetch insights: {0}")]
    Insights(#[from] MetaError),

    #[error("Failed to store spend: {0}")]
    SpendWrite(#[source] StoreError),
}

fn store_upstream(error: &StoreError) -> (Option<u16>, Option<Value>) {
    match error {
        StoreError::Rejected { status, body, .. } => (
            Some(*status),
            Some(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.clone()))),
        ),
        StoreError::Transport { source, .. } => (source.status().map(|s| s.as_u16()), None),
        StoreError::Decode { .. } => (None, None),
    }
}

impl ReconcileError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ReconcileError::NotFound(_) => ErrorCode::LiveAdNotFound,
            ReconcileError::MissingIds { .. } => ErrorCode::MissingMetaIds,
            ReconcileError::Lookup(_) => ErrorCode::DatabaseError,
            ReconcileError::Insights(MetaError::MissingToken) => ErrorCode::MissingMetaToken,
            ReconcileError::Insights(_) => ErrorCode::MetaInsightsFailed,
            ReconcileError::SpendWrite(_) => ErrorCode::SpendUpdateFailed,
        }
    }

    pub fn to_item_error(&self) -> ItemError {
        let (status, payload) = match self {
            ReconcileError::Insights(e) => (e.status(), e.payload().cloned()),
            ReconcileError::Lookup(e) | ReconcileError::SpendWrite(e) => store_upstream(e),
            _ => (None, None),
        };

        ItemError::new(self.code(), self.to_string()).with_upstream(status, payload)
    }
}

struct Synced {
    ad: LiveAd,
    targets: AdTargets,
    insights: Insights,
}

pub struct Reconciler {
    store: Arc<dyn Store>,
    ads: Arc<dyn AdsPlatform>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>, ads: Arc<dyn AdsPlatform>) -> Self {
        Self { store, ads }
    }

    pub async fn check_batch(&self, ad_ids: &[String]) -> BatchResponse {
        let mut results = Vec::with_capacity(ad_ids.len());

        for ad_id in ad_ids {
            results.push(self.check_spend(ad_id).await);
        }

        let response = BatchResponse::from_results(results);
        info!(
            total = response.summary.total,
            failed = response.summary.failed,
            auto_paused = response.summary.auto_paused,
            "Spend check finished"
        );

        response
    }

    pub async fn sync_batch(&self, ad_ids: &[String]) -> BatchResponse {
        let mut results = Vec::with_capacity(ad_ids.len());

        for ad_id in ad_ids {
            let result = match self.sync(ad_id).await {
                Ok(synced) => synced_result(ad_id, &synced),
                Err(e) => failed(ad_id, &e),
            };
            results.push(result);
        }

        BatchResponse::from_results(results)
    }

    pub async fn check_spend(&self, ad_id: &str) -> AdResult {
        match self.sync(ad_id).await {
            Ok(synced) => self.guard(ad_id, synced).await,
            Err(e) => failed(ad_id, &e),
        }
    }

    pub async fn available_balance(&self, affiliate_email: &str) -> Result<Decimal, StoreError> {
        Ok(self.wallet_summary(affiliate_email).await?.available)
    }

    pub async fn wallet_summary(&self, affiliate_email: &str) -> Result<WalletSummary, StoreError> {
        let topups = self.store.succeeded_topups(affiliate_email).await?;
        let deductions = self.store.deductions(affiliate_email).await?;

        Ok(WalletSummary::from_rows(affiliate_email, &topups, &deductions))
    }

    async fn sync(&self, ad_id: &str) -> Result<Synced, ReconcileError> {
        let ad = self
            .store
            .live_ad(ad_id)
            .await
            .map_err(ReconcileError::Lookup)?
            .ok_or_else(|| ReconcileError::NotFound(ad_id.to_string()))?;

        let targets = ad.targets().map_err(|missing| ReconcileError::MissingIds {
            ad_id: ad_id.to_string(),
            missing,
        })?;

        let insights = self.ads.lifetime_insights(&targets.meta_ad_id).await?;

        self.store
            .write_insights(ad_id, &insights)
            .await
            .map_err(ReconcileError::SpendWrite)?;

        info!(
            ad_id,
            meta_ad_id = %targets.meta_ad_id,
            spend = %insights.spend,
            clicks = insights.clicks,
            "Synced lifetime spend"
        );

        Ok(Synced {
            ad,
            targets,
            insights,
        })
    }

    async fn fresh_snapshot(&self, ad_id: &str, synced: &Synced) -> SettlementSnapshot {
        let fallback = SettlementSnapshot {
            spend: Some(synced.insights.spend),
            ..synced.ad.snapshot()
        };

        match self.store.settlement_snapshot(ad_id).await {
            Ok(Some(snapshot)) => SettlementSnapshot {
                spend: snapshot.spend.or(fallback.spend),
                ..snapshot
            },
            Ok(None) => {
                warn!(ad_id, "Live ad vanished before re-read, using loaded row");
                fallback
            }
            Err(e) => {
                warn!(ad_id, error = %e, "Settlement re-read failed, using loaded row");
                fallback
            }
        }
    }

    async fn guard(&self, ad_id: &str, synced: Synced) -> AdResult {
        let mut result = synced_result(ad_id, &synced);

        let snapshot = self.fresh_snapshot(ad_id, &synced).await;
        let unpaid = snapshot.unpaid();
        result.spend_transferred = Some(snapshot.spend_transferred.unwrap_or_default());
        result.unpaid = Some(unpaid);

        if let Some(skip) = precheck(snapshot.status(), unpaid) {
            result.guard = Some(match skip {
                GuardSkip::AlreadyHalted(_) => GuardOutcome::AlreadyHalted,
                GuardSkip::NothingUnpaid => GuardOutcome::NothingUnpaid,
            });
            info!(ad_id, status = snapshot.status().as_str(), %unpaid, "Wallet guard skipped");
            return result;
        }

        let affiliate_email = &synced.targets.affiliate_email;
        let available = match self.available_balance(affiliate_email).await {
            Ok(available) => available,
            Err(e) => {
                warn!(ad_id, %affiliate_email, error = %e, "Wallet balance unavailable");
                result.guard = Some(GuardOutcome::BalanceUnavailable);
                result.warnings.push(format!("wallet balance unavailable: {e}"));
                return result;
            }
        };
        result.available_balance = Some(available);

        match decide(unpaid, available) {
            GuardDecision::Covered => {
                info!(ad_id, %unpaid, %available, "Wallet covers unpaid spend");
                result.guard = Some(GuardOutcome::Covered);
            }
            GuardDecision::Pause(reason) => {
                warn!(
                    ad_id,
                    %affiliate_email,
                    %unpaid,
                    %available,
                    reason = reason.as_str(),
                    "Wallet cannot cover unpaid spend, pausing"
                );
                self.auto_pause(ad_id, &synced.targets, reason, &mut result)
                    .await;
            }
        }

        result
    }

    async fn auto_pause(
        &self,
        ad_id: &str,
        targets: &AdTargets,
        reason: PauseReason,
        result: &mut AdResult,
    ) {
        result.pause_reason = Some(reason);

        if let Err(e) = self.ads.pause_ad(&targets.meta_ad_id).await {
            error!(
                ad_id,
                meta_ad_id = %targets.meta_ad_id,
                status = ?e.status(),
                payload = ?e.payload(),
                error = %e,
                "Platform pause failed"
            );
            result.guard = Some(GuardOutcome::PauseFailed);
            result.warnings.push(format!("platform pause failed: {e}"));
            return;
        }

        result.auto_paused = true;
        result.guard = Some(GuardOutcome::AutoPaused);

        let annotation = PauseAnnotation::insufficient_funds(reason);
        let transitioned = match self.store.mark_paused(ad_id, Some(&annotation)).await {
            Ok(transitioned) => Ok(transitioned),
            Err(e) => {
                warn!(ad_id, error = %e, "Annotated pause update failed, retrying with bare status");
                self.store.mark_paused(ad_id, None).await
            }
        };

        match transitioned {
            Ok(true) => info!(ad_id, "Marked live ad paused"),
            Ok(false) => {
                warn!(ad_id, "Paused on the platform but no local row transitioned");
                result
                    .warnings
                    .push("local pause update matched no delivering row".to_string());
            }
            Err(e) => {
                error!(ad_id, error = %e, "Failed to record pause locally");
                result
                    .warnings
                    .push(format!("local pause update failed: {e}"));
            }
        }
    }
}

fn synced_result(ad_id: &str, synced: &Synced) -> AdResult {
    AdResult {
        spend: Some(synced.insights.spend),
        clicks: Some(synced.insights.clicks),
        ..AdResult::succeeded(ad_id)
    }
}

fn failed(ad_id: &str, e: &ReconcileError) -> AdResult {
    let item = e.to_item_error();
    error!(
        ad_id,
        code = ?item.code,
        upstream_status = ?item.upstream_status,
        error = %e,
        "Spend check failed"
    );

    AdResult::failed(ad_id, item)
}
