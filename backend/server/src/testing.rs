//! In-memory stand-ins for the hosted store and the ads platform.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use ledger::{
    AdStatus, Insights, LiveAd, SettlementSnapshot, TopupStatus, WalletDeduction, WalletTopup,
};
use rust_decimal::Decimal;
use serde_json::{Value, json};

use crate::{
    database::{PauseAnnotation, Store, StoreError},
    meta::{AdsPlatform, MetaError},
};

pub const AFFILIATE: &str = "aff@example.com";

#[derive(Default, Clone, Copy)]
pub struct StoreFailures {
    /// Lookups of this ad id are rejected.
    pub live_ad: Option<&'static str>,
    pub write_insights: bool,
    pub snapshot: bool,
    pub wallet: bool,
    pub annotated_pause: bool,
    pub bare_pause: bool,
}

#[derive(Default)]
struct Tables {
    ads: HashMap<String, LiveAd>,
    topups: Vec<WalletTopup>,
    deductions: Vec<WalletDeduction>,
    annotations: HashMap<String, PauseAnnotation>,
    settle_after_read: Option<Decimal>,
    pause_after_reread: bool,
    insight_writes: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    pub failures: Mutex<StoreFailures>,
}

fn rejected(table: &'static str) -> StoreError {
    StoreError::Rejected {
        table,
        status: 500,
        body: "boom".to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_ad(&self, ad: LiveAd) {
        self.tables.lock().unwrap().ads.insert(ad.id.clone(), ad);
    }

    pub fn add_topup(&self, net: Decimal, refunded: Decimal) {
        self.tables.lock().unwrap().topups.push(WalletTopup {
            affiliate_email: Some(AFFILIATE.to_string()),
            amount_net: Some(net),
            amount_refunded: Some(refunded),
            status: Some(TopupStatus::Succeeded),
            ..Default::default()
        });
    }

    pub fn add_deduction(&self, amount: Decimal) {
        self.tables.lock().unwrap().deductions.push(WalletDeduction {
            affiliate_email: Some(AFFILIATE.to_string()),
            amount: Some(amount),
            ..Default::default()
        });
    }

    /// Simulates a settlement landing between the first read and the re-read.
    pub fn settle_after_read(&self, spend_transferred: Decimal) {
        self.tables.lock().unwrap().settle_after_read = Some(spend_transferred);
    }

    /// Simulates another writer pausing the ad right after the settlement re-read.
    pub fn pause_after_reread(&self) {
        self.tables.lock().unwrap().pause_after_reread = true;
    }

    pub fn fail(&self, update: impl FnOnce(&mut StoreFailures)) {
        update(&mut self.failures.lock().unwrap());
    }

    pub fn ad(&self, id: &str) -> LiveAd {
        self.tables.lock().unwrap().ads[id].clone()
    }

    pub fn annotation(&self, id: &str) -> Option<PauseAnnotation> {
        self.tables.lock().unwrap().annotations.get(id).cloned()
    }

    pub fn insight_writes(&self) -> usize {
        self.tables.lock().unwrap().insight_writes
    }

    fn failures(&self) -> StoreFailures {
        *self.failures.lock().unwrap()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn live_ad(&self, ad_id: &str) -> Result<Option<LiveAd>, StoreError> {
        if self.failures().live_ad == Some(ad_id) {
            return Err(rejected("live_ads"));
        }

        let mut tables = self.tables.lock().unwrap();
        let ad = tables.ads.get(ad_id).cloned();

        if let Some(transferred) = tables.settle_after_read.take() {
            if let Some(row) = tables.ads.get_mut(ad_id) {
                row.spend_transferred = Some(transferred);
            }
        }

        Ok(ad)
    }

    async fn write_insights(&self, ad_id: &str, insights: &Insights) -> Result<(), StoreError> {
        if self.failures().write_insights {
            return Err(rejected("live_ads"));
        }

        let mut tables = self.tables.lock().unwrap();
        tables.insight_writes += 1;
        if let Some(row) = tables.ads.get_mut(ad_id) {
            row.spend = Some(insights.spend);
            row.clicks = Some(insights.clicks as i64);
        }

        Ok(())
    }

    async fn settlement_snapshot(
        &self,
        ad_id: &str,
    ) -> Result<Option<SettlementSnapshot>, StoreError> {
        if self.failures().snapshot {
            return Err(rejected("live_ads"));
        }

        let mut tables = self.tables.lock().unwrap();
        let snapshot = tables.ads.get(ad_id).map(LiveAd::snapshot);

        if std::mem::take(&mut tables.pause_after_reread) {
            if let Some(row) = tables.ads.get_mut(ad_id) {
                row.status = Some(AdStatus::Paused);
            }
        }

        Ok(snapshot)
    }

    async fn succeeded_topups(
        &self,
        affiliate_email: &str,
    ) -> Result<Vec<WalletTopup>, StoreError> {
        if self.failures().wallet {
            return Err(rejected("wallet_topups"));
        }

        Ok(self
            .tables
            .lock()
            .unwrap()
            .topups
            .iter()
            .filter(|t| t.affiliate_email.as_deref() == Some(affiliate_email) && t.succeeded())
            .cloned()
            .collect())
    }

    async fn deductions(&self, affiliate_email: &str) -> Result<Vec<WalletDeduction>, StoreError> {
        if self.failures().wallet {
            return Err(rejected("wallet_deductions"));
        }

        Ok(self
            .tables
            .lock()
            .unwrap()
            .deductions
            .iter()
            .filter(|d| d.affiliate_email.as_deref() == Some(affiliate_email))
            .cloned()
            .collect())
    }

    async fn mark_paused(
        &self,
        ad_id: &str,
        annotation: Option<&PauseAnnotation>,
    ) -> Result<bool, StoreError> {
        let failures = self.failures();
        if (annotation.is_some() && failures.annotated_pause)
            || (annotation.is_none() && failures.bare_pause)
        {
            return Err(rejected("live_ads"));
        }

        let mut tables = self.tables.lock().unwrap();
        let Some(row) = tables.ads.get_mut(ad_id) else {
            return Ok(false);
        };

        // Same rows the PostgREST `or=(status.is.null,status.not.in.(..))` filter matches.
        let delivering = match row.status {
            None => true,
            Some(status) => !status.is_halted(),
        };
        if !delivering {
            return Ok(false);
        }

        row.status = Some(AdStatus::Paused);
        if let Some(annotation) = annotation {
            tables
                .annotations
                .insert(ad_id.to_string(), annotation.clone());
        }

        Ok(true)
    }
}

#[derive(Default)]
pub struct FakeAds {
    insights: Mutex<HashMap<String, Insights>>,
    pauses: Mutex<Vec<String>>,
    pub insights_error: Mutex<Option<(u16, Value)>>,
    pub pause_error: Mutex<bool>,
    pub missing_token: Mutex<bool>,
}

impl FakeAds {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_insights(&self, meta_ad_id: &str, spend: Decimal, clicks: u64) {
        self.insights
            .lock()
            .unwrap()
            .insert(meta_ad_id.to_string(), Insights { spend, clicks });
    }

    pub fn fail_insights(&self, status: u16) {
        *self.insights_error.lock().unwrap() =
            Some((status, json!({ "error": { "message": "rate limited", "code": 17 } })));
    }

    pub fn fail_pause(&self) {
        *self.pause_error.lock().unwrap() = true;
    }

    pub fn drop_token(&self) {
        *self.missing_token.lock().unwrap() = true;
    }

    pub fn pauses(&self) -> Vec<String> {
        self.pauses.lock().unwrap().clone()
    }
}

#[async_trait]
impl AdsPlatform for FakeAds {
    async fn lifetime_insights(&self, meta_ad_id: &str) -> Result<Insights, MetaError> {
        if *self.missing_token.lock().unwrap() {
            return Err(MetaError::MissingToken);
        }

        if let Some((status, payload)) = self.insights_error.lock().unwrap().clone() {
            return Err(MetaError::Upstream { status, payload });
        }

        Ok(self
            .insights
            .lock()
            .unwrap()
            .get(meta_ad_id)
            .copied()
            .unwrap_or_default())
    }

    async fn pause_ad(&self, meta_ad_id: &str) -> Result<(), MetaError> {
        if *self.pause_error.lock().unwrap() {
            return Err(MetaError::Upstream {
                status: 500,
                payload: json!({ "error": { "message": "unknown error" } }),
            });
        }

        self.pauses.lock().unwrap().push(meta_ad_id.to_string());

        Ok(())
    }
}

/// An active ad owned by [`AFFILIATE`], with matching platform totals.
pub fn active_ad(
    store: &MemoryStore,
    ads: &FakeAds,
    id: &str,
    spend: Decimal,
    spend_transferred: Decimal,
) {
    let meta_ad_id = format!("meta-{id}");
    ads.set_insights(&meta_ad_id, spend, 10);
    store.insert_ad(LiveAd {
        id: id.to_string(),
        meta_ad_id: Some(meta_ad_id),
        business_email: Some("biz@example.com".to_string()),
        affiliate_email: Some(AFFILIATE.to_string()),
        spend: Some(Decimal::ZERO),
        clicks: Some(0),
        spend_transferred: Some(spend_transferred),
        status: Some(AdStatus::Active),
        ..Default::default()
    });
}

pub fn test_config() -> crate::config::Config {
    crate::config::Config {
        port: 0,
        supabase_url: "http://localhost:54321".to_string(),
        supabase_key: "service-key".to_string(),
        meta_graph_url: "http://localhost:1".to_string(),
        meta_api_version: "v19.0".to_string(),
        meta_access_token: Some("token".to_string()),
        max_batch_size: 10,
        upstream_timeout: std::time::Duration::from_secs(1),
    }
}
