use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger::{
    AdStatus, Insights, LiveAd, PauseReason, SettlementSnapshot, WalletDeduction, WalletTopup,
};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;

pub const LIVE_ADS_TABLE: &str = "live_ads";
pub const WALLET_TOPUPS_TABLE: &str = "wallet_topups";
pub const WALLET_DEDUCTIONS_TABLE: &str = "wallet_deductions";

const LIVE_AD_COLUMNS: &str = "id,meta_ad_id,meta_adset_id,meta_campaign_id,business_email,affiliate_email,spend,clicks,spend_transferred,status";
const SETTLEMENT_COLUMNS: &str = "spend,spend_transferred,status";
const TOPUP_COLUMNS: &str = "id,affiliate_email,amount_gross,amount_net,amount_refunded,status";
const DEDUCTION_COLUMNS: &str = "id,affiliate_email,live_ad_id,amount";

/// Only rows still delivering may transition to paused. A NULL status counts as
/// delivering and must be listed explicitly, `NULL NOT IN (..)` is never true.
const STILL_DELIVERING: &str = "(status.is.null,status.not.in.(paused,archived,deleted))";

pub const INSUFFICIENT_FUNDS: &str = "insufficient_funds";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Request to {table} failed: {source}")]
    Transport {
        table: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{table} rejected request with status {status}: {body}")]
    Rejected {
        table: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to decode {table} rows: {source}")]
    Decode {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Billing columns written alongside `status` when the wallet guard pauses an ad.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PauseAnnotation {
    pub billing_status: &'static str,
    pub paused_reason: PauseReason,
    pub auto_paused_at: DateTime<Utc>,
}

impl PauseAnnotation {
    pub fn insufficient_funds(reason: PauseReason) -> Self {
        Self {
            billing_status: INSUFFICIENT_FUNDS,
            paused_reason: reason,
            auto_paused_at: Utc::now(),
        }
    }
}

/// Table access used by spend reconciliation.
#[async_trait]
pub trait Store: Send + Sync {
    async fn live_ad(&self, ad_id: &str) -> Result<Option<LiveAd>, StoreError>;

    /// Overwrites the stored totals with the platform's lifetime figures.
    async fn write_insights(&self, ad_id: &str, insights: &Insights) -> Result<(), StoreError>;

    async fn settlement_snapshot(
        &self,
        ad_id: &str,
    ) -> Result<Option<SettlementSnapshot>, StoreError>;

    async fn succeeded_topups(&self, affiliate_email: &str)
    -> Result<Vec<WalletTopup>, StoreError>;

    async fn deductions(&self, affiliate_email: &str) -> Result<Vec<WalletDeduction>, StoreError>;

    /// Conditionally moves a still-delivering ad to `paused`. Returns whether a
    /// row actually transitioned.
    async fn mark_paused(
        &self,
        ad_id: &str,
        annotation: Option<&PauseAnnotation>,
    ) -> Result<bool, StoreError>;
}

#[derive(Serialize)]
struct InsightsPatch {
    spend: rust_decimal::Decimal,
    clicks: u64,
}

#[derive(Serialize)]
struct PausePatch<'a> {
    status: AdStatus,
    #[serde(flatten)]
    annotation: Option<&'a PauseAnnotation>,
}

/// Hosted Postgres reached through its PostgREST endpoint.
pub struct PostgrestStore {
    client: Client,
    rest_url: String,
    key: String,
}

impl PostgrestStore {
    pub fn new(client: Client, supabase_url: &str, service_role_key: &str) -> Self {
        Self {
            client,
            rest_url: format!("{}/rest/v1", supabase_url.trim_end_matches('/')),
            key: service_role_key.to_string(),
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{table}", self.rest_url))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    async fn send(
        &self,
        table: &'static str,
        request: RequestBuilder,
    ) -> Result<String, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|source| StoreError::Transport { table, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| StoreError::Transport { table, source })?;

        if !status.is_success() {
            return Err(StoreError::Rejected {
                table,
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    async fn rows<T: DeserializeOwned>(
        &self,
        table: &'static str,
        request: RequestBuilder,
    ) -> Result<Vec<T>, StoreError> {
        let body = self.send(table, request).await?;

        serde_json::from_str(&body).map_err(|source| StoreError::Decode { table, source })
    }

    async fn first_ad_row<T: DeserializeOwned>(
        &self,
        ad_id: &str,
        columns: &str,
    ) -> Result<Option<T>, StoreError> {
        let request = self.request(Method::GET, LIVE_ADS_TABLE).query(&[
            ("id", format!("eq.{ad_id}")),
            ("select", columns.to_string()),
            ("limit", "1".to_string()),
        ]);

        Ok(self
            .rows::<T>(LIVE_ADS_TABLE, request)
            .await?
            .into_iter()
            .next())
    }
}

#[async_trait]
impl Store for PostgrestStore {
    async fn live_ad(&self, ad_id: &str) -> Result<Option<LiveAd>, StoreError> {
        self.first_ad_row(ad_id, LIVE_AD_COLUMNS).await
    }

    async fn write_insights(&self, ad_id: &str, insights: &Insights) -> Result<(), StoreError> {
        let request = self
            .request(Method::PATCH, LIVE_ADS_TABLE)
            .query(&[("id", format!("eq.{ad_id}"))])
            .header("Prefer", "return=minimal")
            .json(&InsightsPatch {
                spend: insights.spend,
                clicks: insights.clicks,
            });

        self.send(LIVE_ADS_TABLE, request).await?;
        debug!(ad_id, spend = %insights.spend, clicks = insights.clicks, "Wrote insights");

        Ok(())
    }

    async fn settlement_snapshot(
        &self,
        ad_id: &str,
    ) -> Result<Option<SettlementSnapshot>, StoreError> {
        self.first_ad_row(ad_id, SETTLEMENT_COLUMNS).await
    }

    async fn succeeded_topups(
        &self,
        affiliate_email: &str,
    ) -> Result<Vec<WalletTopup>, StoreError> {
        let request = self.request(Method::GET, WALLET_TOPUPS_TABLE).query(&[
            ("affiliate_email", format!("eq.{affiliate_email}")),
            ("status", "eq.succeeded".to_string()),
            ("select", TOPUP_COLUMNS.to_string()),
        ]);

        self.rows(WALLET_TOPUPS_TABLE, request).await
    }

    async fn deductions(&self, affiliate_email: &str) -> Result<Vec<WalletDeduction>, StoreError> {
        let request = self.request(Method::GET, WALLET_DEDUCTIONS_TABLE).query(&[
            ("affiliate_email", format!("eq.{affiliate_email}")),
            ("select", DEDUCTION_COLUMNS.to_string()),
        ]);

        self.rows(WALLET_DEDUCTIONS_TABLE, request).await
    }

    async fn mark_paused(
        &self,
        ad_id: &str,
        annotation: Option<&PauseAnnotation>,
    ) -> Result<bool, StoreError> {
        let request = self
            .request(Method::PATCH, LIVE_ADS_TABLE)
            .query(&[
                ("id", format!("eq.{ad_id}")),
                ("or", STILL_DELIVERING.to_string()),
                ("select", "id".to_string()),
            ])
            .header("Prefer", "return=representation")
            .json(&PausePatch {
                status: AdStatus::Paused,
                annotation,
            });

        let updated: Vec<serde_json::Value> = self.rows(LIVE_ADS_TABLE, request).await?;

        Ok(!updated.is_empty())
    }
}
