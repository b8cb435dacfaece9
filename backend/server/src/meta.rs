use std::str::FromStr;

use async_trait::async_trait;
use ledger::Insights;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const INSIGHT_FIELDS: &str = "spend,clicks";

/// Lifetime reporting window of the insights endpoint.
const LIFETIME_PRESET: &str = "maximum";

#[derive(Error, Debug)]
pub enum MetaError {
    #[error("Meta access token is not configured")]
    MissingToken,

    #[error("Invalid Meta base URL {0}")]
    InvalidUrl(String),

    #[error("Meta request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Meta responded with status {status}")]
    Upstream { status: u16, payload: Value },

    #[error("Unexpected Meta payload: {message}")]
    Decode { message: String, payload: Value },
}

impl MetaError {
    pub fn status(&self) -> Option<u16> {
        match self {
            MetaError::Upstream { status, .. } => Some(*status),
            MetaError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            MetaError::Upstream { payload, .. } | MetaError::Decode { payload, .. } => {
                Some(payload)
            }
            _ => None,
        }
    }
}

/// The external ads platform, as far as spend reconciliation needs it.
#[async_trait]
pub trait AdsPlatform: Send + Sync {
    async fn lifetime_insights(&self, meta_ad_id: &str) -> Result<Insights, MetaError>;

    async fn pause_ad(&self, meta_ad_id: &str) -> Result<(), MetaError>;
}

#[derive(Deserialize)]
struct InsightsResponse {
    #[serde(default)]
    data: Vec<InsightRow>,
}

/// Graph API encodes numbers as strings.
#[derive(Deserialize)]
struct InsightRow {
    spend: Option<String>,
    clicks: Option<String>,
}

pub struct MetaClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl MetaClient {
    pub fn new(
        client: Client,
        graph_url: &str,
        api_version: &str,
        access_token: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: format!("{}/{api_version}", graph_url.trim_end_matches('/')),
            access_token,
        }
    }

    /// Each segment is percent-encoded, so an id can never reach another path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, MetaError> {
        let invalid = || MetaError::InvalidUrl(self.base_url.clone());

        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    fn token(&self) -> Result<&str, MetaError> {
        self.access_token.as_deref().ok_or(MetaError::MissingToken)
    }

    async fn json(response: reqwest::Response) -> Result<Value, MetaError> {
        let status = response.status();
        let text = response.text().await?;
        let payload = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if !status.is_success() {
            return Err(MetaError::Upstream {
                status: status.as_u16(),
                payload,
            });
        }

        Ok(payload)
    }
}

fn parse_insights(payload: Value) -> Result<Insights, MetaError> {
    let response: InsightsResponse =
        serde_json::from_value(payload.clone()).map_err(|e| MetaError::Decode {
            message: e.to_string(),
            payload: payload.clone(),
        })?;

    let Some(row) = response.data.into_iter().next() else {
        return Ok(Insights::default());
    };

    let decode = |message: String| MetaError::Decode {
        message,
        payload: payload.clone(),
    };

    let spend = match row.spend.as_deref().map(str::trim) {
        None | Some("") => Decimal::ZERO,
        Some(raw) => Decimal::from_str(raw).map_err(|e| decode(format!("spend {raw:?}: {e}")))?,
    };
    let clicks = match row.clicks.as_deref().map(str::trim) {
        None | Some("") => 0,
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| decode(format!("clicks {raw:?}: {e}")))?,
    };

    Ok(Insights { spend, clicks })
}

#[async_trait]
impl AdsPlatform for MetaClient {
    async fn lifetime_insights(&self, meta_ad_id: &str) -> Result<Insights, MetaError> {
        let token = self.token()?;

        let response = self
            .client
            .get(self.endpoint(&[meta_ad_id, "insights"])?)
            .query(&[
                ("fields", INSIGHT_FIELDS),
                ("date_preset", LIFETIME_PRESET),
                ("access_token", token),
            ])
            .send()
            .await?;

        let insights = parse_insights(Self::json(response).await?)?;
        debug!(meta_ad_id, spend = %insights.spend, clicks = insights.clicks, "Fetched insights");

        Ok(insights)
    }

    async fn pause_ad(&self, meta_ad_id: &str) -> Result<(), MetaError> {
        let token = self.token()?;

        let response = self
            .client
            .post(self.endpoint(&[meta_ad_id])?)
            .form(&[("status", "PAUSED"), ("access_token", token)])
            .send()
            .await?;

        Self::json(response).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::GET, Method::POST, MockServer};
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    fn client(server: &MockServer, token: Option<&str>) -> MetaClient {
        MetaClient::new(
            Client::new(),
            &server.base_url(),
            "v19.0",
            token.map(str::to_string),
        )
    }

    #[test]
    fn test_parse_insights() {
        let insights =
            parse_insights(json!({ "data": [{ "spend": "120.37", "clicks": "41" }] })).unwrap();
        assert_eq!(insights.spend, dec!(120.37));
        assert_eq!(insights.clicks, 41);

        assert_eq!(parse_insights(json!({ "data": [] })).unwrap(), Insights::default());
        assert_eq!(parse_insights(json!({})).unwrap(), Insights::default());

        assert!(matches!(
            parse_insights(json!({ "data": [{ "spend": "lots" }] })),
            Err(MetaError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn test_lifetime_insights() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v19.0/120211/insights")
                    .query_param("fields", "spend,clicks")
                    .query_param("date_preset", "maximum")
                    .query_param("access_token", "token");
                then.status(200)
                    .json_body(json!({ "data": [{ "spend": "12.50", "clicks": "7" }] }));
            })
            .await;

        let insights = client(&server, Some("token"))
            .lifetime_insights("120211")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            insights,
            Insights {
                spend: dec!(12.5),
                clicks: 7
            }
        );
    }

    #[tokio::test]
    async fn test_upstream_error_is_captured() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v19.0/120211/insights");
                then.status(400)
                    .json_body(json!({ "error": { "message": "Invalid OAuth access token", "code": 190 } }));
            })
            .await;

        let err = client(&server, Some("token"))
            .lifetime_insights("120211")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(400));
        assert_eq!(err.payload().unwrap()["error"]["code"], 190);
    }

    #[tokio::test]
    async fn test_pause_ad() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v19.0/120211")
                    .body_contains("status=PAUSED");
                then.status(200).json_body(json!({ "success": true }));
            })
            .await;

        client(&server, Some("token"))
            .pause_ad("120211")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn test_ids_stay_in_their_segment() {
        let client = MetaClient::new(Client::new(), "https://graph.example.com/", "v19.0", None);

        let url = client.endpoint(&["120211", "insights"]).unwrap();
        assert_eq!(url.as_str(), "https://graph.example.com/v19.0/120211/insights");

        let url = client.endpoint(&["120211/../me?fields=id#x"]).unwrap();
        assert_eq!(url.path(), "/v19.0/120211%2F..%2Fme%3Ffields=id%23x");
        assert_eq!(url.query(), None);
    }

    #[tokio::test]
    async fn test_pause_cannot_escape_the_ad_path() {
        let server = MockServer::start_async().await;
        let insights = server
            .mock_async(|when, then| {
                when.method(POST).path("/v19.0/120211/insights");
                then.status(200).json_body(json!({ "success": true }));
            })
            .await;

        let err = client(&server, Some("token"))
            .pause_ad("120211/insights")
            .await
            .unwrap_err();

        assert_eq!(insights.hits_async().await, 0);
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_missing_token() {
        let server = MockServer::start_async().await;

        let err = client(&server, None).pause_ad("120211").await.unwrap_err();
        assert!(matches!(err, MetaError::MissingToken));
    }
}
