use std::time::Duration;

use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};

use super::{AnalyticsClient, AnalyticsQuery, AnalyticsResult, QueryError, TimeWindow};

/// Default Cloudflare GraphQL analytics endpoint
pub const CLOUDFLARE_ANALYTICS_ENDPOINT: &str = "https://api.cloudflare.com/client/v4/graphql/";

/// [`AnalyticsClient`] that queries the Cloudflare GraphQL analytics API
#[derive(Clone)]
pub struct GraphqlClient {
    /// HTTP client shared by all queries
    http: reqwest::Client,
    /// GraphQL endpoint
    endpoint: reqwest::Url,
    /// Bearer token with Account Analytics read permission
    token: String,
    /// Account tag used to filter the analytics
    account: String,
}

impl GraphqlClient {
    /// Create a new [`GraphqlClient`]
    ///
    /// Every request is bounded by `request_timeout`.
    pub fn new(
        endpoint: &str,
        token: impl Into<String>,
        account: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, eyre::Report> {
        let endpoint = reqwest::Url::parse(endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint,
            token: token.into(),
            account: account.into(),
        })
    }

    /// Endpoint the queries are sent to
    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl AnalyticsClient for GraphqlClient {
    async fn execute(
        &self,
        query: &AnalyticsQuery,
        window: &TimeWindow,
    ) -> Result<AnalyticsResult, QueryError> {
        log::debug!(
            "Query {} analytics for window {window} from {}",
            query.name,
            self.endpoint
        );

        let start = window.start_param();
        let end = window.end_param();
        let request = GraphqlRequest {
            query: query.document,
            variables: QueryVariables {
                account: &self.account,
                start: &start,
                end: &end,
            },
        };

        let resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .header(header::CACHE_CONTROL, "no-cache")
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(QueryError::Auth(status));
        }
        let resp = resp.error_for_status()?.text().await?;

        // Parse the json response
        let resp: GraphqlResponse = serde_json::from_str(&resp)
            .map_err(|err| QueryError::Protocol(err.to_string()))?;

        if !resp.errors.is_empty() {
            let messages = resp
                .errors
                .into_iter()
                .map(|err| err.message)
                .collect::<Vec<_>>();
            return Err(QueryError::Protocol(messages.join("; ")));
        }

        let data = resp
            .data
            .ok_or_else(|| QueryError::Protocol("response has no data".to_owned()))?;

        log::trace!(
            "Fetched {} analytics: {} accounts, {} workloads",
            query.name,
            data.viewer.accounts.len(),
            data.viewer.workloads().len(),
        );

        Ok(data.viewer)
    }
}

#[derive(Debug, Clone, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: QueryVariables<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct QueryVariables<'a> {
    account: &'a str,
    start: &'a str,
    end: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<GraphqlData>,
    #[serde(default, deserialize_with = "nullable_vec")]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphqlData {
    viewer: AnalyticsResult,
}

#[derive(Debug, Default, Deserialize)]
struct GraphqlError {
    message: String,
}

/// Cloudflare reports `"errors": null` on success
fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
