use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod graphql;
pub mod window;

pub use window::TimeWindow;

/// Immutable GraphQL document sent to the analytics API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnalyticsQuery {
    /// Short name used for logging
    pub name: &'static str,
    /// GraphQL document, parameterized by `$account`, `$start` and `$end`
    pub document: &'static str,
}

/// Request, error and subrequest counts per worker script
pub const REQUEST_COUNT_QUERY: AnalyticsQuery = AnalyticsQuery {
    name: "requests",
    document: r#"
query ($account: String!, $start: String!, $end: String!) {
  viewer {
    accounts(filter: {accountTag: $account}) {
      workersInvocationsAdaptive(limit: 100, filter: {datetime_geq: $start, datetime_leq: $end}) {
        sum {
          subrequests
          requests
          errors
        }
        dimensions {
          scriptName
          status
        }
      }
    }
  }
}"#,
};

/// CPU time quantiles per worker script
pub const CPU_TIME_QUERY: AnalyticsQuery = AnalyticsQuery {
    name: "cpu_time",
    document: r#"
query ($account: String!, $start: String!, $end: String!) {
  viewer {
    accounts(filter: {accountTag: $account}) {
      workersInvocationsAdaptive(limit: 100, filter: {datetime_geq: $start, datetime_leq: $end}) {
        quantiles {
          cpuTimeP25
          cpuTimeP50
          cpuTimeP75
          cpuTimeP90
          cpuTimeP99
          cpuTimeP999
        }
        dimensions {
          scriptName
          status
        }
      }
    }
  }
}"#,
};

/// Analytics returned by a single query
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResult {
    pub accounts: Vec<AccountUsage>,
}

impl AnalyticsResult {
    /// Workloads of the first account, empty if there is no account
    pub fn workloads(&self) -> &[WorkloadRecord] {
        self.accounts
            .first()
            .map(|account| account.workloads.as_slice())
            .unwrap_or_default()
    }
}

/// Invocation analytics for one account
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUsage {
    #[serde(rename = "workersInvocationsAdaptive", default)]
    pub workloads: Vec<WorkloadRecord>,
}

/// One row of the analytics result, identified by its dimensions
///
/// Sections that were not selected by the query are zeroed.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadRecord {
    pub dimensions: Dimensions,
    pub sum: InvocationSums,
    pub quantiles: CpuTimeQuantiles,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Dimensions {
    /// Name of the worker script
    pub script_name: String,
    /// Invocation status (success, clientDisconnected, scriptThrewException, ...)
    pub status: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvocationSums {
    pub requests: u64,
    pub errors: u64,
    pub subrequests: u64,
}

/// CPU time percentiles, in microseconds
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CpuTimeQuantiles {
    pub cpu_time_p25: f64,
    pub cpu_time_p50: f64,
    pub cpu_time_p75: f64,
    pub cpu_time_p90: f64,
    pub cpu_time_p99: f64,
    pub cpu_time_p999: f64,
}

/// Reasons why analytics could not be collected
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The endpoint could not be reached or answered with an unexpected status
    #[error("analytics request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The bearer token was rejected
    #[error("analytics credential rejected with status {0}")]
    Auth(reqwest::StatusCode),
    /// The response did not have the expected shape
    #[error("unexpected analytics response: {0}")]
    Protocol(String),
    /// The response was well formed but contained no account
    #[error("analytics response contains no account data")]
    EmptyResult,
    /// The query did not complete before the collection deadline
    #[error("analytics query did not complete within {0:?}")]
    Timeout(Duration),
}

/// Trait to execute analytics queries for the configured account
#[async_trait::async_trait]
pub trait AnalyticsClient: Send + Sync {
    /// Run `query` over `window`
    async fn execute(
        &self,
        query: &AnalyticsQuery,
        window: &TimeWindow,
    ) -> Result<AnalyticsResult, QueryError>;
}
