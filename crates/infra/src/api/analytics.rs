//! Aggregate statistics over the indicator corpus

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use threatlink_core::RequestDispatcher;
use threatlink_domain::{ApiResult, RequestSpec, RequestSpecBuilder};
use tracing::instrument;

use super::models::IndicatorType;

/// Half-open time window `[from, to)`; open ends are left to the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from: Some(from), to: Some(to) }
    }

    fn apply(&self, spec: RequestSpecBuilder) -> RequestSpecBuilder {
        spec.query_opt("from", self.from.map(rfc3339)).query_opt("to", self.to.map(rfc3339))
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Hour,
    #[default]
    Day,
    Week,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSummary {
    #[serde(alias = "totalIndicators")]
    pub total_indicators: u64,
    #[serde(alias = "byType")]
    pub by_type: BTreeMap<String, u64>,
    #[serde(alias = "bySeverity")]
    pub by_severity: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
}

#[derive(Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    points: Vec<TimelinePoint>,
}

#[derive(Clone)]
pub struct AnalyticsClient {
    dispatcher: Arc<RequestDispatcher>,
}

impl AnalyticsClient {
    pub fn new(dispatcher: Arc<RequestDispatcher>) -> Self {
        Self { dispatcher }
    }

    #[instrument(skip(self))]
    pub async fn summary(&self, range: TimeRange) -> ApiResult<AnalyticsSummary> {
        let spec = range.apply(RequestSpec::get("/v1/analytics/summary")).build();
        self.dispatcher.execute_json(spec).await
    }

    /// Indicator counts bucketed by `interval`, oldest first
    #[instrument(skip(self))]
    pub async fn timeline(
        &self,
        range: TimeRange,
        interval: Interval,
        indicator_type: Option<IndicatorType>,
    ) -> ApiResult<Vec<TimelinePoint>> {
        let spec = range
            .apply(RequestSpec::get("/v1/analytics/timeline"))
            .query("interval", interval.as_str())
            .query_opt("type", indicator_type)
            .build();
        let response: TimelineResponse = self.dispatcher.execute_json(spec).await?;

        let mut points = response.points;
        points.sort_by_key(|point| point.timestamp);
        Ok(points)
    }
}
