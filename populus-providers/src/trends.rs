//! Client for the unofficial Google Trends widget API.
//!
//! Every lookup is two calls: `trends/api/explore` hands out widget tokens,
//! then the matching `widgetdata` endpoint returns the data. Responses start
//! with an XSSI guard (`)]}'`) that is stripped before decoding.
//!
//! | widget | data endpoint | used for |
//! |---|---|---|
//! | `TIMESERIES` | `widgetdata/multiline` | interest over time, peaks |
//! | `GEO_MAP` | `widgetdata/comparedgeo` | interest by region |
//! | `RELATED_QUERIES` | `widgetdata/relatedsearches` | Google related terms |
//! | `RELATED_TOPICS` | `widgetdata/relatedsearches` | related topics chart |
use async_trait::async_trait;
use chrono::DateTime;
use populus_common::{RegionInterest, RelatedTopic, TrendPoint};
use populus_http::{HttpClient, RequestOpts};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::borrow::Cow;
use std::time::Instant;

use crate::{ProviderError, TrendsLookup};

const SERVICE: &str = "Google Trends";
const XSSI_GUARD: &str = ")]}'";
const TIMESERIES_WIDGET: &str = "TIMESERIES";
const RELATED_QUERIES_WIDGET: &str = "RELATED_QUERIES";
const RELATED_TOPICS_WIDGET: &str = "RELATED_TOPICS";
const GEO_MAP_WIDGET: &str = "GEO_MAP";

#[derive(Clone)]
pub struct TrendsClient {
    http: HttpClient,
    tz: i32,
}

#[derive(Debug, Deserialize)]
struct ExploreResponse {
    #[serde(default)]
    widgets: Vec<Widget>,
}

#[derive(Debug, Deserialize)]
struct Widget {
    id: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    request: Value,
}

#[derive(Debug, Deserialize)]
struct MultilineResponse {
    default: TimelineBlock,
}

#[derive(Debug, Deserialize)]
struct TimelineBlock {
    #[serde(rename = "timelineData", default)]
    timeline_data: Vec<TimelineEntry>,
}

#[derive(Debug, Deserialize)]
struct TimelineEntry {
    time: String,
    #[serde(default)]
    value: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct ComparedGeoResponse {
    default: GeoBlock,
}

#[derive(Debug, Deserialize)]
struct GeoBlock {
    #[serde(rename = "geoMapData", default)]
    geo_map_data: Vec<GeoEntry>,
}

#[derive(Debug, Deserialize)]
struct GeoEntry {
    #[serde(rename = "geoName", default)]
    geo_name: String,
    #[serde(rename = "geoCode", default)]
    geo_code: String,
    #[serde(default)]
    value: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct RelatedResponse {
    default: RankedBlock,
}

#[derive(Debug, Deserialize)]
struct RankedBlock {
    #[serde(rename = "rankedList", default)]
    ranked_list: Vec<RankedList>,
}

#[derive(Debug, Deserialize)]
struct RankedList {
    #[serde(rename = "rankedKeyword", default)]
    ranked_keyword: Vec<RankedKeyword>,
}

/// Related queries carry `query`; related topics carry `topic`.
#[derive(Debug, Deserialize)]
struct RankedKeyword {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    topic: Option<TopicRef>,
    #[serde(default)]
    value: u32,
}

#[derive(Debug, Deserialize)]
struct TopicRef {
    title: String,
    #[serde(rename = "type", default)]
    kind: String,
}

impl TrendsClient {
    pub fn new(http: HttpClient, tz: i32) -> Self {
        Self { http, tz }
    }

    async fn get_guarded<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Vec<(&str, Cow<'_, str>)>,
    ) -> Result<T, ProviderError> {
        let body = self
            .http
            .get_text(
                path,
                RequestOpts {
                    query: Some(params),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await?;
        decode_guarded(&body)
    }

    /// Fetch the explore widget with the given id, if Trends returned one.
    async fn widget(
        &self,
        id: &str,
        term: &str,
        country: &str,
        timeframe: &str,
    ) -> Result<Option<Widget>, ProviderError> {
        let geo = country.to_ascii_uppercase();
        let hl = country.to_ascii_lowercase();
        let req = json!({
            "comparisonItem": [{ "keyword": term, "geo": geo, "time": timeframe }],
            "category": 0,
            "property": "",
        });
        let explore: ExploreResponse = self
            .get_guarded(
                "trends/api/explore",
                vec![
                    ("hl", hl.into()),
                    ("tz", self.tz.to_string().into()),
                    ("req", req.to_string().into()),
                ],
            )
            .await?;
        Ok(explore.widgets.into_iter().find(|w| w.id == id))
    }

    async fn widget_data<T: DeserializeOwned>(
        &self,
        path: &str,
        widget: &Widget,
        country: &str,
    ) -> Result<T, ProviderError> {
        self.get_guarded(
            path,
            vec![
                ("hl", country.to_ascii_lowercase().into()),
                ("tz", self.tz.to_string().into()),
                ("req", widget.request.to_string().into()),
                ("token", Cow::Borrowed(widget.token.as_str())),
            ],
        )
        .await
    }
}

#[async_trait]
impl TrendsLookup for TrendsClient {
    async fn interest_over_time(
        &self,
        term: &str,
        country: &str,
        timeframe: &str,
    ) -> Result<Vec<TrendPoint>, ProviderError> {
        let started = Instant::now();
        tracing::debug!(target: "providers.trends", term, country, timeframe, "trends.interest.start");

        let Some(widget) = self.widget(TIMESERIES_WIDGET, term, country, timeframe).await? else {
            tracing::info!(target: "providers.trends", term, "trends.interest.no_widget");
            return Ok(Vec::new());
        };
        let data: MultilineResponse = self
            .widget_data("trends/api/widgetdata/multiline", &widget, country)
            .await?;
        let points = timeline_points(data.default.timeline_data)?;

        tracing::debug!(
            target: "providers.trends",
            term,
            points = points.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "trends.interest.success"
        );
        Ok(points)
    }

    async fn related_queries(
        &self,
        term: &str,
        country: &str,
        timeframe: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let Some(widget) = self
            .widget(RELATED_QUERIES_WIDGET, term, country, timeframe)
            .await?
        else {
            return Ok(Vec::new());
        };
        let data: RelatedResponse = self
            .widget_data("trends/api/widgetdata/relatedsearches", &widget, country)
            .await?;

        Ok(top_ranked(data)
            .into_iter()
            .filter_map(|k| k.query)
            .collect())
    }

    async fn interest_by_region(
        &self,
        term: &str,
        country: &str,
        timeframe: &str,
    ) -> Result<Vec<RegionInterest>, ProviderError> {
        let Some(widget) = self.widget(GEO_MAP_WIDGET, term, country, timeframe).await? else {
            tracing::info!(target: "providers.trends", term, "trends.regions.no_widget");
            return Ok(Vec::new());
        };
        let data: ComparedGeoResponse = self
            .widget_data("trends/api/widgetdata/comparedgeo", &widget, country)
            .await?;
        Ok(region_interest(data.default.geo_map_data))
    }

    async fn related_topics(
        &self,
        term: &str,
        country: &str,
        timeframe: &str,
    ) -> Result<Vec<RelatedTopic>, ProviderError> {
        let Some(widget) = self
            .widget(RELATED_TOPICS_WIDGET, term, country, timeframe)
            .await?
        else {
            return Ok(Vec::new());
        };
        let data: RelatedResponse = self
            .widget_data("trends/api/widgetdata/relatedsearches", &widget, country)
            .await?;
        Ok(top_ranked(data)
            .into_iter()
            .filter_map(|k| {
                k.topic.map(|t| RelatedTopic {
                    title: t.title,
                    topic_type: t.kind,
                    value: k.value,
                })
            })
            .collect())
    }
}

/// The first ranked list is "top"; the second is "rising".
fn top_ranked(data: RelatedResponse) -> Vec<RankedKeyword> {
    data.default
        .ranked_list
        .into_iter()
        .next()
        .map(|list| list.ranked_keyword)
        .unwrap_or_default()
}

/// Regions with data, highest interest first.
fn region_interest(entries: Vec<GeoEntry>) -> Vec<RegionInterest> {
    let mut regions: Vec<RegionInterest> = entries
        .into_iter()
        .filter_map(|e| {
            let value = e.value.first().copied().unwrap_or(0);
            (value > 0).then(|| RegionInterest {
                name: e.geo_name,
                geo_code: e.geo_code,
                value,
            })
        })
        .collect();
    regions.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    regions
}

fn decode_guarded<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    let trimmed = body.trim_start();
    let json = match trimmed.strip_prefix(XSSI_GUARD) {
        Some(rest) => rest.trim_start_matches(',').trim_start(),
        None => trimmed,
    };
    serde_json::from_str(json).map_err(|e| ProviderError::malformed(SERVICE, e.to_string()))
}

fn timeline_points(entries: Vec<TimelineEntry>) -> Result<Vec<TrendPoint>, ProviderError> {
    entries
        .into_iter()
        .map(|entry| {
            let secs: i64 = entry.time.parse().map_err(|_| {
                ProviderError::malformed(SERVICE, format!("bad timestamp `{}`", entry.time))
            })?;
            let date = DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| {
                    ProviderError::malformed(SERVICE, format!("timestamp out of range: {secs}"))
                })?
                .date_naive();
            Ok(TrendPoint {
                date,
                value: entry.value.first().copied().unwrap_or(0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn xssi_guard_is_stripped() {
        let body = ")]}',\n{\"widgets\":[{\"id\":\"TIMESERIES\",\"token\":\"t\",\"request\":{}}]}";
        let explore: ExploreResponse = decode_guarded(body).unwrap();
        assert_eq!(explore.widgets[0].id, "TIMESERIES");
        assert_eq!(explore.widgets[0].token, "t");
    }

    #[test]
    fn unguarded_json_still_decodes() {
        let explore: ExploreResponse = decode_guarded("{\"widgets\":[]}").unwrap();
        assert!(explore.widgets.is_empty());
    }

    #[test]
    fn garbage_is_malformed() {
        let err = decode_guarded::<ExploreResponse>(")]}'\n<html>").unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { .. }));
    }

    #[test]
    fn timeline_uses_first_value_and_utc_date() {
        let entries = vec![
            TimelineEntry { time: "1712534400".into(), value: vec![87] },
            TimelineEntry { time: "1712620800".into(), value: vec![] },
        ];
        let points = timeline_points(entries).unwrap();
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 4, 8).unwrap());
        assert_eq!(points[0].value, 87);
        assert_eq!(points[1].value, 0);
    }

    #[test]
    fn non_numeric_timestamp_is_malformed() {
        let entries = vec![TimelineEntry { time: "Apr 2024".into(), value: vec![1] }];
        assert!(timeline_points(entries).is_err());
    }

    #[test]
    fn regions_without_data_are_dropped_and_sorted() {
        let entries = vec![
            GeoEntry { geo_name: "Ceuta".into(), geo_code: "ES-CE".into(), value: vec![0] },
            GeoEntry { geo_name: "Galicia".into(), geo_code: "ES-GA".into(), value: vec![41] },
            GeoEntry { geo_name: "Madrid".into(), geo_code: "ES-MD".into(), value: vec![100] },
            GeoEntry { geo_name: "Aragon".into(), geo_code: "ES-AR".into(), value: vec![41] },
        ];
        let names: Vec<String> = region_interest(entries).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Madrid", "Aragon", "Galicia"]);
    }

    #[test]
    fn ranked_entries_decode_queries_and_topics() {
        let body = r#"{"default":{"rankedList":[{"rankedKeyword":[
            {"query":"eclipse 2024","value":100},
            {"topic":{"mid":"/m/07fd7","title":"Solar eclipse","type":"Topic"},"value":64}
        ]},{"rankedKeyword":[{"query":"rising","value":4550}]}]}}"#;
        let top = top_ranked(decode_guarded(body).unwrap());
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].query.as_deref(), Some("eclipse 2024"));
        let topic = top[1].topic.as_ref().unwrap();
        assert_eq!(topic.title, "Solar eclipse");
        assert_eq!(topic.kind, "Topic");
        assert_eq!(top[1].value, 64);
    }
}
