use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use surf::{StatusCode, Url};
use thiserror::Error;

use crate::{LabelSet, CUSTOM_METRIC_NAME, LABEL_KEYS};

const METRIC_DESCRIPTION: &str = "The size of my shirt inventory.";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("failed to call the monitoring api: {0}")]
    Failed(surf::Error),
    #[error("unexpected status: {0}")]
    Status(StatusCode),
    #[error("no timeseries data in response")]
    Empty,
}

/// Client for the cloud monitoring api.
///
/// Every operation targets a single project, authorized with the access
/// token resolved at startup.
pub struct MonitoringClient {
    base_url: Url,
    project_id: String,
    token: String,
}

impl MonitoringClient {
    pub fn new(base_url: &str, project_id: &str, token: String) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|err| anyhow::format_err!("invalid monitoring api url: {}", err))?;
        Ok(MonitoringClient {
            base_url,
            project_id: project_id.to_string(),
            token,
        })
    }

    /// Submit the metric descriptor for the custom metric.
    ///
    /// The operation is idempotent server-side, so it runs on every
    /// invocation instead of checking for an existing descriptor first.
    pub async fn create_metric_descriptor(&self) -> Result<()> {
        let url = self.project_url(&["metricDescriptors"])?;
        let body = surf::Body::from_json(&metric_descriptor(&self.project_id))
            .map_err(|err| anyhow::format_err!("failed to encode metric descriptor: {}", err))?;
        let response = surf::post(url)
            .header("Authorization", self.bearer().as_str())
            .body(body)
            .await
            .map_err(ApiError::Failed)?;
        // The response body is unused; a success status is the only confirmation.
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()).into());
        }
        Ok(())
    }

    /// Write one data point to the time series identified by `labels`.
    pub async fn write_point(
        &self,
        labels: &LabelSet,
        now_rfc3339: &str,
        count: i64,
    ) -> Result<()> {
        let url = self.project_url(&["timeseries:write"])?;
        let request = WriteRequest {
            timeseries: vec![TimeseriesWrite {
                desc: self.timeseries_descriptor(labels),
                point: Point {
                    start: now_rfc3339.to_string(),
                    end: now_rfc3339.to_string(),
                    value: count,
                },
            }],
        };
        let body = surf::Body::from_json(&request)
            .map_err(|err| anyhow::format_err!("failed to encode write request: {}", err))?;
        let response = surf::post(url)
            .header("Authorization", self.bearer().as_str())
            .body(body)
            .await
            .map_err(ApiError::Failed)?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()).into());
        }
        Ok(())
    }

    /// List the data points at or before `youngest` for the time series
    /// identified by `labels`, in the order the service returns them.
    pub async fn read_points(&self, labels: &LabelSet, youngest: &str) -> Result<Vec<Point>> {
        let url = self.list_url(labels, youngest)?;
        let mut response = surf::get(url)
            .header("Authorization", self.bearer().as_str())
            .await
            .map_err(ApiError::Failed)?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()).into());
        }
        let response: ListResponse = response
            .body_json()
            .await
            .map_err(|err| anyhow::format_err!("error decoding timeseries response: {}", err))?;
        extract_points(response)
    }

    fn timeseries_descriptor(&self, labels: &LabelSet) -> TimeseriesDescriptor {
        TimeseriesDescriptor {
            project: self.project_id.clone(),
            metric: CUSTOM_METRIC_NAME.to_string(),
            labels: labels.write_labels(),
        }
    }

    fn project_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::format_err!("monitoring api url cannot be a base"))?
            .push("projects")
            .push(&self.project_id)
            .extend(segments);
        Ok(url)
    }

    fn list_url(&self, labels: &LabelSet, youngest: &str) -> Result<Url> {
        // The metric name is a single (percent-encoded) path segment
        let mut url = self.project_url(&["timeseries", CUSTOM_METRIC_NAME])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("youngest", youngest);
            for filter in labels.query_filters() {
                query.append_pair("labels", &filter);
            }
        }
        Ok(url)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Points of the first time series matching the query.
///
/// Right after a write the service may return no matching series at all
/// while the data propagates; report that as an error so the caller's retry
/// loop can absorb it.
fn extract_points(response: ListResponse) -> Result<Vec<Point>> {
    let series = response
        .timeseries
        .into_iter()
        .next()
        .ok_or(ApiError::Empty)?;
    Ok(series.points)
}

fn metric_descriptor(project_id: &str) -> MetricDescriptor {
    let labels = LABEL_KEYS
        .iter()
        .map(|label| LabelDescriptor {
            key: format!("/{}", label),
            description: format!("The {}.", label),
        })
        .collect();
    MetricDescriptor {
        name: CUSTOM_METRIC_NAME.to_string(),
        project: project_id.to_string(),
        type_descriptor: TypeDescriptor {
            metric_type: "gauge",
            value_type: "int64",
        },
        labels,
        description: METRIC_DESCRIPTION.to_string(),
    }
}

#[derive(Debug, Serialize)]
struct MetricDescriptor {
    name: String,
    project: String,
    #[serde(rename = "typeDescriptor")]
    type_descriptor: TypeDescriptor,
    labels: Vec<LabelDescriptor>,
    description: String,
}

#[derive(Debug, Serialize)]
struct TypeDescriptor {
    #[serde(rename = "metricType")]
    metric_type: &'static str,
    #[serde(rename = "valueType")]
    value_type: &'static str,
}

#[derive(Debug, Serialize)]
struct LabelDescriptor {
    key: String,
    description: String,
}

#[derive(Debug, Serialize)]
struct WriteRequest {
    timeseries: Vec<TimeseriesWrite>,
}

#[derive(Debug, Serialize)]
struct TimeseriesWrite {
    #[serde(rename = "timeseriesDesc")]
    desc: TimeseriesDescriptor,
    point: Point,
}

#[derive(Debug, Serialize)]
struct TimeseriesDescriptor {
    project: String,
    metric: String,
    labels: BTreeMap<String, String>,
}

/// One data point of a time series; for a gauge write start == end.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub start: String,
    pub end: String,
    #[serde(rename = "int64Value", with = "int64_value")]
    pub value: i64,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    timeseries: Vec<TimeseriesRead>,
}

#[derive(Debug, Deserialize)]
struct TimeseriesRead {
    #[serde(default)]
    points: Vec<Point>,
}

/// The api encodes int64 values as json strings; accept either form on reads.
mod int64_value {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(value),
            Raw::Text(text) => text.parse().map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn client() -> MonitoringClient {
        MonitoringClient::new(
            "https://example.com/cloudmonitoring/v2beta2",
            "1234567890",
            "test-token".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn descriptor_body_matches_the_wire_format() {
        let descriptor = metric_descriptor("1234567890");
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({
                "name": "custom.cloudmonitoring.googleapis.com/shirt_inventory",
                "project": "1234567890",
                "typeDescriptor": {
                    "metricType": "gauge",
                    "valueType": "int64",
                },
                "labels": [
                    { "key": "/color", "description": "The color." },
                    { "key": "/size", "description": "The size." },
                ],
                "description": "The size of my shirt inventory.",
            })
        );
    }

    #[test]
    fn write_body_is_a_one_element_batch_with_string_int64() {
        let labels = LabelSet::new("yellow", "large");
        let now = "2020-07-10T01:02:03Z";
        let request = WriteRequest {
            timeseries: vec![TimeseriesWrite {
                desc: client().timeseries_descriptor(&labels),
                point: Point {
                    start: now.to_string(),
                    end: now.to_string(),
                    value: 10,
                },
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "timeseries": [{
                    "timeseriesDesc": {
                        "project": "1234567890",
                        "metric": "custom.cloudmonitoring.googleapis.com/shirt_inventory",
                        "labels": {
                            "custom.cloudmonitoring.googleapis.com/color": "yellow",
                            "custom.cloudmonitoring.googleapis.com/size": "large",
                        },
                    },
                    "point": {
                        "start": "2020-07-10T01:02:03Z",
                        "end": "2020-07-10T01:02:03Z",
                        "int64Value": "10",
                    },
                }],
            })
        );
    }

    #[test]
    fn list_url_selects_the_series_by_label_equality() {
        let labels = LabelSet::new("yellow", "large");
        let url = client().list_url(&labels, "2020-07-10T01:02:03Z").unwrap();

        // The slash in the metric name must not introduce a path segment
        assert_eq!(
            url.path(),
            "/cloudmonitoring/v2beta2/projects/1234567890/timeseries/custom.cloudmonitoring.googleapis.com%2Fshirt_inventory"
        );

        let pairs = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect::<Vec<_>>();
        assert_eq!(
            pairs,
            vec![
                ("youngest".to_string(), "2020-07-10T01:02:03Z".to_string()),
                (
                    "labels".to_string(),
                    "custom.cloudmonitoring.googleapis.com/color==yellow".to_string()
                ),
                (
                    "labels".to_string(),
                    "custom.cloudmonitoring.googleapis.com/size==large".to_string()
                ),
            ]
        );
    }

    #[test]
    fn points_accept_string_or_number_int64_values() {
        let from_text: Point = serde_json::from_str(
            r#"{"start":"2020-07-10T01:02:03Z","end":"2020-07-10T01:02:03Z","int64Value":"10"}"#,
        )
        .unwrap();
        let from_number: Point = serde_json::from_str(
            r#"{"start":"2020-07-10T01:02:03Z","end":"2020-07-10T01:02:03Z","int64Value":10}"#,
        )
        .unwrap();
        assert_eq!(from_text.value, 10);
        assert_eq!(from_text, from_number);
    }

    #[test]
    fn points_are_returned_in_service_order() {
        let response: ListResponse = serde_json::from_value(json!({
            "timeseries": [{
                "points": [
                    { "start": "2020-07-10T01:02:03Z", "end": "2020-07-10T01:02:03Z", "int64Value": "12" },
                    { "start": "2020-07-09T23:00:00Z", "end": "2020-07-09T23:00:00Z", "int64Value": "8" },
                ],
            }],
        }))
        .unwrap();
        let points = extract_points(response).unwrap();
        assert_eq!(
            points.iter().map(|p| p.value).collect::<Vec<_>>(),
            vec![12, 8]
        );
    }

    #[test]
    fn a_response_with_no_matching_series_is_an_error() {
        let response: ListResponse = serde_json::from_str("{}").unwrap();
        assert!(extract_points(response).is_err());

        let response: ListResponse = serde_json::from_str(r#"{"timeseries":[]}"#).unwrap();
        assert!(extract_points(response).is_err());
    }
}
