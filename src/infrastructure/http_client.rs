// Analytics REST API client implementation
use crate::application::analytics_repository::{ByteStream, ChartRepository, SampleRepository};
use crate::application::error::ApiError;
use crate::domain::chart::{ChartResult, TemplateSummary};
use crate::domain::query::TemporalFilter;
use crate::domain::sample::{CtSample, Sample, SampleSet};
use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AnalyticsApiClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct PromptBody<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a Map<String, Value>>,
}

impl<'a> PromptBody<'a> {
    fn new(prompt: &'a str, parameters: &'a Map<String, Value>) -> Self {
        Self {
            prompt,
            parameters: (!parameters.is_empty()).then_some(parameters),
        }
    }
}

#[derive(Debug, Serialize)]
struct TemplateBody<'a> {
    parameters: &'a Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TemplateListResponse {
    #[serde(default)]
    templates: Vec<TemplateSummary>,
}

impl AnalyticsApiClient {
    /// `timeout` bounds each non-streaming request; chart streams are only bounded by connect time.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    fn site_url(&self, site_id: &str, path: &str) -> String {
        format!(
            "{}/api/v1/sites/{}/{}",
            self.base_url,
            urlencoding::encode(site_id),
            path
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ApiError::MissingBody);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_json<T: DeserializeOwned, Q: Serialize + ?Sized>(&self, url: &str, query: &Q) -> Result<T, ApiError> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(self.timeout)
            .header("Accept", "application/json")
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<T, ApiError> {
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .json(body)
            .timeout(self.timeout)
            .header("Accept", "application/json")
            .send()
            .await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl ChartRepository for AnalyticsApiClient {
    async fn open_chart_stream(
        &self,
        site_id: &str,
        prompt: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Option<ByteStream>, ApiError> {
        let url = self.site_url(site_id, "ai-analytics/chart/stream");
        tracing::debug!("POST {} (stream)", url);

        let response = self
            .client
            .post(&url)
            .json(&PromptBody::new(prompt, parameters))
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        let response = Self::check(response).await?;

        if response.content_length() == Some(0) {
            return Ok(None);
        }

        Ok(Some(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(ApiError::from))
                .boxed(),
        ))
    }

    async fn generate_chart(
        &self,
        site_id: &str,
        prompt: &str,
        parameters: &Map<String, Value>,
    ) -> Result<ChartResult, ApiError> {
        let url = self.site_url(site_id, "ai-analytics/chart");
        self.post_json(&url, &PromptBody::new(prompt, parameters)).await
    }

    async fn list_templates(&self, site_id: &str) -> Result<Vec<TemplateSummary>, ApiError> {
        let url = self.site_url(site_id, "ai-analytics/templates");
        let response: TemplateListResponse = self.get_json(&url, &[] as &[(&str, &str)]).await?;
        Ok(response.templates)
    }

    async fn chart_from_template(
        &self,
        site_id: &str,
        template_id: &str,
        parameters: &Map<String, Value>,
    ) -> Result<ChartResult, ApiError> {
        let path = format!(
            "ai-analytics/chart/from-template/{}",
            urlencoding::encode(template_id)
        );
        let url = self.site_url(site_id, &path);
        self.post_json(&url, &TemplateBody { parameters }).await
    }
}

#[async_trait]
impl SampleRepository for AnalyticsApiClient {
    async fn plant_performance(&self, site_id: &str, filter: &TemporalFilter) -> Result<SampleSet<Sample>, ApiError> {
        let url = self.site_url(site_id, "analytics/plant-performance");
        self.get_json(&url, filter).await
    }

    async fn cooling_tower_tradeoff(
        &self,
        site_id: &str,
        filter: &TemporalFilter,
    ) -> Result<SampleSet<CtSample>, ApiError> {
        let url = self.site_url(site_id, "analytics/cooling-tower-tradeoff");
        self.get_json(&url, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::frame_decoder::{decode_stream, StreamEvent};
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> AnalyticsApiClient {
        AnalyticsApiClient::new(&server.url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_site_url_encodes_site() {
        let client = AnalyticsApiClient::new("http://api.local/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.site_url("site 7", "analytics/plant-performance"),
            "http://api.local/api/v1/sites/site%207/analytics/plant-performance"
        );
    }

    #[tokio::test]
    async fn test_plant_performance_sends_filters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/sites/bkk-01/analytics/plant-performance")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("resolution".into(), "15m".into()),
                Matcher::UrlEncoded("day_type".into(), "weekdays".into()),
                Matcher::UrlEncoded("start_time".into(), "08:00".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"site_id": "bkk-01", "count": 1, "data": [{
                    "timestamp": "2025-05-02T08:15:00+07:00", "cooling_load": 702.3,
                    "power": 451.0, "efficiency": 0.6422, "num_chillers": 2,
                    "chiller_combination": "CH-1+CH-2", "chs": 6.9, "cds": 30.1,
                    "outdoor_wbt": 26.4, "outdoor_dbt": 32.0}]}"#,
            )
            .create_async()
            .await;

        let filter = TemporalFilter {
            resolution: crate::domain::query::Resolution::FifteenMinutes,
            day_type: crate::domain::query::DayType::Weekdays,
            start_time: "08:00".to_string(),
            ..Default::default()
        };
        let set = client(&server).plant_performance("bkk-01", &filter).await.unwrap();

        mock.assert_async().await;
        assert_eq!(set.reported_count(), 1);
        assert_eq!(set.data[0].num_chillers, 2);
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/sites/bkk-01/ai-analytics/chart/stream")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let result = client(&server)
            .open_chart_stream("bkk-01", "efficiency", &Map::new())
            .await;
        match result {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("expected status error, got {:?}", other.map(|b| b.is_some())),
        }
    }

    #[tokio::test]
    async fn test_chart_stream_decodes_frames() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/sites/bkk-01/ai-analytics/chart/stream")
            .match_body(Matcher::Json(serde_json::json!({"prompt": "efficiency"})))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(concat!(
                "data: {\"event\":\"progress\",\"message\":\"Generating chart...\",\"step\":3}\n\n",
                "data: {\"event\":\"complete\",\"result\":{\"chart_id\":\"c-9\"}}\n\n",
            ))
            .create_async()
            .await;

        let body = client(&server)
            .open_chart_stream("bkk-01", "efficiency", &Map::new())
            .await
            .unwrap()
            .expect("body");
        let events: Vec<StreamEvent> = decode_stream(body)
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], StreamEvent::Complete { result } if result.chart_id.as_deref() == Some("c-9")));
    }

    #[tokio::test]
    async fn test_chart_request_carries_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/sites/bkk-01/ai-analytics/chart")
            .match_body(Matcher::Json(serde_json::json!({
                "prompt": "efficiency",
                "parameters": {"resolution": "15m"}
            })))
            .with_status(200)
            .with_body(r#"{"chart_id": "c-12", "message": "Done"}"#)
            .create_async()
            .await;

        let mut parameters = Map::new();
        parameters.insert("resolution".to_string(), Value::from("15m"));
        let result = client(&server)
            .generate_chart("bkk-01", "efficiency", &parameters)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.chart_id.as_deref(), Some("c-12"));
    }

    #[tokio::test]
    async fn test_templates_and_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/sites/bkk-01/ai-analytics/templates")
            .with_status(200)
            .with_body(
                r#"{"templates": [{"template_id": "cds_vs_power", "title": "CDS vs power",
                    "description": "Tower tradeoff", "category": "optimization",
                    "created_by": "system", "usage_count": 12, "tags": []}],
                    "total_count": 1, "builtin_count": 1, "custom_count": 0}"#,
            )
            .create_async()
            .await;
        server
            .mock("POST", "/api/v1/sites/bkk-01/ai-analytics/chart")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let api = client(&server);
        let templates = api.list_templates("bkk-01").await.unwrap();
        assert_eq!(templates[0].template_id, "cds_vs_power");
        assert_eq!(templates[0].usage_count, 12);

        let err = api
            .generate_chart("bkk-01", "efficiency", &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));

        server
            .mock("POST", "/api/v1/sites/bkk-01/ai-analytics/chart/from-template/cds_vs_power")
            .with_status(200)
            .create_async()
            .await;
        let err = api
            .chart_from_template("bkk-01", "cds_vs_power", &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingBody));
    }
}
