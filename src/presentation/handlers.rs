// HTTP request handlers
use crate::application::aggregation_service::{AggregationRequest, ValueField};
use crate::application::cancel::CancelToken;
use crate::application::chart_session::SessionUpdate;
use crate::application::error::ApiError;
use crate::application::tradeoff_service::TradeoffRequest;
use crate::domain::category::CategoryField;
use crate::domain::chat::ChatTurn;
use crate::domain::query::TemporalFilter;
use crate::infrastructure::ndjson_response::ndjson_stream;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Deserialize)]
pub struct SeriesParams {
    #[serde(default)]
    pub primary: CategoryField,
    pub primary_step: Option<f64>,
    #[serde(default)]
    pub secondary: CategoryField,
    pub secondary_step: Option<f64>,
    #[serde(default)]
    pub value: ValueField,
    /// Comma-separated chiller counts, e.g. `1,2,3`
    pub chillers: Option<String>,
}

impl SeriesParams {
    fn to_request(&self) -> AggregationRequest {
        let mut request = AggregationRequest {
            primary: self.primary,
            primary_step: self.primary_step,
            secondary: self.secondary,
            secondary_step: self.secondary_step,
            value: self.value,
            ..Default::default()
        };
        if let Some(chillers) = &self.chillers {
            request.chiller_counts = parse_chiller_counts(chillers);
        }
        request
    }
}

fn parse_chiller_counts(raw: &str) -> BTreeSet<u32> {
    raw.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct TradeoffParams {
    pub wbt_min: Option<f64>,
    pub wbt_max: Option<f64>,
    pub load_min: Option<f64>,
    pub load_max: Option<f64>,
    pub cds_step: Option<f64>,
}

impl TradeoffParams {
    fn to_request(&self) -> TradeoffRequest {
        let defaults = TradeoffRequest::default();
        TradeoffRequest {
            wbt_min: self.wbt_min.unwrap_or(defaults.wbt_min),
            wbt_max: self.wbt_max.unwrap_or(defaults.wbt_max),
            load_min: self.load_min.unwrap_or(defaults.load_min),
            load_max: self.load_max.unwrap_or(defaults.load_max),
            cds_step: self.cds_step,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplateChartRequest {
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// One line of the chat response stream
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatFrame {
    User(ChatTurn),
    Update(SessionUpdate),
}

fn upstream_error(context: &str, e: ApiError) -> Response {
    tracing::error!("{}: {}", context, e);
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Plant performance comparison series
pub async fn plant_performance_series(
    Path(site_id): Path<String>,
    Query(filter): Query<TemporalFilter>,
    Query(params): Query<SeriesParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let request = params.to_request();
    match state.plant_performance.series(&site_id, &filter, &request).await {
        Ok(chart) => Json(chart).into_response(),
        Err(e) => upstream_error(&format!("Error fetching plant performance for {}", site_id), e),
    }
}

/// Condenser-water setpoint tradeoff with the advisory optimum
pub async fn cooling_tower_tradeoff(
    Path(site_id): Path<String>,
    Query(filter): Query<TemporalFilter>,
    Query(params): Query<TradeoffParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let request = params.to_request();
    match state.tradeoff.analyze(&site_id, &filter, &request).await {
        Ok(analysis) => Json(analysis).into_response(),
        Err(e) => upstream_error(&format!("Error fetching tradeoff samples for {}", site_id), e),
    }
}

/// Submit a chart prompt and stream the conversation as it evolves
pub async fn submit_chat(
    Path(site_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> Response {
    let Some(session) = state.chart_sessions.submit(&site_id, &body.prompt) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "prompt must not be empty" })),
        )
            .into_response();
    };
    let session = session.with_parameters(body.parameters);

    let user_turn = session.user_turn().clone();
    let (rx, _handle) = state.chart_sessions.spawn(session, CancelToken::new());

    let frames = stream::iter([ChatFrame::User(user_turn)])
        .chain(ReceiverStream::new(rx).map(ChatFrame::Update));
    ndjson_stream(frames)
}

pub async fn list_templates(
    Path(site_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.chart_sessions.list_templates(&site_id).await {
        Ok(templates) => Json(templates).into_response(),
        Err(e) => upstream_error(&format!("Error listing templates for {}", site_id), e),
    }
}

/// Generate a chart turn from a saved template
pub async fn chart_from_template(
    Path((site_id, template_id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<TemplateChartRequest>,
) -> Response {
    let session = state
        .chart_sessions
        .select_template(&site_id, &template_id, &body.parameters)
        .await;
    Json(session.update()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::aggregation_service::PlantPerformanceService;
    use crate::application::analytics_repository::{ByteStream, ChartRepository, SampleRepository};
    use crate::application::chart_session::ChartSessionService;
    use crate::application::tradeoff_service::TradeoffService;
    use crate::domain::category::BinWidths;
    use crate::domain::chart::{ChartResult, TemplateSummary};
    use crate::domain::sample::{CtSample, Sample, SampleSet};
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::DateTime;

    struct FakeUpstream {
        healthy: bool,
    }

    #[async_trait]
    impl SampleRepository for FakeUpstream {
        async fn plant_performance(&self, _site_id: &str, _filter: &TemporalFilter) -> Result<SampleSet<Sample>, ApiError> {
            if !self.healthy {
                return Err(ApiError::Status {
                    status: 500,
                    body: "TimescaleDB not connected".to_string(),
                });
            }
            Ok(SampleSet {
                data: Vec::new(),
                count: Some(0),
            })
        }

        async fn cooling_tower_tradeoff(
            &self,
            _site_id: &str,
            _filter: &TemporalFilter,
        ) -> Result<SampleSet<CtSample>, ApiError> {
            let timestamp = DateTime::parse_from_rfc3339("2025-06-01T14:00:00+07:00").unwrap();
            let ct = |cds, chillers, towers| CtSample {
                timestamp,
                cds,
                power_chillers: chillers,
                power_cts: towers,
                outdoor_wbt: 26.0,
                cooling_load: 800.0,
            };
            Ok(SampleSet {
                data: vec![ct(80.0, 100.0, 20.0), ct(82.0, 90.0, 25.0), ct(84.0, 85.0, 40.0)],
                count: Some(3),
            })
        }
    }

    #[async_trait]
    impl ChartRepository for FakeUpstream {
        async fn open_chart_stream(
            &self,
            _site_id: &str,
            _prompt: &str,
            _parameters: &Map<String, Value>,
        ) -> Result<Option<ByteStream>, ApiError> {
            let frames: Vec<Result<Bytes, ApiError>> = vec![
                Ok(Bytes::from_static(b"data: {\"event\":\"progress\",\"message\":\"Generating chart...\"}\n")),
                Ok(Bytes::from_static(b"data: {\"event\":\"complete\",\"result\":{\"message\":\"Here you go\"}}\n")),
            ];
            Ok(Some(stream::iter(frames).boxed()))
        }

        async fn generate_chart(
            &self,
            _site_id: &str,
            _prompt: &str,
            _parameters: &Map<String, Value>,
        ) -> Result<ChartResult, ApiError> {
            Ok(ChartResult::default())
        }

        async fn list_templates(&self, _site_id: &str) -> Result<Vec<TemplateSummary>, ApiError> {
            Ok(Vec::new())
        }

        async fn chart_from_template(
            &self,
            _site_id: &str,
            template_id: &str,
            _parameters: &Map<String, Value>,
        ) -> Result<ChartResult, ApiError> {
            Ok(ChartResult {
                template_used: Some(template_id.to_string()),
                message: "From template".to_string(),
                ..Default::default()
            })
        }
    }

    fn state(healthy: bool) -> Arc<AppState> {
        let upstream = Arc::new(FakeUpstream { healthy });
        Arc::new(AppState {
            plant_performance: PlantPerformanceService::new(upstream.clone(), BinWidths::default()),
            tradeoff: TradeoffService::new(upstream.clone(), 2.0),
            chart_sessions: ChartSessionService::new(upstream),
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn no_tradeoff_limits() -> TradeoffParams {
        TradeoffParams {
            wbt_min: None,
            wbt_max: None,
            load_min: None,
            load_max: None,
            cds_step: None,
        }
    }

    #[test]
    fn test_parse_chiller_counts_skips_garbage() {
        let counts = parse_chiller_counts("1, 3,x,,5");
        assert_eq!(counts.into_iter().collect::<Vec<_>>(), vec![1, 3, 5]);
    }

    #[test]
    fn test_series_params_from_query_string() {
        let params: SeriesParams =
            serde_urlencoded_like("primary=cds&primary_step=1.5&secondary=wind&value=power&chillers=2,3");
        let request = params.to_request();
        assert_eq!(request.primary, CategoryField::Cds);
        assert_eq!(request.primary_step, Some(1.5));
        assert_eq!(request.secondary, CategoryField::None);
        assert_eq!(request.value, ValueField::Power);
        assert_eq!(request.chiller_counts.len(), 2);
    }

    fn serde_urlencoded_like(query: &str) -> SeriesParams {
        let uri: axum::http::Uri = format!("/?{}", query).parse().unwrap();
        Query::<SeriesParams>::try_from_uri(&uri).unwrap().0
    }

    #[tokio::test]
    async fn test_tradeoff_returns_optimum() {
        let response = cooling_tower_tradeoff(
            Path("bkk-01".to_string()),
            Query(TemporalFilter::default()),
            Query(no_tradeoff_limits()),
            State(state(true)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["optimal"]["cds"], 82.0);
        assert_eq!(json["buckets"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_tradeoff_with_extreme_step_is_empty_not_an_error() {
        let params = TradeoffParams {
            cds_step: Some(1e-18),
            ..no_tradeoff_limits()
        };
        let response = cooling_tower_tradeoff(
            Path("bkk-01".to_string()),
            Query(TemporalFilter::default()),
            Query(params),
            State(state(true)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["optimal"].is_null());
        assert!(json["buckets"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let response = plant_performance_series(
            Path("bkk-01".to_string()),
            Query(TemporalFilter::default()),
            Query(serde_urlencoded_like("")),
            State(state(false)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_blank_chat_prompt_rejected() {
        let response = submit_chat(
            Path("bkk-01".to_string()),
            State(state(true)),
            Json(ChatRequest {
                prompt: "  ".to_string(),
                parameters: Map::new(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_streams_user_turn_then_updates() {
        let response = submit_chat(
            Path("bkk-01".to_string()),
            State(state(true)),
            Json(ChatRequest {
                prompt: "plant efficiency this week".to_string(),
                parameters: Map::new(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let lines: Vec<Value> = bytes
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).unwrap())
            .collect();

        assert_eq!(lines[0]["type"], "user");
        assert_eq!(lines[0]["text"], "plant efficiency this week");
        let last = lines.last().unwrap();
        assert_eq!(last["type"], "update");
        assert_eq!(last["phase"], "complete");
        assert_eq!(last["turn"]["text"], "Here you go");
    }

    #[tokio::test]
    async fn test_template_chart_turn() {
        let response = chart_from_template(
            Path(("bkk-01".to_string(), "cds_vs_power".to_string())),
            State(state(true)),
            Json(TemplateChartRequest::default()),
        )
        .await;

        let json = body_json(response).await;
        assert_eq!(json["phase"], "complete");
        assert_eq!(json["turn"]["chart"]["template_used"], "cds_vs_power");
    }
}
