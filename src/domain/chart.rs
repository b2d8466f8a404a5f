// Chart payloads: generated chart results, templates and plotted series
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Plotly figure as produced by the chart generator, passed through untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlotlySpec {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub layout: Value,
}

/// Result of a chart-generation request.
///
/// Every field defaults, so an empty object is a valid (if uninformative) result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub chart_id: Option<String>,
    #[serde(default)]
    pub plotly_spec: Option<PlotlySpec>,
    #[serde(default)]
    pub template_used: Option<String>,
    #[serde(default)]
    pub template_match_confidence: Option<f64>,
    #[serde(default)]
    pub data_sources: Vec<String>,
    #[serde(default)]
    pub query_summary: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub template_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub usage_count: u64,
}

/// One plotted `(x, y)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Named group of raw points for a plant-performance comparison chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub primary: String,
    pub secondary: String,
    /// Samples in the group, including those without a plotted value
    pub sample_count: usize,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AggregatedChart {
    pub series: Vec<Series>,
    pub primary_groups: usize,
    pub secondary_groups: usize,
    pub displayed: usize,
    pub from_api: usize,
}

/// Averaged power for one condenser-water supply bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradeoffBucket {
    /// Bin start
    pub cds: f64,
    pub mean_chiller_power: f64,
    pub mean_ct_power: f64,
    pub total_power: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TradeoffScatter {
    pub chiller: Vec<Point>,
    pub cooling_tower: Vec<Point>,
    pub total: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TradeoffAnalysis {
    pub buckets: Vec<TradeoffBucket>,
    pub optimal: Option<TradeoffBucket>,
    pub scatter: TradeoffScatter,
    pub sample_count: usize,
}
