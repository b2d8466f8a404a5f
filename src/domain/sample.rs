// Historical operating-point samples as served by the analytics API
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One plant-performance operating point.
///
/// Readings the upstream could not join for a timestamp arrive as `null`,
/// hence the optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<FixedOffset>,
    pub cooling_load: f64,
    #[serde(default)]
    pub power: Option<f64>,
    #[serde(default)]
    pub efficiency: Option<f64>,
    #[serde(default)]
    pub num_chillers: u32,
    #[serde(default)]
    pub chiller_combination: Option<String>,
    #[serde(default)]
    pub chs: Option<f64>,
    #[serde(default)]
    pub cds: Option<f64>,
    #[serde(default)]
    pub outdoor_wbt: Option<f64>,
    #[serde(default)]
    pub outdoor_dbt: Option<f64>,
}

/// One cooling-tower tradeoff sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtSample {
    pub timestamp: DateTime<FixedOffset>,
    pub cds: f64,
    pub power_chillers: f64,
    pub power_cts: f64,
    pub outdoor_wbt: f64,
    pub cooling_load: f64,
}

/// Envelope returned by the sample endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleSet<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub count: Option<usize>,
}

impl<T> SampleSet<T> {
    /// Number of samples the API reports, falling back to the payload length
    pub fn reported_count(&self) -> usize {
        self.count.unwrap_or(self.data.len())
    }
}
