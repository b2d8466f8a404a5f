// Repository traits for the upstream analytics API
use crate::application::error::ApiError;
use crate::domain::chart::{ChartResult, TemplateSummary};
use crate::domain::query::TemporalFilter;
use crate::domain::sample::{CtSample, Sample, SampleSet};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

/// Raw body of a streaming response, in whatever chunks the transport delivers
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

#[async_trait]
pub trait ChartRepository: Send + Sync {
    /// Open the streaming chart endpoint. `Ok(None)` means the response had no readable body.
    async fn open_chart_stream(
        &self,
        site_id: &str,
        prompt: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Option<ByteStream>, ApiError>;

    /// Generate a chart in a single round trip (used as the streaming fallback)
    async fn generate_chart(
        &self,
        site_id: &str,
        prompt: &str,
        parameters: &Map<String, Value>,
    ) -> Result<ChartResult, ApiError>;

    async fn list_templates(&self, site_id: &str) -> Result<Vec<TemplateSummary>, ApiError>;

    async fn chart_from_template(
        &self,
        site_id: &str,
        template_id: &str,
        parameters: &Map<String, Value>,
    ) -> Result<ChartResult, ApiError>;
}

#[async_trait]
pub trait SampleRepository: Send + Sync {
    async fn plant_performance(&self, site_id: &str, filter: &TemporalFilter) -> Result<SampleSet<Sample>, ApiError>;

    async fn cooling_tower_tradeoff(
        &self,
        site_id: &str,
        filter: &TemporalFilter,
    ) -> Result<SampleSet<CtSample>, ApiError>;
}
