// Cooling tower tradeoff service - Optimal condenser-water setpoint search
use crate::application::analytics_repository::SampleRepository;
use crate::application::error::ApiError;
use crate::domain::category::Bin;
use crate::domain::chart::{Point, TradeoffAnalysis, TradeoffBucket, TradeoffScatter};
use crate::domain::query::TemporalFilter;
use crate::domain::sample::CtSample;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Operating window the analysis is restricted to; bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeoffRequest {
    pub wbt_min: f64,
    pub wbt_max: f64,
    pub load_min: f64,
    pub load_max: f64,
    /// CDS bin width; the configured default when unset
    pub cds_step: Option<f64>,
}

impl Default for TradeoffRequest {
    fn default() -> Self {
        Self {
            wbt_min: f64::NEG_INFINITY,
            wbt_max: f64::INFINITY,
            load_min: f64::NEG_INFINITY,
            load_max: f64::INFINITY,
            cds_step: None,
        }
    }
}

impl TradeoffRequest {
    fn admits(&self, sample: &CtSample) -> bool {
        self.wbt_min <= sample.outdoor_wbt
            && sample.outdoor_wbt <= self.wbt_max
            && self.load_min <= sample.cooling_load
            && sample.cooling_load <= self.load_max
            && sample.power_chillers.is_finite()
            && sample.power_cts.is_finite()
    }
}

#[derive(Default)]
struct BucketSums {
    start: f64,
    chiller: f64,
    cooling_tower: f64,
    count: usize,
}

/// Average chiller and tower power per CDS bin and pick the bin with the lowest total.
///
/// Buckets are keyed by bin index, so they come out in ascending CDS order and
/// ties resolve to the lowest CDS. No matching samples (or a non-positive
/// width) gives no buckets and no optimum.
pub fn optimize(samples: &[CtSample], request: &TradeoffRequest, step: f64) -> TradeoffAnalysis {
    let mut buckets: BTreeMap<i64, BucketSums> = BTreeMap::new();
    let mut scatter = TradeoffScatter::default();

    for sample in samples.iter().filter(|s| request.admits(s)) {
        let Some(bin) = Bin::of(sample.cds, step) else {
            continue;
        };

        let sums = buckets.entry(bin.index).or_insert_with(|| BucketSums {
            start: bin.start,
            ..Default::default()
        });
        sums.chiller += sample.power_chillers;
        sums.cooling_tower += sample.power_cts;
        sums.count += 1;

        scatter.chiller.push(Point::new(sample.cds, sample.power_chillers));
        scatter.cooling_tower.push(Point::new(sample.cds, sample.power_cts));
        scatter
            .total
            .push(Point::new(sample.cds, sample.power_chillers + sample.power_cts));
    }

    let buckets: Vec<TradeoffBucket> = buckets
        .into_values()
        .map(|sums| {
            let mean_chiller_power = sums.chiller / sums.count as f64;
            let mean_ct_power = sums.cooling_tower / sums.count as f64;
            TradeoffBucket {
                cds: sums.start,
                mean_chiller_power,
                mean_ct_power,
                total_power: mean_chiller_power + mean_ct_power,
                count: sums.count,
            }
        })
        .collect();

    let optimal = buckets.iter().copied().fold(None, |best: Option<TradeoffBucket>, bucket| match best {
        Some(best) if best.total_power <= bucket.total_power => Some(best),
        _ => Some(bucket),
    });

    let sample_count = buckets.iter().map(|b| b.count).sum();
    if let Some(best) = &optimal {
        tracing::debug!(
            "Optimal CDS bin {} ({:.1} kW) across {} buckets",
            best.cds,
            best.total_power,
            buckets.len()
        );
    }

    TradeoffAnalysis {
        buckets,
        optimal,
        scatter,
        sample_count,
    }
}

#[derive(Clone)]
pub struct TradeoffService {
    repository: Arc<dyn SampleRepository>,
    default_step: f64,
}

impl TradeoffService {
    pub fn new(repository: Arc<dyn SampleRepository>, default_step: f64) -> Self {
        Self {
            repository,
            default_step,
        }
    }

    pub async fn analyze(
        &self,
        site_id: &str,
        filter: &TemporalFilter,
        request: &TradeoffRequest,
    ) -> Result<TradeoffAnalysis, ApiError> {
        let set = self.repository.cooling_tower_tradeoff(site_id, filter).await?;
        let step = request.cds_step.unwrap_or(self.default_step);
        tracing::debug!(
            "Tradeoff for {} over {} samples (cds step {})",
            site_id,
            set.data.len(),
            step
        );
        Ok(optimize(&set.data, request, step))
    }
}
