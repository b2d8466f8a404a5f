// Plant performance service - Group samples into comparison series
use crate::application::analytics_repository::SampleRepository;
use crate::application::error::ApiError;
use crate::domain::category::{category_value, sort_labels, BinWidths, CategoryField, UNKNOWN_LABEL};
use crate::domain::chart::{AggregatedChart, Point, Series};
use crate::domain::query::TemporalFilter;
use crate::domain::sample::Sample;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

const ALL_DATA_SERIES: &str = "All Data";

/// Reading plotted on the y-axis against cooling load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueField {
    #[default]
    Efficiency,
    Power,
}

impl ValueField {
    fn read(self, sample: &Sample) -> Option<f64> {
        match self {
            ValueField::Efficiency => sample.efficiency,
            ValueField::Power => sample.power,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationRequest {
    pub primary: CategoryField,
    /// Bin width for a continuous primary field; the configured default when unset
    pub primary_step: Option<f64>,
    pub secondary: CategoryField,
    pub secondary_step: Option<f64>,
    pub value: ValueField,
    /// Chiller counts to keep
    pub chiller_counts: BTreeSet<u32>,
}

impl Default for AggregationRequest {
    fn default() -> Self {
        Self {
            primary: CategoryField::None,
            primary_step: None,
            secondary: CategoryField::None,
            secondary_step: None,
            value: ValueField::default(),
            chiller_counts: (1..=5).collect(),
        }
    }
}

/// A grouping axis with its bin width resolved.
struct Dimension {
    field: CategoryField,
    step: Option<f64>,
}

impl Dimension {
    /// `None` when a continuous field ends up without a usable width
    fn resolve(field: CategoryField, step: Option<f64>, widths: &BinWidths) -> Option<Self> {
        if !field.requires_step() {
            return Some(Self { field, step: None });
        }
        let step = step.or_else(|| widths.for_field(field))?;
        if !step.is_finite() || step <= 0.0 {
            return None;
        }
        Some(Self {
            field,
            step: Some(step),
        })
    }

    fn label(&self, sample: &Sample) -> String {
        category_value(sample, self.field, self.step).unwrap_or_else(|| UNKNOWN_LABEL.to_string())
    }
}

fn distinct_sorted(labels: impl Iterator<Item = String>) -> Vec<String> {
    let mut labels: Vec<String> = labels.collect::<BTreeSet<_>>().into_iter().collect();
    sort_labels(&mut labels);
    labels
}

fn series_name(primary: CategoryField, p: &str, secondary: CategoryField, s: &str) -> String {
    match (primary, secondary) {
        (CategoryField::None, CategoryField::None) => ALL_DATA_SERIES.to_string(),
        (_, CategoryField::None) => p.to_string(),
        (CategoryField::None, _) => s.to_string(),
        _ => format!("{} | {}", p, s),
    }
}

/// Partition `samples` into (primary, secondary) groups and emit one series per non-empty group.
///
/// Series come out in primary-major order of the sorted labels. A continuous
/// dimension without a positive bin width yields an empty chart.
pub fn aggregate(samples: &[Sample], request: &AggregationRequest, widths: &BinWidths) -> AggregatedChart {
    let empty = AggregatedChart {
        from_api: samples.len(),
        ..Default::default()
    };

    let (Some(primary), Some(secondary)) = (
        Dimension::resolve(request.primary, request.primary_step, widths),
        Dimension::resolve(request.secondary, request.secondary_step, widths),
    ) else {
        tracing::warn!(
            "Rejecting aggregation with non-positive bin width ({} / {})",
            request.primary,
            request.secondary
        );
        return empty;
    };

    let filtered: Vec<&Sample> = samples
        .iter()
        .filter(|s| request.chiller_counts.contains(&s.num_chillers))
        .collect();

    let labelled: Vec<(String, String, &Sample)> = filtered
        .iter()
        .map(|s| (primary.label(s), secondary.label(s), *s))
        .collect();

    let primary_labels = distinct_sorted(labelled.iter().map(|(p, _, _)| p.clone()));
    let secondary_labels = distinct_sorted(labelled.iter().map(|(_, s, _)| s.clone()));

    let mut groups: HashMap<(&str, &str), Vec<&Sample>> = HashMap::new();
    for (p, s, sample) in &labelled {
        groups.entry((p.as_str(), s.as_str())).or_default().push(*sample);
    }

    let mut series = Vec::new();
    for p in &primary_labels {
        for s in &secondary_labels {
            let Some(members) = groups.get(&(p.as_str(), s.as_str())) else {
                continue;
            };

            let points = members
                .iter()
                .filter_map(|m| request.value.read(m).map(|y| Point::new(m.cooling_load, y)))
                .collect();

            series.push(Series {
                name: series_name(request.primary, p, request.secondary, s),
                primary: p.clone(),
                secondary: s.clone(),
                sample_count: members.len(),
                points,
            });
        }
    }

    tracing::debug!(
        "Aggregated {} of {} samples into {} series ({} x {})",
        filtered.len(),
        samples.len(),
        series.len(),
        primary_labels.len(),
        secondary_labels.len()
    );

    AggregatedChart {
        series,
        primary_groups: primary_labels.len(),
        secondary_groups: secondary_labels.len(),
        displayed: filtered.len(),
        from_api: samples.len(),
    }
}

#[derive(Clone)]
pub struct PlantPerformanceService {
    repository: Arc<dyn SampleRepository>,
    widths: BinWidths,
}

impl PlantPerformanceService {
    pub fn new(repository: Arc<dyn SampleRepository>, widths: BinWidths) -> Self {
        Self { repository, widths }
    }

    pub async fn series(
        &self,
        site_id: &str,
        filter: &TemporalFilter,
        request: &AggregationRequest,
    ) -> Result<AggregatedChart, ApiError> {
        let set = self.repository.plant_performance(site_id, filter).await?;
        let mut chart = aggregate(&set.data, request, &self.widths);
        chart.from_api = set.reported_count();
        Ok(chart)
    }
}
