// Category fields and fixed-width binning for grouping samples
use super::sample::Sample;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label every sample resolves to when a dimension is not grouped
pub const ALL_LABEL: &str = "all";

/// Label for samples missing the reading a dimension groups by
pub const UNKNOWN_LABEL: &str = "unknown";

/// How a category field turns a sample into a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// No grouping on this axis
    Ungrouped,
    /// Numeric reading, needs a bin width
    Continuous,
    /// Used verbatim
    Discrete,
    /// Computed from another attribute (the timestamp)
    Derived,
}

/// Sample attribute selected as a grouping axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum CategoryField {
    #[default]
    None,
    Chs,
    Cds,
    OutdoorWbt,
    OutdoorDbt,
    CoolingLoad,
    NumChillers,
    ChillerCombination,
    Month,
}

impl CategoryField {
    pub fn kind(self) -> FieldKind {
        match self {
            CategoryField::None => FieldKind::Ungrouped,
            CategoryField::Chs
            | CategoryField::Cds
            | CategoryField::OutdoorWbt
            | CategoryField::OutdoorDbt
            | CategoryField::CoolingLoad => FieldKind::Continuous,
            CategoryField::NumChillers | CategoryField::ChillerCombination => FieldKind::Discrete,
            CategoryField::Month => FieldKind::Derived,
        }
    }

    pub fn requires_step(self) -> bool {
        self.kind() == FieldKind::Continuous
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CategoryField::None => "none",
            CategoryField::Chs => "chs",
            CategoryField::Cds => "cds",
            CategoryField::OutdoorWbt => "outdoor_wbt",
            CategoryField::OutdoorDbt => "outdoor_dbt",
            CategoryField::CoolingLoad => "cooling_load",
            CategoryField::NumChillers => "num_chillers",
            CategoryField::ChillerCombination => "chiller_combination",
            CategoryField::Month => "month",
        }
    }

    /// Reading for continuous fields, `None` for the rest or a missing reading
    fn reading(self, sample: &Sample) -> Option<f64> {
        match self {
            CategoryField::Chs => sample.chs,
            CategoryField::Cds => sample.cds,
            CategoryField::OutdoorWbt => sample.outdoor_wbt,
            CategoryField::OutdoorDbt => sample.outdoor_dbt,
            CategoryField::CoolingLoad => Some(sample.cooling_load),
            _ => None,
        }
    }
}

impl From<&str> for CategoryField {
    /// Unrecognized names fall back to `None` so a bad selector never fails a request.
    fn from(name: &str) -> Self {
        match name.trim() {
            "chs" => CategoryField::Chs,
            "cds" => CategoryField::Cds,
            "outdoor_wbt" => CategoryField::OutdoorWbt,
            "outdoor_dbt" => CategoryField::OutdoorDbt,
            "cooling_load" => CategoryField::CoolingLoad,
            "num_chillers" => CategoryField::NumChillers,
            "chiller_combination" => CategoryField::ChillerCombination,
            "month" => CategoryField::Month,
            _ => CategoryField::None,
        }
    }
}

impl From<String> for CategoryField {
    fn from(name: String) -> Self {
        CategoryField::from(name.as_str())
    }
}

impl fmt::Display for CategoryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default bin widths per continuous field.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BinWidths {
    #[serde(default = "default_chs_step")]
    pub chs: f64,
    #[serde(default = "default_cds_step")]
    pub cds: f64,
    #[serde(default = "default_outdoor_step")]
    pub outdoor_wbt: f64,
    #[serde(default = "default_outdoor_step")]
    pub outdoor_dbt: f64,
    #[serde(default = "default_cooling_load_step")]
    pub cooling_load: f64,
}

fn default_chs_step() -> f64 {
    2.0
}

fn default_cds_step() -> f64 {
    3.0
}

fn default_outdoor_step() -> f64 {
    5.0
}

fn default_cooling_load_step() -> f64 {
    100.0
}

impl Default for BinWidths {
    fn default() -> Self {
        Self {
            chs: default_chs_step(),
            cds: default_cds_step(),
            outdoor_wbt: default_outdoor_step(),
            outdoor_dbt: default_outdoor_step(),
            cooling_load: default_cooling_load_step(),
        }
    }
}

impl BinWidths {
    /// Default width for a continuous field, `None` for fields that are not binned
    pub fn for_field(&self, field: CategoryField) -> Option<f64> {
        match field {
            CategoryField::Chs => Some(self.chs),
            CategoryField::Cds => Some(self.cds),
            CategoryField::OutdoorWbt => Some(self.outdoor_wbt),
            CategoryField::OutdoorDbt => Some(self.outdoor_dbt),
            CategoryField::CoolingLoad => Some(self.cooling_load),
            _ => None,
        }
    }
}

/// Bins further than this many steps from zero are rejected; their edges
/// can no longer be told apart from the value at f64 precision.
const MAX_BIN_INDEX: f64 = 4_294_967_296.0;

/// Half-open interval `[start, end)` of width `step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    /// Bin number, `start == index * step`
    pub index: i64,
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl Bin {
    /// Bin containing `value`.
    ///
    /// `None` when `step` is not positive, either input is not finite, or
    /// `value` lies more than `2^32` steps from zero.
    pub fn of(value: f64, step: f64) -> Option<Bin> {
        if !value.is_finite() || !step.is_finite() || step <= 0.0 {
            return None;
        }

        let quotient = (value / step).floor();
        if quotient.abs() >= MAX_BIN_INDEX {
            return None;
        }

        let mut index = quotient as i64;
        // value / step can round across an integer boundary
        if index as f64 * step > value {
            index -= 1;
        } else if (index + 1) as f64 * step <= value {
            index += 1;
        }

        Some(Bin {
            index,
            start: index as f64 * step,
            end: (index + 1) as f64 * step,
            step,
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        self.start <= value && value < self.end
    }

    /// `"{start}-{end}"`, with both edges rounded to the decimals of `step`
    pub fn label(&self) -> String {
        let decimals = step_decimals(self.step);
        format!(
            "{}-{}",
            round_to(self.start, decimals),
            round_to(self.end, decimals)
        )
    }
}

/// Number of decimal places needed to write `step` exactly, capped at 20.
fn step_decimals(step: f64) -> i32 {
    (0..=20)
        .find(|&d| {
            let scaled = step * 10f64.powi(d);
            (scaled - scaled.round()).abs() <= 1e-9 * scaled.abs().max(1.0)
        })
        .unwrap_or(20)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    if !rounded.is_finite() {
        return value;
    }
    // no "-0" labels
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Label of `sample` along `field`.
///
/// `step` is only consulted for continuous fields; a missing or non-positive
/// step yields `None`, which callers treat as a degenerate request.
pub fn category_value(sample: &Sample, field: CategoryField, step: Option<f64>) -> Option<String> {
    match field.kind() {
        FieldKind::Ungrouped => Some(ALL_LABEL.to_string()),
        FieldKind::Discrete => Some(match field {
            CategoryField::NumChillers => sample.num_chillers.to_string(),
            _ => sample
                .chiller_combination
                .clone()
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        }),
        FieldKind::Derived => Some(sample.timestamp.format("%b").to_string()),
        FieldKind::Continuous => {
            let step = step.filter(|s| s.is_finite() && *s > 0.0)?;
            Some(match field.reading(sample) {
                Some(value) => Bin::of(value, step)
                    .map(|bin| bin.label())
                    .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
                None => UNKNOWN_LABEL.to_string(),
            })
        }
    }
}

/// Numeric prefix of a label, the way bin labels such as `20-22` or `-5-0` sort.
pub fn leading_number(label: &str) -> Option<f64> {
    let bytes = label.as_bytes();
    let mut end = 0;
    if bytes.first() == Some(&b'-') {
        end = 1;
    }
    let digits_start = end;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    if end == digits_start {
        return None;
    }
    label[..end].parse().ok()
}

/// Sort labels numerically when every one starts with a number, else
/// lexicographically. `unknown` is left out of that decision and always sorts last.
pub fn sort_labels(labels: &mut [String]) {
    let numeric = labels
        .iter()
        .filter(|l| l.as_str() != UNKNOWN_LABEL)
        .all(|l| leading_number(l).is_some());

    labels.sort_by(|a, b| {
        let (a_unknown, b_unknown) = (a == UNKNOWN_LABEL, b == UNKNOWN_LABEL);
        if a_unknown || b_unknown {
            return a_unknown.cmp(&b_unknown);
        }
        if numeric {
            let a = leading_number(a).unwrap_or(f64::NAN);
            let b = leading_number(b).unwrap_or(f64::NAN);
            a.total_cmp(&b)
        } else {
            a.cmp(b)
        }
    });
}
