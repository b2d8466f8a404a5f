// Temporal filters shared by the sample endpoints
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[default]
    #[serde(rename = "1h")]
    OneHour,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    #[default]
    All,
    Weekdays,
    Weekends,
}

/// Date range, time-of-day window and day type applied upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "default_start_time")]
    pub start_time: String,
    #[serde(default = "default_end_time")]
    pub end_time: String,
    #[serde(default)]
    pub day_type: DayType,
}

fn default_start_time() -> String {
    "00:00".to_string()
}

fn default_end_time() -> String {
    "23:59".to_string()
}

impl Default for TemporalFilter {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            resolution: Resolution::default(),
            start_time: default_start_time(),
            end_time: default_end_time(),
            day_type: DayType::default(),
        }
    }
}
