// Aggregation vocabulary shared by configuration and the feature engines.

use serde::{Deserialize, Serialize};

/// How far back a trailing window reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowMode {
    /// At most the three most recent weeks.
    #[serde(rename = "L3", alias = "l3")]
    Last3,
    /// Every preceding week.
    #[serde(rename = "ALL", alias = "all")]
    All,
}

impl WindowMode {
    /// Label used in feature column names.
    pub fn label(&self) -> &'static str {
        match self {
            WindowMode::Last3 => "L3",
            WindowMode::All => "ALL",
        }
    }
}

/// Whether a window is reduced to an average or a sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalcType {
    #[serde(rename = "AVG", alias = "avg")]
    Avg,
    #[serde(rename = "SUM", alias = "sum")]
    Sum,
}

impl CalcType {
    pub fn label(&self) -> &'static str {
        match self {
            CalcType::Avg => "AVG",
            CalcType::Sum => "SUM",
        }
    }
}

/// Round to the nearest whole number, ties to even.
pub fn round_whole(value: f64) -> f64 {
    value.round_ties_even()
}

/// Round to two decimal places, ties to even.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
