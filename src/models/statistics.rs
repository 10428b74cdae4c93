use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::UnitConversion;

/// Temporal granularity of an aggregated table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    EpiWeekly,
    Monthly,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::EpiWeekly,
        Frequency::Monthly,
    ];

    /// Suffix used in output file names.
    pub fn suffix(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::EpiWeekly => "epi_weekly",
            Frequency::Monthly => "monthly",
        }
    }

    /// Name of the period column in the output table.
    pub fn period_column(&self) -> &'static str {
        match self {
            Frequency::Daily => "date",
            Frequency::Weekly => "week",
            Frequency::EpiWeekly => "epi_week",
            Frequency::Monthly => "month",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Frequency::ALL
            .into_iter()
            .find(|f| f.suffix() == s)
            .ok_or_else(|| {
                format!(
                    "unknown frequency '{}', expected one of daily, weekly, epi_weekly, monthly",
                    s
                )
            })
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// Per-boundary statistics for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub boundary_id: String,
    pub date: NaiveDate,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl DailyRecord {
    pub fn convert(&mut self, conversion: UnitConversion) {
        self.mean = self.mean.map(|v| conversion.apply(v));
        self.min = self.min.map(|v| conversion.apply(v));
        self.max = self.max.map(|v| conversion.apply(v));
    }
}

/// Per-boundary statistics for a week or month, keyed by a period label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub boundary_id: String,
    pub period: String,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}
