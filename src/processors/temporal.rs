use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};
use crate::models::{DailyRecord, Frequency, PeriodRecord, TemporalAggregation};
use crate::utils::periods::{epi_week, epi_week_period, iso_week_period, month_period};

#[derive(Debug, Default)]
struct PeriodStats {
    sum: f64,
    count: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl PeriodStats {
    fn push(&mut self, record: &DailyRecord) {
        if let Some(mean) = record.mean {
            self.sum += mean;
            self.count += 1;
        }
        if let Some(min) = record.min {
            self.min = Some(self.min.map_or(min, |m| m.min(min)));
        }
        if let Some(max) = record.max {
            self.max = Some(self.max.map_or(max, |m| m.max(max)));
        }
    }

    fn value(&self, aggregation: TemporalAggregation) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        match aggregation {
            TemporalAggregation::Sum => Some(self.sum),
            TemporalAggregation::Mean => Some(self.sum / self.count as f64),
        }
    }
}

/// Resamples daily boundary statistics to weeks and months.
pub struct TemporalAggregator {
    aggregation: TemporalAggregation,
}

impl TemporalAggregator {
    pub fn new(aggregation: TemporalAggregation) -> Self {
        Self { aggregation }
    }

    /// Group daily rows by boundary and period.
    ///
    /// Daily means are summed or averaged according to the aggregation
    /// policy; `min` and `max` are always the extremes of the daily values.
    /// Rows are ordered by boundary id, then chronologically by period.
    pub fn resample(&self, daily: &[DailyRecord], frequency: Frequency) -> Result<Vec<PeriodRecord>> {
        if frequency == Frequency::Daily {
            return Err(PipelineError::Config(
                "Daily statistics cannot be resampled to daily".to_string(),
            ));
        }

        let mut groups: BTreeMap<(String, i32, u32), (String, PeriodStats)> = BTreeMap::new();
        for record in daily {
            let (year, number) = period_key(record.date, frequency);
            groups
                .entry((record.boundary_id.clone(), year, number))
                .or_insert_with(|| (period_label(record.date, frequency), PeriodStats::default()))
                .1
                .push(record);
        }

        Ok(groups
            .into_iter()
            .map(|((boundary_id, _, _), (period, stats))| PeriodRecord {
                boundary_id,
                period,
                mean: stats.value(self.aggregation),
                min: stats.min,
                max: stats.max,
            })
            .collect())
    }
}

fn period_key(date: NaiveDate, frequency: Frequency) -> (i32, u32) {
    match frequency {
        Frequency::Daily => (date.year(), date.ordinal()),
        Frequency::Weekly => {
            let week = date.iso_week();
            (week.year(), week.week())
        }
        Frequency::EpiWeekly => epi_week(date),
        Frequency::Monthly => (date.year(), date.month()),
    }
}

fn period_label(date: NaiveDate, frequency: Frequency) -> String {
    match frequency {
        Frequency::Daily => date.format("%Y-%m-%d").to_string(),
        Frequency::Weekly => iso_week_period(date),
        Frequency::EpiWeekly => epi_week_period(date),
        Frequency::Monthly => month_period(date),
    }
}
