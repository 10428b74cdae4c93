//! DHIS2 data value exchange.
//!
//! The import pipeline reads and writes data values through
//! [`DataValueStore`]. [`Dhis2Client`] talks to the DHIS2 Web API;
//! [`OfflineStore`] stands in when only a dry run is wanted and no
//! instance is configured.
#![allow(async_fn_in_trait)]

pub mod client;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::Frequency;

pub use client::{Dhis2Auth, Dhis2Client};

/// One DHIS2 data value, serialized with the Web API field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValue {
    pub data_element: String,
    #[serde(default)]
    pub category_option_combo: String,
    #[serde(default)]
    pub attribute_option_combo: String,
    pub org_unit: String,
    pub period: String,
    #[serde(default)]
    pub value: String,
}

/// Data values already stored for a data set.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValueQuery {
    pub data_set: String,
    pub org_units: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportCount {
    pub imported: u64,
    pub updated: u64,
    pub ignored: u64,
    pub deleted: u64,
}

/// Import summary as returned by `POST /api/dataValueSets`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportSummary {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub import_count: ImportCount,
    pub conflicts: Vec<serde_json::Value>,
}

impl ImportSummary {
    /// Parse a response body, unwrapping the `response` envelope newer
    /// DHIS2 versions put around the summary.
    pub fn from_response(body: serde_json::Value) -> Result<Self> {
        let summary = match body.get("response") {
            Some(inner) if inner.get("importCount").is_some() => inner.clone(),
            _ => body,
        };
        Ok(serde_json::from_value(summary)?)
    }

    /// Fold the summary of another chunk into this one.
    pub fn merge(&mut self, other: ImportSummary) {
        self.import_count.imported += other.import_count.imported;
        self.import_count.updated += other.import_count.updated;
        self.import_count.ignored += other.import_count.ignored;
        self.import_count.deleted += other.import_count.deleted;
        self.conflicts.extend(other.conflicts);
        if status_rank(&other.status) > status_rank(&self.status) {
            self.status = other.status;
        }
        if self.description.is_none() {
            self.description = other.description;
        }
    }
}

fn status_rank(status: &str) -> u8 {
    match status {
        "ERROR" => 3,
        "WARNING" => 2,
        "SUCCESS" | "OK" => 1,
        _ => 0,
    }
}

pub trait DataValueStore {
    async fn existing_values(&self, query: &DataValueQuery) -> Result<Vec<DataValue>>;

    /// Create or update `values`, validating only when `dry_run` is set.
    async fn post_values(&self, values: &[DataValue], dry_run: bool) -> Result<ImportSummary>;
}

/// Store used for dry runs when no DHIS2 instance is configured.
///
/// It holds no data values and refuses real imports.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineStore;

impl DataValueStore for OfflineStore {
    async fn existing_values(&self, _query: &DataValueQuery) -> Result<Vec<DataValue>> {
        Ok(Vec::new())
    }

    async fn post_values(&self, values: &[DataValue], dry_run: bool) -> Result<ImportSummary> {
        if !dry_run {
            return Err(PipelineError::Config(
                "No DHIS2 instance configured: set dhis2.url or use --dry-run".to_string(),
            ));
        }
        Ok(ImportSummary {
            status: "SUCCESS".to_string(),
            description: Some("Dry run without a DHIS2 instance, values were not validated".to_string()),
            import_count: ImportCount {
                imported: values.len() as u64,
                ..Default::default()
            },
            conflicts: Vec::new(),
        })
    }
}

/// DHIS2 period identifier for an aggregated period label.
///
/// Weekly (`2024W1`) and monthly (`202401`) labels are already DHIS2
/// periods. Epidemiological weeks start on Sunday, which DHIS2 spells
/// `2024SunW1`.
pub fn dhis2_period(frequency: Frequency, label: &str) -> String {
    match frequency {
        Frequency::EpiWeekly => label.replacen('W', "SunW", 1),
        _ => label.to_string(),
    }
}

/// DHIS2 daily period, e.g. `20240131`.
pub fn dhis2_day(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_data_value_field_names() {
        let value = DataValue {
            data_element: "dx1".to_string(),
            category_option_combo: "coc".to_string(),
            attribute_option_combo: "coc".to_string(),
            org_unit: "ou1".to_string(),
            period: "2024W1".to_string(),
            value: "26.85".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({
                "dataElement": "dx1",
                "categoryOptionCombo": "coc",
                "attributeOptionCombo": "coc",
                "orgUnit": "ou1",
                "period": "2024W1",
                "value": "26.85"
            })
        );
    }

    #[test]
    fn test_summary_from_wrapped_and_bare_responses() {
        let wrapped = json!({
            "httpStatus": "OK",
            "response": {"status": "SUCCESS", "importCount": {"imported": 3, "updated": 1, "ignored": 0, "deleted": 0}}
        });
        let summary = ImportSummary::from_response(wrapped).unwrap();
        assert_eq!(summary.status, "SUCCESS");
        assert_eq!(summary.import_count.imported, 3);
        assert_eq!(summary.import_count.updated, 1);

        let bare = json!({"status": "WARNING", "importCount": {"ignored": 2}, "conflicts": [{"object": "ou9"}]});
        let summary = ImportSummary::from_response(bare).unwrap();
        assert_eq!(summary.status, "WARNING");
        assert_eq!(summary.import_count.ignored, 2);
        assert_eq!(summary.conflicts.len(), 1);
    }

    #[test]
    fn test_merge_keeps_worst_status() {
        let mut total = ImportSummary::default();
        total.merge(ImportSummary {
            status: "SUCCESS".to_string(),
            import_count: ImportCount { imported: 1000, ..Default::default() },
            ..Default::default()
        });
        total.merge(ImportSummary {
            status: "WARNING".to_string(),
            import_count: ImportCount { imported: 5, ignored: 2, ..Default::default() },
            conflicts: vec![json!({"value": "bad"})],
            ..Default::default()
        });
        total.merge(ImportSummary {
            status: "SUCCESS".to_string(),
            ..Default::default()
        });

        assert_eq!(total.status, "WARNING");
        assert_eq!(total.import_count.imported, 1005);
        assert_eq!(total.import_count.ignored, 2);
        assert_eq!(total.conflicts.len(), 1);
    }

    #[test]
    fn test_period_identifiers() {
        assert_eq!(dhis2_period(Frequency::EpiWeekly, "2024W1"), "2024SunW1");
        assert_eq!(dhis2_period(Frequency::Weekly, "2024W1"), "2024W1");
        assert_eq!(dhis2_period(Frequency::Monthly, "202401"), "202401");
        assert_eq!(dhis2_day(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()), "20240131");
    }

    #[tokio::test]
    async fn test_offline_store_refuses_real_imports() {
        let values = vec![DataValue {
            data_element: "dx1".to_string(),
            category_option_combo: String::new(),
            attribute_option_combo: String::new(),
            org_unit: "ou1".to_string(),
            period: "202401".to_string(),
            value: "1".to_string(),
        }];

        let summary = OfflineStore.post_values(&values, true).await.unwrap();
        assert_eq!(summary.import_count.imported, 1);
        assert!(matches!(
            OfflineStore.post_values(&values, false).await,
            Err(PipelineError::Config(_))
        ));
    }
}
