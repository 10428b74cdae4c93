use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::dhis2::{DataValue, DataValueQuery, DataValueStore, ImportSummary};
use crate::error::{PipelineError, Result};
use crate::utils::constants::{DHIS2_IMPORT_STRATEGY, DHIS2_MAX_POST_VALUES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dhis2Auth {
    None,
    Basic { username: String, password: String },
    /// Personal access token, sent as `ApiToken <token>`.
    Token(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataValueSet {
    #[serde(default)]
    data_values: Vec<DataValue>,
}

/// DHIS2 Web API client for `/api/dataValueSets`.
pub struct Dhis2Client {
    base_url: String,
    client: Client,
    auth: Dhis2Auth,
}

impl Dhis2Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            auth: Dhis2Auth::None,
        }
    }

    pub fn with_auth(mut self, auth: Dhis2Auth) -> Self {
        self.auth = auth;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Dhis2Auth::None => request,
            Dhis2Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Dhis2Auth::Token(token) => request.header(AUTHORIZATION, format!("ApiToken {}", token)),
        }
    }

    fn existing_values_request(&self, query: &DataValueQuery) -> RequestBuilder {
        let mut params = vec![
            ("dataSet", query.data_set.clone()),
            ("startDate", query.start.to_string()),
            ("endDate", query.end.to_string()),
        ];
        params.extend(query.org_units.iter().map(|ou| ("orgUnit", ou.clone())));

        self.authorize(self.client.get(self.endpoint("dataValueSets")))
            .header(ACCEPT, "application/json")
            .query(&params)
    }

    fn post_request(&self, values: &[DataValue], dry_run: bool) -> RequestBuilder {
        let params = [
            ("importStrategy", DHIS2_IMPORT_STRATEGY),
            ("dryRun", if dry_run { "true" } else { "false" }),
        ];

        self.authorize(self.client.post(self.endpoint("dataValueSets")))
            .header(ACCEPT, "application/json")
            .query(&params)
            .json(&json!({ "dataValues": values }))
    }
}

impl DataValueStore for Dhis2Client {
    async fn existing_values(&self, query: &DataValueQuery) -> Result<Vec<DataValue>> {
        let response = self
            .existing_values_request(query)
            .send()
            .await?
            .error_for_status()?;

        let set: DataValueSet = response.json().await?;
        tracing::debug!(count = set.data_values.len(), data_set = %query.data_set, "fetched existing data values");
        Ok(set.data_values)
    }

    /// Post in chunks of [`DHIS2_MAX_POST_VALUES`] and merge the summaries.
    async fn post_values(&self, values: &[DataValue], dry_run: bool) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for chunk in values.chunks(DHIS2_MAX_POST_VALUES) {
            let response = self.post_request(chunk, dry_run).send().await?;
            let status = response.status();

            // Conflicts come back as 409 with an import summary body
            if !status.is_success() && status != StatusCode::CONFLICT {
                let body = response.text().await.unwrap_or_default();
                return Err(PipelineError::Dhis2(format!(
                    "POST dataValueSets returned {}: {}",
                    status, body
                )));
            }

            summary.merge(ImportSummary::from_response(response.json().await?)?);
            tracing::debug!(values = chunk.len(), dry_run, "posted data value chunk");
        }

        Ok(summary)
    }
}
