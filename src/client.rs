//! Single-request client for the case query endpoint.
//!
//! One call, one `POST`. Retry and pacing belong to the batch runner; this
//! layer only reports what the server said.
use crate::config::{Endpoints, Environment};
use crate::error::{QueryError, QueryResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// Raw API record: field key to scalar value.
pub type RawRecord = Map<String, Value>;

const FIRST_PAGE: u32 = 1;
const PAGE_SIZE: u32 = 50;

/// API parameter a batch run searches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryField {
    #[default]
    ReceiptNumber,
    ApplyNumber,
    PolicyNumber,
    ApprovalNumber,
    InsuredId,
}

impl QueryField {
    pub const ALL: [QueryField; 5] = [
        QueryField::ReceiptNumber,
        QueryField::ApplyNumber,
        QueryField::PolicyNumber,
        QueryField::ApprovalNumber,
        QueryField::InsuredId,
    ];

    /// Parameter key sent to the API.
    pub fn key(self) -> &'static str {
        match self {
            QueryField::ReceiptNumber => "receiptNumber",
            QueryField::ApplyNumber => "applyNumber",
            QueryField::PolicyNumber => "policyNumber",
            QueryField::ApprovalNumber => "approvalNumber",
            QueryField::InsuredId => "insuredId",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QueryField::ReceiptNumber => "送金單號碼",
            QueryField::ApplyNumber => "受理號碼",
            QueryField::PolicyNumber => "保單號碼",
            QueryField::ApprovalNumber => "確認書編號",
            QueryField::InsuredId => "被保人ID",
        }
    }
}

impl fmt::Display for QueryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for QueryField {
    type Err = QueryError;

    /// Accepts the API key (`policyNumber`) or its kebab form (`policy-number`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        QueryField::ALL
            .into_iter()
            .find(|field| field.key().to_ascii_lowercase() == wanted)
            .ok_or_else(|| QueryError::UnknownField(s.to_string()))
    }
}

/// Anything that can answer one case query.
pub trait QueryBackend {
    fn query(&mut self, field: QueryField, value: &str) -> QueryResult<Vec<RawRecord>>;

    /// Follow an environment switch. Backends without endpoints ignore it.
    fn set_environment(&mut self, _environment: Environment) {}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    current_page: u32,
    page_size: u32,
    #[serde(flatten)]
    criteria: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    records: Option<Vec<RawRecord>>,
}

/// HTTP client bound to one environment and credential.
pub struct HttpQueryClient {
    agent: ureq::Agent,
    endpoints: Endpoints,
    environment: Environment,
    credential: String,
}

impl HttpQueryClient {
    pub fn new(
        endpoints: Endpoints,
        environment: Environment,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            endpoints,
            environment,
            credential: credential.into(),
        }
    }

    pub fn url(&self) -> &str {
        self.endpoints.url_for(self.environment)
    }
}

impl QueryBackend for HttpQueryClient {
    fn query(&mut self, field: QueryField, value: &str) -> QueryResult<Vec<RawRecord>> {
        let mut criteria = Map::new();
        criteria.insert(field.key().to_string(), Value::String(value.to_string()));
        let body = QueryRequest {
            current_page: FIRST_PAGE,
            page_size: PAGE_SIZE,
            criteria,
        };

        let start = Instant::now();
        let mut response = match self
            .agent
            .post(self.url())
            .header("Authorization", format!("Bearer {}", self.credential))
            .send_json(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(status)) => {
                tracing::debug!(status, field = field.key(), value, "query rejected");
                return Err(QueryError::RequestFailed { status });
            }
            Err(err) => return Err(QueryError::Transport(err.to_string())),
        };

        let parsed: QueryResponse = response
            .body_mut()
            .read_json()
            .map_err(|err| QueryError::Decode(err.to_string()))?;
        let records = parsed.records.unwrap_or_default();
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            field = field.key(),
            value,
            records = records.len(),
            "query complete"
        );
        Ok(records)
    }

    fn set_environment(&mut self, environment: Environment) {
        self.environment = environment;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_field_parses_key_and_kebab_forms() {
        assert_eq!(
            "policyNumber".parse::<QueryField>().unwrap(),
            QueryField::PolicyNumber
        );
        assert_eq!(
            "insured-id".parse::<QueryField>().unwrap(),
            QueryField::InsuredId
        );
        assert!("claimNumber".parse::<QueryField>().is_err());
    }

    #[test]
    fn request_body_carries_pagination_and_criteria() {
        let mut criteria = Map::new();
        criteria.insert("receiptNumber".to_string(), Value::from("A1"));
        let body = QueryRequest {
            current_page: FIRST_PAGE,
            page_size: PAGE_SIZE,
            criteria,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"currentPage": 1, "pageSize": 50, "receiptNumber": "A1"})
        );
    }

    #[test]
    fn response_without_records_is_empty() {
        let parsed: QueryResponse = serde_json::from_str(r#"{"total":0}"#).unwrap();
        assert!(parsed.records.unwrap_or_default().is_empty());
        let parsed: QueryResponse = serde_json::from_str(r#"{"records":null}"#).unwrap();
        assert!(parsed.records.unwrap_or_default().is_empty());
    }
}
