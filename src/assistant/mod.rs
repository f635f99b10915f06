use crate::engine::csv;
use crate::engine::schema;
use crate::engine::table::TableStore;
use crate::event::AppEvent;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Client-side wait budget for one process call. The upstream request may
/// still complete on the provider side after we give up.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/process";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TablePayload {
    #[serde(rename = "currentData")]
    pub current_data: String,
    #[serde(rename = "originalData")]
    pub original_data: String,
}

/// The wire form of one command cycle: the instruction, the table it targets
/// by default, and every table the assistant may read or reference.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProcessRequest {
    pub command: String,
    #[serde(rename = "activeTableName")]
    pub active_table_name: String,
    pub workspace: BTreeMap<String, TablePayload>,
}

impl ProcessRequest {
    pub fn new(command: String, active_table_name: String, workspace: &TableStore) -> Self {
        let workspace = workspace
            .iter()
            .map(|table| {
                (
                    table.name.clone(),
                    TablePayload {
                        current_data: table.current_data.clone(),
                        original_data: if table.original_data.is_empty() {
                            table.current_data.clone()
                        } else {
                            table.original_data.clone()
                        },
                    },
                )
            })
            .collect();
        Self {
            command,
            active_table_name,
            workspace,
        }
    }
}

/// A validated assistant reply. `result` always carries a parseable header
/// row; any upstream truncation marker row has already been stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub result: String,
    pub chart: Option<Value>,
    pub target_table: Option<String>,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    NotAnObject,
    MissingResult,
    NoHeaderRow,
    BadChart,
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "response body is not a JSON object"),
            Self::MissingResult => write!(f, "response carries no result text"),
            Self::NoHeaderRow => write!(f, "result has no parseable header row"),
            Self::BadChart => write!(f, "chart field is neither an object nor null"),
        }
    }
}

/// Failure classes of one send cycle, as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Upstream(String),
    Invalid(String),
}

/// Rows the upstream appends when it caps a result, e.g. a single trailing
/// cell reading "... 120 more rows truncated". Such a row must not count as
/// data or influence schema reasoning.
fn is_truncation_marker(row: &[String]) -> bool {
    let mut populated = row.iter().filter(|cell| !cell.trim().is_empty());
    let Some(first) = populated.next() else {
        return false;
    };
    if populated.next().is_some() {
        return false;
    }
    let text = first.trim().to_ascii_lowercase();
    text.contains("truncated") || text.starts_with('…') || text.starts_with("...")
}

fn strip_truncation_marker(result: &str) -> (String, bool) {
    let rows = csv::parse(result);
    match rows.last() {
        Some(last) if rows.len() > 1 && is_truncation_marker(last) => {
            (csv::serialize(&rows[..rows.len() - 1]), true)
        }
        _ => (result.to_string(), false),
    }
}

/// Parses a raw response body into a strict reply, rejecting anything that
/// does not conform rather than letting partial output through.
pub fn validate_reply(raw: &Value) -> Result<AssistantReply, ReplyError> {
    let object = raw.as_object().ok_or(ReplyError::NotAnObject)?;

    let result = object
        .get("result")
        .and_then(Value::as_str)
        .map(csv::sanitize)
        .filter(|text| !text.is_empty())
        .ok_or(ReplyError::MissingResult)?;

    let (result, truncated) = strip_truncation_marker(&result);
    if schema::extract_headers(&result).is_empty() {
        return Err(ReplyError::NoHeaderRow);
    }

    let chart = match object.get("chart") {
        None | Some(Value::Null) => None,
        Some(value @ Value::Object(_)) => Some(value.clone()),
        Some(_) => return Err(ReplyError::BadChart),
    };

    let target_table = object
        .get("targetTable")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    Ok(AssistantReply {
        result,
        chart,
        target_table,
        truncated,
    })
}

/// HTTP client for the process endpoint. `send` spawns a task on the runtime
/// and reports the outcome back over the app event channel, so the UI thread
/// never blocks on the network.
#[derive(Clone)]
pub struct ProcessClient {
    http: reqwest::Client,
    endpoint: String,
    tx: mpsc::Sender<AppEvent>,
    runtime_handle: Handle,
}

impl ProcessClient {
    pub fn new(endpoint: String, tx: mpsc::Sender<AppEvent>) -> Result<Self, String> {
        let runtime_handle =
            Handle::try_current().map_err(|err| format!("tokio runtime unavailable: {err}"))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self {
            http,
            endpoint,
            tx,
            runtime_handle,
        })
    }

    pub fn send(&self, request: ProcessRequest) {
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        let tx = self.tx.clone();

        self.runtime_handle.spawn(async move {
            let event = match Self::execute(&http, &endpoint, &request).await {
                Ok(reply) => AppEvent::AssistantReplied(reply),
                Err(kind) => AppEvent::AssistantFailed(kind),
            };
            let _ = tx.send(event);
        });
    }

    async fn execute(
        http: &reqwest::Client,
        endpoint: &str,
        request: &ProcessRequest,
    ) -> Result<AssistantReply, FailureKind> {
        let response = http
            .post(endpoint)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    FailureKind::Timeout
                } else {
                    FailureKind::Upstream(err.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 504 {
            return Err(FailureKind::Timeout);
        }
        if !status.is_success() {
            return Err(FailureKind::Upstream(format!("status {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| FailureKind::Upstream(format!("unreadable body: {err}")))?;
        validate_reply(&body).map_err(|err| FailureKind::Invalid(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_reply, ProcessRequest, ReplyError};
    use crate::engine::table::{Table, TableStore};
    use serde_json::json;

    #[test]
    fn well_formed_reply_passes_validation() {
        let raw = json!({
            "result": "region,total\nEU,12\n",
            "chart": {"series": [{"type": "bar"}]},
            "targetTable": " summary "
        });
        let reply = validate_reply(&raw).expect("reply should validate");
        assert_eq!(reply.result, "region,total\nEU,12");
        assert!(reply.chart.is_some());
        assert_eq!(reply.target_table.as_deref(), Some("summary"));
        assert!(!reply.truncated);
    }

    #[test]
    fn missing_or_empty_result_is_rejected() {
        assert_eq!(
            validate_reply(&json!({"chart": null})),
            Err(ReplyError::MissingResult)
        );
        assert_eq!(
            validate_reply(&json!({"result": "   \n "})),
            Err(ReplyError::MissingResult)
        );
        assert_eq!(validate_reply(&json!("plain text")), Err(ReplyError::NotAnObject));
    }

    #[test]
    fn headerless_result_is_rejected() {
        assert_eq!(
            validate_reply(&json!({"result": " , ,\n1,2"})),
            Err(ReplyError::NoHeaderRow)
        );
    }

    #[test]
    fn non_object_chart_is_rejected() {
        assert_eq!(
            validate_reply(&json!({"result": "a\n1", "chart": "pie"})),
            Err(ReplyError::BadChart)
        );
        assert!(validate_reply(&json!({"result": "a\n1", "chart": null})).is_ok());
    }

    #[test]
    fn truncation_marker_row_is_stripped() {
        let raw = json!({
            "result": "name,amount\nA,10\nB,20\n... 118 more rows truncated"
        });
        let reply = validate_reply(&raw).expect("reply should validate");
        assert!(reply.truncated);
        assert_eq!(reply.result, "name,amount\nA,10\nB,20");
    }

    #[test]
    fn blank_target_table_collapses_to_none() {
        let raw = json!({"result": "a\n1", "targetTable": "   "});
        let reply = validate_reply(&raw).expect("reply should validate");
        assert_eq!(reply.target_table, None);
    }

    #[test]
    fn request_payload_uses_the_wire_field_names() {
        let mut store = TableStore::default();
        store.insert(Table::new("sales.csv", "a,b\n1,2"));
        let request = ProcessRequest::new(
            "sort by b".to_string(),
            "sales.csv".to_string(),
            &store,
        );
        let encoded = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(encoded["activeTableName"], "sales.csv");
        assert_eq!(encoded["workspace"]["sales.csv"]["currentData"], "a,b\n1,2");
        assert_eq!(encoded["workspace"]["sales.csv"]["originalData"], "a,b\n1,2");
    }
}
