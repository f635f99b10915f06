use crate::engine::table::TableStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod store;

pub const SCHEMA_VERSION: u32 = 1;

/// The persisted form of a conversation: transcript, workspace, and which
/// table receives the next command.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SessionSnapshot {
    pub schema_version: u32,
    pub messages: Vec<Message>,
    pub workspace: TableStore,
    #[serde(rename = "activeTableName")]
    pub active_table_name: String,
}

impl SessionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.workspace.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
    System,
}

/// User and system messages carry plain text; assistant messages carry the
/// structured result so the transcript can re-render tables and charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    Text {
        text: String,
    },
    Result {
        result: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chart: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none", rename = "targetTable")]
        target_table: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub body: MessageBody,
    pub timestamp: String,
    /// One-time notices (the fresh-session greeting) are shown but never
    /// written into the snapshot.
    #[serde(skip)]
    pub ephemeral: bool,
}

impl Message {
    pub fn text(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            body: MessageBody::Text { text: text.into() },
            timestamp: timestamp(),
            ephemeral: false,
        }
    }

    pub fn ephemeral_text(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            ephemeral: true,
            ..Self::text(sender, text)
        }
    }

    pub fn result(result: String, chart: Option<Value>, target_table: Option<String>) -> Self {
        Self {
            sender: Sender::Ai,
            body: MessageBody::Result {
                result,
                chart,
                target_table,
            },
            timestamp: timestamp(),
            ephemeral: false,
        }
    }
}

pub fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs().to_string(),
        Err(_) => "0".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, MessageBody, Sender, SessionSnapshot, SCHEMA_VERSION};
    use crate::engine::table::{Table, TableStore};
    use serde_json::json;

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut workspace = TableStore::default();
        workspace.insert(Table::new("sales.csv", "name,amount\nA,10"));

        let snapshot = SessionSnapshot {
            schema_version: SCHEMA_VERSION,
            messages: vec![
                Message::text(Sender::User, "sort by amount"),
                Message::result(
                    "name,amount\nA,10".to_string(),
                    Some(json!({"series": []})),
                    Some("summary".to_string()),
                ),
                Message::text(Sender::System, "Created new table summary."),
            ],
            workspace,
            active_table_name: "sales.csv".to_string(),
        };

        let encoded = serde_json::to_string(&snapshot).expect("snapshot should serialize");
        let decoded: SessionSnapshot =
            serde_json::from_str(&encoded).expect("snapshot should deserialize");
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn message_bodies_are_tagged() {
        let message = Message::text(Sender::System, "hello");
        let encoded = serde_json::to_value(&message).expect("message should serialize");
        assert_eq!(encoded["body"]["kind"], "text");
        assert_eq!(encoded["sender"], "system");
        assert!(matches!(message.body, MessageBody::Text { .. }));
    }
}
