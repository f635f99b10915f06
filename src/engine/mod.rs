use crate::assistant::{AssistantReply, FailureKind, ProcessRequest};
use crate::session::{Message, Sender, SessionSnapshot, SCHEMA_VERSION};

pub mod csv;
pub mod history;
pub mod schema;
pub mod table;
pub mod tools;

use history::HistoryLedger;
use schema::Reconciliation;
use table::{table_stats, Table, TableStore};
use tools::{DataTool, ToolError};

/// Phase of the current send cycle. At most one cycle is in flight; the UI
/// disables the send control while `Sending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Sending { command: String },
}

/// Why a command was refused before any network call was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendRefusal {
    EmptyCommand,
    NoActiveTable,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Error,
}

/// One-line status strip mirroring the upload-status area of the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusNote {
    pub text: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Timeout,
    Upstream,
}

/// Recovery affordances offered after a failed cycle. Retries are always
/// user-initiated; the engine never resends on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPrompt {
    pub reason: FailureReason,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedCommand {
    pub label: &'static str,
    pub command: String,
}

impl RecoveryPrompt {
    pub fn title(&self) -> &'static str {
        match self.reason {
            FailureReason::Timeout => "The response timed out. These usually come back faster:",
            FailureReason::Upstream => "The request failed. You can try one of these:",
        }
    }

    pub fn options(&self) -> Vec<SuggestedCommand> {
        let base = self.command.trim();
        vec![
            SuggestedCommand {
                label: "Retry now",
                command: base.to_string(),
            },
            SuggestedCommand {
                label: "Top-10 summary only",
                command: format!(
                    "{base}\nReturn only a summary table with the top 10 rows and no chart; \
                     keep the column names exactly as they are."
                ),
            },
            SuggestedCommand {
                label: "Header + sample only",
                command: format!(
                    "{base}\nIf the computation is heavy, return only the header row and a \
                     small summary sample instead of the full data."
                ),
            },
        ]
    }
}

/// A one-click chart prompt attached to a table after ingestion or an
/// accepted result. Removed together with its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSuggestion {
    pub table: String,
}

impl ChartSuggestion {
    pub fn options(&self) -> Vec<SuggestedCommand> {
        let table = &self.table;
        vec![
            SuggestedCommand {
                label: "Trend line chart",
                command: format!(
                    "Using table \"{table}\", build a trend line chart: pick the most suitable \
                     time or sequence column for the x-axis and the key measures for the y-axis, \
                     and return the prepared CSV together with a chart option."
                ),
            },
            SuggestedCommand {
                label: "Comparison bar chart",
                command: format!(
                    "Using table \"{table}\", build a comparison bar chart: choose the best \
                     grouping dimension and compare the main measure across it, returning both \
                     the CSV and a chart option."
                ),
            },
            SuggestedCommand {
                label: "Share pie chart",
                command: format!(
                    "Using table \"{table}\", build a pie chart of shares: pick a category \
                     column and a measure, aggregate shares, and return the CSV and a chart \
                     option."
                ),
            },
        ]
    }
}

/// The client-side state machine behind one chat session: named tables with
/// original and current versions, per-table edit history, the conversation
/// transcript, and the send-cycle state. Owned by the app shell; it never
/// touches the UI or the network itself.
pub struct WorkspaceEngine {
    store: TableStore,
    history: HistoryLedger,
    transcript: Vec<Message>,
    active_table: String,
    send_state: SendState,
    recovery: Option<RecoveryPrompt>,
    chart_suggestion: Option<ChartSuggestion>,
    status: Option<StatusNote>,
    dirty: bool,
}

impl Default for WorkspaceEngine {
    fn default() -> Self {
        Self {
            store: TableStore::default(),
            history: HistoryLedger::default(),
            transcript: Vec::new(),
            active_table: String::new(),
            send_state: SendState::Idle,
            recovery: None,
            chart_suggestion: None,
            status: None,
            dirty: false,
        }
    }
}

impl WorkspaceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the engine from a persisted snapshot. An active table name
    /// that no longer resolves is dropped rather than trusted.
    pub fn restore(snapshot: SessionSnapshot) -> Self {
        let mut engine = Self {
            transcript: snapshot.messages,
            store: snapshot.workspace,
            ..Self::default()
        };
        if engine.store.contains(&snapshot.active_table_name) {
            engine.active_table = snapshot.active_table_name;
            let stats = engine.active_stats().unwrap_or(table_stats(""));
            engine.set_status(
                format!(
                    "Session restored: {} · {} columns · {} rows",
                    engine.active_table, stats.columns, stats.rows
                ),
                Tone::Success,
            );
        } else {
            engine.set_status(
                "Session restored. Pick or load a dataset to continue.".to_string(),
                Tone::Success,
            );
        }
        engine
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            schema_version: SCHEMA_VERSION,
            messages: self
                .transcript
                .iter()
                .filter(|message| !message.ephemeral)
                .cloned()
                .collect(),
            workspace: self.store.clone(),
            active_table_name: self.active_table.clone(),
        }
    }

    /// Tear the whole session down: tables, history, transcript, and any
    /// in-flight cycle are all discarded. The next snapshot is empty, which
    /// also removes the persisted session file.
    pub fn reset_session(&mut self) {
        *self = Self {
            dirty: true,
            status: Some(StatusNote {
                text: "Session cleared. Load or paste a dataset to start over.".to_string(),
                tone: Tone::Info,
            }),
            ..Self::default()
        };
    }

    /// The fresh-session welcome. Shown once, never persisted.
    pub fn greet(&mut self) {
        self.transcript.push(Message::ephemeral_text(
            Sender::System,
            "Welcome! Load or paste a table, then describe what you need — you'll get a \
             structured table back, and a chart when one makes sense.",
        ));
    }

    // --- accessors -------------------------------------------------------

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.store.iter()
    }

    pub fn table_count(&self) -> usize {
        self.store.len()
    }

    pub fn active_table(&self) -> Option<&Table> {
        self.store.get(&self.active_table)
    }

    pub fn active_table_name(&self) -> &str {
        &self.active_table
    }

    pub fn active_stats(&self) -> Option<table::TableStats> {
        self.active_table().map(|table| table_stats(&table.current_data))
    }

    pub fn active_headers(&self) -> Vec<String> {
        self.active_table()
            .map(|table| schema::extract_headers(&table.current_data))
            .unwrap_or_default()
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn send_state(&self) -> &SendState {
        &self.send_state
    }

    pub fn is_sending(&self) -> bool {
        matches!(self.send_state, SendState::Sending { .. })
    }

    pub fn recovery(&self) -> Option<&RecoveryPrompt> {
        self.recovery.as_ref()
    }

    pub fn chart_suggestion(&self) -> Option<&ChartSuggestion> {
        self.chart_suggestion.as_ref()
    }

    pub fn status(&self) -> Option<&StatusNote> {
        self.status.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        !self.active_table.is_empty() && self.history.can_undo(&self.active_table)
    }

    pub fn can_redo(&self) -> bool {
        !self.active_table.is_empty() && self.history.can_redo(&self.active_table)
    }

    /// True once any mutation happened since the last `take_dirty`; the app
    /// shell uses this to decide when to write the session snapshot.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn set_status(&mut self, text: String, tone: Tone) {
        self.status = Some(StatusNote { text, tone });
    }

    fn push_system(&mut self, text: impl Into<String>) {
        self.transcript.push(Message::text(Sender::System, text));
        self.dirty = true;
    }

    // --- ingestion -------------------------------------------------------

    /// Install freshly ingested tables. A new dataset starts a fresh
    /// conversation: the transcript is reset and the first table activated.
    /// Any cycle still in flight belongs to the old conversation and is
    /// dropped, so a late reply cannot land in the new workspace.
    pub fn import_tables(&mut self, tables: Vec<Table>, summary: String) {
        if tables.is_empty() {
            return;
        }
        self.send_state = SendState::Idle;
        self.transcript.clear();
        self.recovery = None;
        let first = tables[0].name.clone();
        for table in tables {
            self.history.reset(&table.name);
            self.store.insert(table);
        }
        self.push_system(summary);
        self.activate_internal(&first);
        self.chart_suggestion = Some(ChartSuggestion { table: first });
        self.dirty = true;
    }

    // --- table lifecycle -------------------------------------------------

    /// Make a table active. History is keyed per table and survives the
    /// switch. An unknown name clears the active slot.
    pub fn activate(&mut self, name: &str) {
        if self.store.contains(name) {
            self.activate_internal(name);
        } else {
            self.active_table.clear();
            self.set_status(
                "Workspace is empty. Load or paste a new dataset.".to_string(),
                Tone::Info,
            );
        }
        self.dirty = true;
    }

    fn activate_internal(&mut self, name: &str) {
        self.active_table = name.to_string();
        if let Some(stats) = self.active_stats() {
            self.set_status(
                format!("Active table: {name} · {} columns · {} rows", stats.columns, stats.rows),
                Tone::Info,
            );
        }
    }

    /// Remove a table along with its history and any chart suggestion tied
    /// to it. The next remaining table (if any) becomes active.
    pub fn remove_table(&mut self, name: &str) {
        if !self.store.remove(name) {
            return;
        }
        self.history.remove(name);
        if self
            .chart_suggestion
            .as_ref()
            .is_some_and(|suggestion| suggestion.table == name)
        {
            self.chart_suggestion = None;
        }

        if self.active_table == name {
            match self.store.first_name().map(str::to_string) {
                Some(next) => self.activate_internal(&next),
                None => {
                    self.active_table.clear();
                    self.set_status(
                        "Workspace is empty. Load or paste a new dataset.".to_string(),
                        Tone::Info,
                    );
                }
            }
        }
        self.push_system(format!("Table {name} removed."));
    }

    // --- send cycle ------------------------------------------------------

    /// Start a send cycle. Refused (with a status notice, no network call)
    /// when the command is empty, no table is active, or a cycle is already
    /// in flight.
    pub fn begin_send(&mut self, command: &str) -> Result<ProcessRequest, SendRefusal> {
        let command = command.trim();
        if command.is_empty() {
            return Err(SendRefusal::EmptyCommand);
        }
        if self.is_sending() {
            return Err(SendRefusal::Busy);
        }
        if self.active_table().is_none() {
            self.set_status(
                "Load or paste a dataset before starting the conversation.".to_string(),
                Tone::Error,
            );
            return Err(SendRefusal::NoActiveTable);
        }

        self.transcript.push(Message::text(Sender::User, command));
        self.recovery = None;
        self.send_state = SendState::Sending {
            command: command.to_string(),
        };
        self.dirty = true;
        Ok(ProcessRequest::new(
            command.to_string(),
            self.active_table.clone(),
            &self.store,
        ))
    }

    /// Apply a validated assistant reply: reconcile the candidate schema
    /// against the destination baseline, then either mutate the store (with
    /// an undo snapshot) or keep the previous data and explain why.
    pub fn apply_reply(&mut self, reply: AssistantReply) {
        if !self.is_sending() {
            return;
        }
        self.send_state = SendState::Idle;

        self.transcript.push(Message::result(
            reply.result.clone(),
            reply.chart.clone(),
            reply.target_table.clone(),
        ));
        self.dirty = true;

        let destination = reply
            .target_table
            .clone()
            .unwrap_or_else(|| self.active_table.clone());
        let destination_exists = self.store.contains(&destination);
        let baseline = self
            .store
            .get(&destination)
            .map(|table| schema::extract_headers(&table.current_data))
            .unwrap_or_default();
        let candidate = schema::extract_headers(&reply.result);

        if let Reconciliation::Reject { missing } = schema::reconcile(&baseline, &candidate) {
            self.push_system(format!(
                "The reply for {destination} is missing columns: {}. Kept the previous data — \
                 try a more explicit command, or say the columns must be preserved.",
                missing.join(", ")
            ));
            self.set_status("Result rejected: columns went missing.".to_string(), Tone::Error);
            return;
        }

        if !destination_exists {
            self.store.insert(Table::new(&destination, reply.result.clone()));
            self.history.reset(&destination);
            self.push_system(format!(
                "Created new table {destination} and wrote the result."
            ));
        } else {
            let previous = self
                .store
                .get(&destination)
                .map(|table| table.current_data.clone())
                .unwrap_or_default();
            self.history.record_before_mutation(&destination, previous);
            self.store.upsert(&destination, reply.result.clone());
            if destination != self.active_table {
                self.push_system(format!(
                    "Wrote the result to {destination} and switched to it."
                ));
            }
        }

        if reply.truncated {
            self.push_system(
                "The result was truncated upstream; row counts reflect the returned sample.",
            );
        }

        self.activate_internal(&destination);
        if reply.chart.is_none() {
            self.chart_suggestion = Some(ChartSuggestion { table: destination });
        }
    }

    /// Convert a failed cycle into transcript notices plus recovery options.
    /// The send control is re-enabled; nothing in the workspace changes.
    pub fn apply_failure(&mut self, kind: FailureKind) {
        let SendState::Sending { command } = std::mem::replace(&mut self.send_state, SendState::Idle)
        else {
            return;
        };

        let (reason, notice, status) = match &kind {
            FailureKind::Timeout => (
                FailureReason::Timeout,
                "The backend timed out. Retry in a moment, or simplify the command.".to_string(),
                "Response timed out. Please retry.".to_string(),
            ),
            FailureKind::Upstream(detail) => (
                FailureReason::Upstream,
                format!("Processing failed ({detail}). Check the connection and retry."),
                "Request failed. Please retry.".to_string(),
            ),
            FailureKind::Invalid(detail) => (
                FailureReason::Upstream,
                format!("The reply could not be used ({detail}). Nothing was changed."),
                "Unusable reply. Please retry.".to_string(),
            ),
        };

        self.push_system(notice);
        self.set_status(status, Tone::Error);
        self.recovery = Some(RecoveryPrompt { reason, command });
    }

    pub fn dismiss_recovery(&mut self) {
        self.recovery = None;
    }

    pub fn dismiss_chart_suggestion(&mut self) {
        self.chart_suggestion = None;
    }

    // --- local mutations -------------------------------------------------

    /// Run a local data tool against the active table, recording an undo
    /// snapshot. Refused while a send cycle is in flight.
    pub fn apply_tool(&mut self, tool: &DataTool) -> Result<(), ToolError> {
        if self.is_sending() {
            return Ok(());
        }
        let Some(table) = self.store.get(&self.active_table) else {
            return Err(ToolError::EmptyTable);
        };
        let previous = table.current_data.clone();
        let next = tools::apply(tool, &previous)?;
        self.history
            .record_before_mutation(&self.active_table, previous);
        self.store.upsert(&self.active_table, next);
        if let Some(stats) = self.active_stats() {
            self.set_status(
                format!("{} · {} rows left", tool.describe(), stats.rows),
                Tone::Success,
            );
        }
        self.dirty = true;
        Ok(())
    }

    /// Step the active table back one snapshot. Silent no-op when exhausted.
    pub fn undo(&mut self) {
        let Some(table) = self.store.get(&self.active_table) else {
            return;
        };
        let current = table.current_data.clone();
        if let Some(previous) = self.history.undo(&self.active_table, &current) {
            self.store.upsert(&self.active_table, previous);
            self.set_status("Undid the last change.".to_string(), Tone::Info);
            self.dirty = true;
        }
    }

    pub fn redo(&mut self) {
        let Some(table) = self.store.get(&self.active_table) else {
            return;
        };
        let current = table.current_data.clone();
        if let Some(next) = self.history.redo(&self.active_table, &current) {
            self.store.upsert(&self.active_table, next);
            self.set_status("Redid the last change.".to_string(), Tone::Info);
            self.dirty = true;
        }
    }

    /// Restore the ingestion-time data and drop the table's history, so an
    /// undo cannot step back behind the reset.
    pub fn reset_to_original(&mut self) {
        let Some(table) = self.store.get(&self.active_table) else {
            return;
        };
        if table.original_data.is_empty() {
            return;
        }
        let original = table.original_data.clone();
        self.store.upsert(&self.active_table, original);
        self.history.reset(&self.active_table);
        self.set_status("Restored the original data.".to_string(), Tone::Success);
        self.dirty = true;
    }
}
