use crate::assistant::ProcessClient;
use crate::chart;
use crate::engine::tools::DataTool;
use crate::engine::{Tone, WorkspaceEngine};
use crate::event::AppEvent;
use crate::ingest;
use crate::session::store::{self, Prefs};
use crate::session::{timestamp, MessageBody, Sender};
use crate::theme::Theme;
use eframe::egui::{self, Color32, RichText, ScrollArea};
use std::collections::HashSet;
use std::path::Path;
use std::sync::mpsc::{Receiver, TryRecvError};

const TRANSCRIPT_PREVIEW_LINES: usize = 12;

pub struct TablechatApp {
    rx: Receiver<AppEvent>,
    client: ProcessClient,
    engine: WorkspaceEngine,
    theme: Theme,
    prefs: Prefs,
    theme_applied: bool,
    input_buffer: String,
    paste_buffer: String,
    file_path_buffer: String,
    export_path_buffer: String,
    tool_column: usize,
    filter_keyword: String,
    top_k_text: String,
    diagnostics_log: Vec<String>,
    scroll_to_bottom: bool,
    confirm_reset: bool,
}

impl TablechatApp {
    pub fn new(rx: Receiver<AppEvent>, client: ProcessClient) -> Self {
        let prefs = store::load_prefs();
        let (snapshot, warning) = store::load_session();

        let mut engine = match snapshot {
            Some(snapshot) => WorkspaceEngine::restore(snapshot),
            None => {
                let mut engine = WorkspaceEngine::new();
                if !store::greeting_shown() {
                    engine.greet();
                    store::mark_greeting_shown();
                }
                engine
            }
        };
        // Restoring only reads state; drop the flag so startup does not
        // immediately rewrite the file it just read.
        let _ = engine.take_dirty();

        let mut app = Self {
            rx,
            client,
            engine,
            theme: Theme::from_mode(prefs.dark_mode),
            prefs,
            theme_applied: false,
            input_buffer: String::new(),
            paste_buffer: String::new(),
            file_path_buffer: String::new(),
            export_path_buffer: "export.csv".to_string(),
            tool_column: 0,
            filter_keyword: String::new(),
            top_k_text: "10".to_string(),
            diagnostics_log: Vec::new(),
            scroll_to_bottom: true,
            confirm_reset: false,
        };
        if let Some(warning) = warning {
            app.log_diagnostic(format!("session load warning: {warning}"));
        }
        app
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics_log
            .push(format!("[{}] {}", timestamp(), message.into()));
    }

    fn persist_if_dirty(&mut self) {
        if !self.engine.take_dirty() {
            return;
        }
        if let Err(err) = store::save_session(&self.engine.snapshot()) {
            self.log_diagnostic(format!("failed to persist session: {err}"));
        }
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event, ctx),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent, ctx: &egui::Context) {
        match event {
            AppEvent::AssistantReplied(reply) => {
                self.engine.apply_reply(reply);
            }
            AppEvent::AssistantFailed(kind) => {
                self.log_diagnostic(format!("assistant failure: {kind:?}"));
                self.engine.apply_failure(kind);
            }
        }
        self.persist_if_dirty();
        self.scroll_to_bottom = true;
        ctx.request_repaint();
    }

    fn submit_command(&mut self, command: String, ctx: &egui::Context) {
        match self.engine.begin_send(&command) {
            Ok(request) => {
                self.client.send(request);
                self.input_buffer.clear();
                self.scroll_to_bottom = true;
                self.persist_if_dirty();
                ctx.request_repaint();
            }
            Err(refusal) => {
                self.log_diagnostic(format!("command refused: {refusal:?}"));
            }
        }
    }

    fn taken_names(&self) -> HashSet<String> {
        self.engine.tables().map(|table| table.name.clone()).collect()
    }

    fn import_file(&mut self) {
        let raw_path = self.file_path_buffer.trim().to_string();
        if raw_path.is_empty() {
            return;
        }
        match ingest::load_workbook(Path::new(&raw_path), &self.taken_names()) {
            Ok(sheets) => {
                let file_name = Path::new(&raw_path)
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or(raw_path.as_str())
                    .to_string();
                let summary = ingest::import_summary(&file_name, &sheets);
                let tables = sheets.into_iter().map(|sheet| sheet.table).collect();
                self.engine.import_tables(tables, summary);
                self.file_path_buffer.clear();
                self.tool_column = 0;
                self.persist_if_dirty();
            }
            Err(err) => {
                self.log_diagnostic(format!("import failed: {err}"));
            }
        }
    }

    fn import_paste(&mut self) {
        match ingest::paste(&self.paste_buffer, &self.taken_names()) {
            Ok(sheet) => {
                let summary = format!(
                    "Pasted data imported as {} · {} columns · {} rows.",
                    sheet.table.name, sheet.stats.columns, sheet.stats.rows
                );
                self.engine.import_tables(vec![sheet.table], summary);
                self.paste_buffer.clear();
                self.tool_column = 0;
                self.persist_if_dirty();
            }
            Err(err) => {
                self.log_diagnostic(format!("paste rejected: {err}"));
            }
        }
    }

    fn export_active_table(&mut self) {
        let Some(table) = self.engine.active_table() else {
            return;
        };
        let path = self.export_path_buffer.trim().to_string();
        if path.is_empty() {
            return;
        }
        let csv = table.current_data.clone();
        match std::fs::write(&path, csv) {
            Ok(()) => self.log_diagnostic(format!("exported active table to {path}")),
            Err(err) => self.log_diagnostic(format!("export failed: {err}")),
        }
    }

    fn apply_tool(&mut self, tool: DataTool) {
        if let Err(err) = self.engine.apply_tool(&tool) {
            self.log_diagnostic(format!("data tool refused: {err}"));
        }
        self.persist_if_dirty();
    }

    fn toggle_dark_mode(&mut self, ctx: &egui::Context) {
        self.prefs.dark_mode = !self.prefs.dark_mode;
        if let Err(err) = store::save_prefs(&self.prefs) {
            self.log_diagnostic(format!("failed to persist preferences: {err}"));
        }
        self.theme = Theme::from_mode(self.prefs.dark_mode);
        self.theme.apply_visuals(ctx);
    }

    fn tone_color(&self, tone: Tone) -> Color32 {
        match tone {
            Tone::Info => self.theme.text_muted,
            Tone::Success => self.theme.success,
            Tone::Error => self.theme.danger,
        }
    }

    /// Discard the workspace, the transcript, and the stored session file.
    fn reset_session(&mut self) {
        self.engine.reset_session();
        self.persist_if_dirty();
        self.input_buffer.clear();
        self.paste_buffer.clear();
        self.file_path_buffer.clear();
        self.tool_column = 0;
        self.confirm_reset = false;
        self.log_diagnostic("session cleared");
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        let mut toggle_requested = false;
        let mut reset_requested = false;
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Tablechat");
                ui.separator();
                if self.engine.is_sending() {
                    ui.label(RichText::new("Waiting for the assistant...").color(self.theme.warning));
                } else {
                    ui.label(RichText::new("Ready").color(self.theme.success));
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let label = if self.prefs.dark_mode { "Light mode" } else { "Dark mode" };
                    if ui.button(label).clicked() {
                        toggle_requested = true;
                    }
                    if self.confirm_reset {
                        if ui
                            .button(RichText::new("Discard everything?").color(self.theme.danger))
                            .clicked()
                        {
                            reset_requested = true;
                        }
                        if ui.small_button("Keep").clicked() {
                            self.confirm_reset = false;
                        }
                    } else if ui.button("New session").clicked() {
                        self.confirm_reset = true;
                    }
                });
            });
        });
        if toggle_requested {
            self.toggle_dark_mode(ctx);
        }
        if reset_requested {
            self.reset_session();
        }
    }

    fn render_dataset_list(&mut self, ui: &mut egui::Ui) {
        ui.strong("Data sources");
        if self.engine.table_count() == 0 {
            ui.label(RichText::new("No data loaded yet").color(self.theme.text_muted));
            return;
        }

        let mut activate: Option<String> = None;
        let mut remove: Option<String> = None;
        let active_name = self.engine.active_table_name().to_string();
        for table in self.engine.tables() {
            let is_active = table.name == active_name;
            ui.horizontal(|ui| {
                let label = if is_active {
                    RichText::new(&table.name).color(self.theme.accent_primary).strong()
                } else {
                    RichText::new(&table.name)
                };
                if ui.button(label).clicked() && !is_active {
                    activate = Some(table.name.clone());
                }
                if ui.small_button("✕").clicked() {
                    remove = Some(table.name.clone());
                }
            });
        }

        if let Some(name) = activate {
            self.engine.activate(&name);
            self.tool_column = 0;
            self.persist_if_dirty();
        }
        if let Some(name) = remove {
            self.engine.remove_table(&name);
            self.tool_column = 0;
            self.persist_if_dirty();
        }
    }

    fn render_import_section(&mut self, ui: &mut egui::Ui) {
        ui.strong("Import");
        // Swapping the workspace mid-cycle would orphan the in-flight reply.
        let mut load_clicked = false;
        let mut paste_clicked = false;
        ui.add_enabled_ui(!self.engine.is_sending(), |ui| {
            ui.horizontal(|ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut self.file_path_buffer)
                        .hint_text("path to .csv / .xlsx"),
                );
                if ui.button("Load").clicked() {
                    load_clicked = true;
                }
            });

            egui::CollapsingHeader::new("Paste data")
                .default_open(false)
                .show(ui, |ui| {
                    ui.add(
                        egui::TextEdit::multiline(&mut self.paste_buffer)
                            .desired_rows(4)
                            .hint_text("Paste rows with a header line"),
                    );
                    if ui.button("Import pasted data").clicked() {
                        paste_clicked = true;
                    }
                });
        });
        if load_clicked {
            self.import_file();
        }
        if paste_clicked {
            self.import_paste();
        }
    }

    fn render_data_tools(&mut self, ui: &mut egui::Ui) {
        let headers = self.engine.active_headers();
        if headers.is_empty() {
            return;
        }
        if self.tool_column >= headers.len() {
            self.tool_column = 0;
        }
        let busy = self.engine.is_sending();

        ui.strong("Data tools");
        egui::ComboBox::from_id_salt("tool_column")
            .selected_text(headers[self.tool_column].clone())
            .show_ui(ui, |ui| {
                for (index, header) in headers.iter().enumerate() {
                    ui.selectable_value(&mut self.tool_column, index, header);
                }
            });

        let column = self.tool_column;
        ui.add_enabled_ui(!busy, |ui| {
            ui.horizontal(|ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut self.filter_keyword)
                        .desired_width(90.0)
                        .hint_text("keyword"),
                );
                if ui.button("Filter").clicked() {
                    let keyword = self.filter_keyword.trim().to_string();
                    self.apply_tool(DataTool::FilterContains { column, keyword });
                }
            });
            ui.horizontal(|ui| {
                if ui.button("Sort ↑").clicked() {
                    self.apply_tool(DataTool::Sort { column, ascending: true });
                }
                if ui.button("Sort ↓").clicked() {
                    self.apply_tool(DataTool::Sort { column, ascending: false });
                }
            });
            ui.horizontal(|ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut self.top_k_text)
                        .desired_width(40.0)
                        .hint_text("k"),
                );
                if ui.button("Top k").clicked() {
                    let k = self.top_k_text.trim().parse::<usize>().unwrap_or(10);
                    self.apply_tool(DataTool::TopK { column, k });
                }
            });
            ui.horizontal(|ui| {
                if ui.button("Drop empty").clicked() {
                    self.apply_tool(DataTool::DropEmpty { column });
                }
                if ui.button("Dedupe").clicked() {
                    self.apply_tool(DataTool::DedupeBy { column });
                }
            });
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(self.engine.can_undo(), egui::Button::new("Undo"))
                    .clicked()
                {
                    self.engine.undo();
                    self.persist_if_dirty();
                }
                if ui
                    .add_enabled(self.engine.can_redo(), egui::Button::new("Redo"))
                    .clicked()
                {
                    self.engine.redo();
                    self.persist_if_dirty();
                }
                if ui.button("Reset").clicked() {
                    self.engine.reset_to_original();
                    self.persist_if_dirty();
                }
            });
        });

        ui.separator();
        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.export_path_buffer).desired_width(110.0),
            );
            if ui.button("Export CSV").clicked() {
                self.export_active_table();
            }
        });
    }

    fn render_left_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("workspace_panel")
            .resizable(true)
            .show(ctx, |ui| {
                ui.heading("Workspace");
                if let Some(stats) = self.engine.active_stats() {
                    ui.label(
                        RichText::new(format!(
                            "{} · {} columns · {} rows",
                            self.engine.active_table_name(),
                            stats.columns,
                            stats.rows
                        ))
                        .color(self.theme.text_muted),
                    );
                }
                ui.separator();
                self.render_dataset_list(ui);
                ui.separator();
                self.render_import_section(ui);
                ui.separator();
                self.render_data_tools(ui);
            });
    }

    fn result_preview(&self, result: &str) -> (String, usize) {
        let lines: Vec<&str> = result.lines().collect();
        let shown = lines.len().min(TRANSCRIPT_PREVIEW_LINES);
        let hidden = lines.len() - shown;
        (lines[..shown].join("\n"), hidden)
    }

    fn render_transcript(&mut self, ui: &mut egui::Ui) {
        let mut chart_dump: Vec<(usize, String)> = Vec::new();
        for (index, message) in self.engine.transcript().iter().enumerate() {
            match (&message.sender, &message.body) {
                (Sender::User, MessageBody::Text { text }) => {
                    ui.label(RichText::new(format!("[You] {text}")).strong());
                }
                (Sender::System, MessageBody::Text { text }) => {
                    ui.label(RichText::new(text).color(self.theme.text_muted).italics());
                }
                (_, MessageBody::Result { result, chart, target_table }) => {
                    self.theme.card_frame().show(ui, |ui| {
                        if let Some(target) = target_table {
                            ui.label(
                                RichText::new(format!("→ {target}"))
                                    .color(self.theme.accent_primary)
                                    .small(),
                            );
                        }
                        let (preview, hidden) = self.result_preview(result);
                        ui.monospace(preview);
                        if hidden > 0 {
                            ui.label(
                                RichText::new(format!("… {hidden} more rows"))
                                    .color(self.theme.text_muted)
                                    .small(),
                            );
                        }
                        if let Some(raw_chart) = chart {
                            if let Some(prepared) =
                                chart::prepare_chart_option(raw_chart, self.prefs.dark_mode)
                            {
                                let pretty = serde_json::to_string_pretty(&prepared)
                                    .unwrap_or_else(|_| prepared.to_string());
                                chart_dump.push((index, pretty));
                            }
                        }
                    });
                }
                (_, MessageBody::Text { text }) => {
                    ui.label(format!("[Assistant] {text}"));
                }
            }

            if let Some((_, pretty)) = chart_dump.iter().find(|(i, _)| *i == index) {
                egui::CollapsingHeader::new("Chart option")
                    .id_salt(("chart_option", index))
                    .default_open(false)
                    .show(ui, |ui| {
                        ui.monospace(pretty);
                    });
            }
        }
    }

    fn render_recovery(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let Some(prompt) = self.engine.recovery().cloned() else {
            return;
        };
        let mut send: Option<String> = None;
        let mut dismiss = false;
        self.theme.card_frame().show(ui, |ui| {
            ui.label(RichText::new(prompt.title()).color(self.theme.warning));
            ui.horizontal_wrapped(|ui| {
                for option in prompt.options() {
                    if ui.button(option.label).clicked() {
                        send = Some(option.command);
                    }
                }
                if ui.small_button("Dismiss").clicked() {
                    dismiss = true;
                }
            });
        });
        if let Some(command) = send {
            self.engine.dismiss_recovery();
            self.submit_command(command, ctx);
        } else if dismiss {
            self.engine.dismiss_recovery();
        }
    }

    fn render_chart_suggestion(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let Some(suggestion) = self.engine.chart_suggestion().cloned() else {
            return;
        };
        let mut send: Option<String> = None;
        let mut dismiss = false;
        self.theme.card_frame().show(ui, |ui| {
            ui.label(
                RichText::new(format!("Chart ideas for {}:", suggestion.table))
                    .color(self.theme.text_muted),
            );
            ui.horizontal_wrapped(|ui| {
                for option in suggestion.options() {
                    if ui.button(option.label).clicked() {
                        send = Some(option.command);
                    }
                }
                if ui.small_button("Not now").clicked() {
                    dismiss = true;
                }
            });
        });
        if let Some(command) = send {
            self.engine.dismiss_chart_suggestion();
            self.submit_command(command, ctx);
        } else if dismiss {
            self.engine.dismiss_chart_suggestion();
        }
    }

    fn render_center_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Chat");
            if let Some(note) = self.engine.status().cloned() {
                ui.label(RichText::new(note.text).color(self.tone_color(note.tone)).small());
            }
            ui.separator();

            let transcript_height = (ui.available_height() - 170.0).max(120.0);
            ScrollArea::vertical()
                .id_salt("chat_transcript")
                .max_height(transcript_height)
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    self.render_transcript(ui);
                    self.render_recovery(ui, ctx);
                    self.render_chart_suggestion(ui, ctx);
                    if self.engine.is_sending() {
                        ui.label(
                            RichText::new("Processing...").color(self.theme.text_muted).italics(),
                        );
                    }
                    if self.scroll_to_bottom {
                        ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                    }
                });
            self.scroll_to_bottom = false;

            ui.separator();
            egui::CollapsingHeader::new("Diagnostics")
                .default_open(false)
                .show(ui, |ui| {
                    ScrollArea::vertical()
                        .id_salt("diagnostics_log")
                        .max_height(90.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            for entry in &self.diagnostics_log {
                                ui.label(entry);
                            }
                        });
                });

            ui.separator();
            let input_enabled = !self.engine.is_sending();
            let hint = if input_enabled {
                "Describe the transformation you need..."
            } else {
                "Waiting for response..."
            };

            let mut send_now = false;
            self.theme.composer_frame().show(ui, |ui| {
                ui.horizontal(|ui| {
                    let response = ui.add_enabled(
                        input_enabled,
                        egui::TextEdit::singleline(&mut self.input_buffer)
                            .desired_width(f32::INFINITY)
                            .hint_text(hint),
                    );
                    if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                        send_now = true;
                    }

                    let clicked = ui
                        .add_enabled(
                            input_enabled && !self.input_buffer.trim().is_empty(),
                            egui::Button::new("Send"),
                        )
                        .clicked();
                    send_now |= clicked;
                });
            });

            if send_now && input_enabled {
                let command = self.input_buffer.trim().to_string();
                self.submit_command(command, ctx);
            }
        });
    }
}

impl eframe::App for TablechatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.theme_applied {
            self.theme.apply_visuals(ctx);
            self.theme_applied = true;
        }
        self.drain_events(ctx);
        self.render_top_bar(ctx);
        self.render_left_panel(ctx);
        self.render_center_panel(ctx);
    }
}
