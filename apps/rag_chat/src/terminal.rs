//! Line-oriented [`UiSurface`] that prints to a terminal.
//!
//! Streamed answers are printed as deltas of the message text, so a chunk is
//! visible as soon as the controller applies it. A status banner stays
//! active for its `dismiss_after` window; repeating the active banner inside
//! that window prints nothing.

use std::{
    collections::HashMap,
    io::{self, Write},
    sync::Mutex,
    time::Instant,
};

use async_trait::async_trait;
use client_core::{
    Control, ControlState, ModelOption, StatsView, StatusBanner, StatusLevel, SystemStatus,
    UiSurface,
};
use shared::domain::{ChatMessage, ChatRole, MessageId, MessageStatus};
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Default)]
struct RenderState {
    /// Bytes of each assistant message already written out.
    printed: HashMap<MessageId, usize>,
    last_documents_count: Option<u64>,
    prompt_editor_open: bool,
    disabled: HashMap<Control, &'static str>,
    active_status: Option<(StatusLevel, String, Instant)>,
}

pub struct TerminalUi<W> {
    out: Mutex<W>,
    render: Mutex<RenderState>,
    pending_confirm: Mutex<Option<oneshot::Sender<bool>>>,
}

impl TerminalUi<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalUi<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            render: Mutex::new(RenderState::default()),
            pending_confirm: Mutex::new(None),
        }
    }

    /// Hands `line` to an open confirmation prompt. Returns false when no
    /// prompt is waiting, so the caller treats the line as normal input.
    pub fn answer_confirmation(&self, line: &str) -> bool {
        let Some(reply) = lock(&self.pending_confirm).take() else {
            return false;
        };
        let accepted = matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes");
        let _ = reply.send(accepted);
        true
    }

    /// Declines any open confirmation prompt.
    pub fn cancel_confirmation(&self) {
        if let Some(reply) = lock(&self.pending_confirm).take() {
            let _ = reply.send(false);
        }
    }

    /// Busy label of a disabled control; input for it is refused meanwhile.
    pub fn disabled_label(&self, control: Control) -> Option<&'static str> {
        lock(&self.render).disabled.get(&control).copied()
    }

    pub fn notice(&self, text: &str) {
        self.write(|out| writeln!(out, "{text}"));
    }

    fn write(&self, render: impl FnOnce(&mut W) -> io::Result<()>) {
        let mut out = lock(&self.out);
        if let Err(err) = render(&mut *out).and_then(|()| out.flush()) {
            debug!(error = %err, "terminal write failed");
        }
    }

    fn render_assistant(&self, id: MessageId, message: &ChatMessage) {
        let finished = message.status != MessageStatus::Pending;
        let already_printed = {
            let mut render = lock(&self.render);
            let printed = render.printed.get(&id).copied().unwrap_or(0);
            if finished {
                render.printed.remove(&id);
            } else {
                render.printed.insert(id, message.text.len());
            }
            printed
        };
        let delta = message.text.get(already_printed..).unwrap_or_default();

        self.write(|out| {
            if already_printed == 0 && !(delta.is_empty() && !finished) {
                write!(out, "assistant> ")?;
            }
            write!(out, "{delta}")?;
            if finished {
                writeln!(out)?;
                if !message.sources.is_empty() {
                    writeln!(out, "Sources: {}", message.sources.join(", "))?;
                }
            }
            Ok(())
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl<W: Write + Send> UiSurface for TerminalUi<W> {
    fn set_model_options(&self, options: &[ModelOption]) {
        self.write(|out| {
            if options.is_empty() {
                return writeln!(out, "No models available");
            }
            writeln!(out, "Models:")?;
            for option in options {
                let marker = if option.selected { '*' } else { ' ' };
                writeln!(out, "  {marker} {} ({})", option.label, option.id)?;
            }
            Ok(())
        });
    }

    fn set_control_state(&self, control: Control, state: ControlState) {
        debug!(?control, enabled = state.enabled, label = state.label, "control state");
        {
            let mut render = lock(&self.render);
            if state.enabled {
                render.disabled.remove(&control);
            } else {
                render.disabled.insert(control, state.label);
            }
        }
        if !state.enabled && state.label != control.idle_label() {
            self.write(|out| writeln!(out, "[{}]", state.label));
        }
    }

    fn show_status(&self, banner: StatusBanner) {
        let now = Instant::now();
        {
            let mut render = lock(&self.render);
            let repeated = matches!(
                &render.active_status,
                Some((level, text, until))
                    if *level == banner.level && *text == banner.text && now < *until
            );
            if repeated {
                return;
            }
            render.active_status =
                Some((banner.level, banner.text.clone(), now + banner.dismiss_after));
        }
        let tag = match banner.level {
            StatusLevel::Success => "ok",
            StatusLevel::Error => "error",
        };
        self.write(|out| writeln!(out, "[{tag}] {}", banner.text));
    }

    fn render_stats(&self, stats: &StatsView) {
        let documents = {
            let mut render = lock(&self.render);
            if let Some(count) = stats.documents_count {
                render.last_documents_count = Some(count);
            }
            render.last_documents_count
        };
        let documents = documents.map_or_else(|| "?".to_string(), |count| count.to_string());
        let status = match stats.system_status {
            SystemStatus::Online => "online",
            SystemStatus::Offline => "offline",
            SystemStatus::Error => "error",
        };
        let loaded = match stats.model_loaded {
            Some(true) => " (loaded)",
            Some(false) => " (not loaded)",
            None => "",
        };
        self.write(|out| {
            writeln!(
                out,
                "Model: {}{loaded} | Documents: {documents} | Status: {status}",
                stats.current_model_label
            )
        });
    }

    fn append_message(&self, id: MessageId, message: &ChatMessage) {
        match message.role {
            ChatRole::User => self.write(|out| writeln!(out, "you> {}", message.text)),
            ChatRole::Assistant => self.render_assistant(id, message),
        }
    }

    fn update_message(&self, id: MessageId, message: &ChatMessage) {
        if message.role == ChatRole::Assistant {
            self.render_assistant(id, message);
        }
    }

    fn clear_file_selection(&self) {
        debug!("file selection cleared");
    }

    fn show_prompt_editor(&self, text: &str) {
        lock(&self.render).prompt_editor_open = true;
        self.write(|out| {
            writeln!(out, "--- system prompt ---")?;
            writeln!(out, "{text}")?;
            writeln!(out, "--- /edit <text>, /template <id>, /save, /close ---")
        });
    }

    fn set_prompt_buffer(&self, text: &str) {
        let editor_open = lock(&self.render).prompt_editor_open;
        self.write(|out| {
            if !editor_open {
                writeln!(out, "(prompt editor is closed; /prompt to open it)")?;
            }
            writeln!(out, "--- prompt buffer ---")?;
            writeln!(out, "{text}")
        });
    }

    fn hide_prompt_editor(&self) {
        lock(&self.render).prompt_editor_open = false;
        self.write(|out| writeln!(out, "--- prompt editor closed ---"));
    }

    fn warn(&self, message: &str) {
        self.write(|out| writeln!(out, "! {message}"));
    }

    async fn confirm(&self, question: &str) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        let previous = lock(&self.pending_confirm).replace(reply_tx);
        if let Some(previous) = previous {
            let _ = previous.send(false);
        }
        self.write(|out| writeln!(out, "{question} [y/N]"));
        reply_rx.await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;

    fn rendered(ui: &TerminalUi<Vec<u8>>) -> String {
        String::from_utf8(lock(&ui.out).clone()).expect("utf8")
    }

    fn assistant(text: &str, status: MessageStatus, sources: &[&str]) -> ChatMessage {
        let mut message = ChatMessage::assistant_placeholder();
        message.text = text.to_string();
        message.status = status;
        message.sources = sources.iter().map(|s| s.to_string()).collect();
        message
    }

    #[test]
    fn renders_answer_with_sources() {
        let ui = TerminalUi::new(Vec::new());
        let id = MessageId(2);

        ui.append_message(MessageId(1), &ChatMessage::user("2+2?"));
        ui.append_message(id, &ChatMessage::assistant_placeholder());
        ui.update_message(id, &assistant("4", MessageStatus::Complete, &["doc1.pdf"]));

        assert_eq!(
            rendered(&ui),
            "you> 2+2?\nassistant> 4\nSources: doc1.pdf\n"
        );
    }

    #[test]
    fn streams_deltas_then_failure_marker() {
        let ui = TerminalUi::new(Vec::new());
        let id = MessageId(4);

        ui.append_message(id, &ChatMessage::assistant_placeholder());
        ui.update_message(id, &assistant("Hel", MessageStatus::Pending, &[]));
        ui.update_message(id, &assistant("Hello", MessageStatus::Pending, &[]));
        ui.update_message(
            id,
            &assistant("Hello\n\nError: Failed to get response", MessageStatus::Failed, &[]),
        );

        assert_eq!(
            rendered(&ui),
            "assistant> Hello\n\nError: Failed to get response\n"
        );
    }

    #[test]
    fn stats_keep_last_known_document_count() {
        let ui = TerminalUi::new(Vec::new());
        ui.render_stats(&StatsView {
            current_model_label: "modelX".to_string(),
            documents_count: Some(3),
            model_loaded: Some(true),
            system_status: SystemStatus::Online,
        });
        ui.render_stats(&StatsView {
            current_model_label: "modelX".to_string(),
            documents_count: None,
            model_loaded: None,
            system_status: SystemStatus::Error,
        });

        assert_eq!(
            rendered(&ui),
            "Model: modelX (loaded) | Documents: 3 | Status: online\n\
             Model: modelX | Documents: 3 | Status: error\n"
        );
    }

    #[test]
    fn tracks_disabled_controls() {
        let ui = TerminalUi::new(Vec::new());
        ui.set_control_state(Control::Upload, ControlState::busy(Control::Upload));
        assert_eq!(ui.disabled_label(Control::Upload), Some("Uploading..."));
        assert_eq!(ui.disabled_label(Control::LoadModel), None);

        ui.set_control_state(Control::Upload, ControlState::idle(Control::Upload));
        assert_eq!(ui.disabled_label(Control::Upload), None);
        assert_eq!(rendered(&ui), "[Uploading...]\n");
    }

    #[test]
    fn active_banner_is_not_repeated_within_its_window() {
        let banner = |dismiss_after| StatusBanner {
            level: StatusLevel::Error,
            text: "Please select files".to_string(),
            dismiss_after,
        };
        let ui = TerminalUi::new(Vec::new());
        ui.show_status(banner(Duration::from_secs(60)));
        ui.show_status(banner(Duration::from_secs(60)));
        assert_eq!(rendered(&ui), "[error] Please select files\n");

        let ui = TerminalUi::new(Vec::new());
        ui.show_status(banner(Duration::ZERO));
        ui.show_status(banner(Duration::ZERO));
        assert_eq!(
            rendered(&ui),
            "[error] Please select files\n[error] Please select files\n"
        );
    }

    #[test]
    fn marks_selected_model_option() {
        let ui = TerminalUi::new(Vec::new());
        ui.set_model_options(&[
            ModelOption {
                id: "orgA/modelX".to_string(),
                label: "modelX".to_string(),
                selected: true,
            },
            ModelOption {
                id: "orgB/modelY".to_string(),
                label: "modelY".to_string(),
                selected: false,
            },
        ]);
        assert_eq!(
            rendered(&ui),
            "Models:\n  * modelX (orgA/modelX)\n    modelY (orgB/modelY)\n"
        );
    }

    #[tokio::test]
    async fn confirmation_is_answered_by_next_line() {
        let ui = Arc::new(TerminalUi::new(Vec::new()));
        assert!(!ui.answer_confirmation("y"));

        let pending = {
            let ui = Arc::clone(&ui);
            tokio::spawn(async move { ui.confirm("Delete?").await })
        };
        while lock(&ui.pending_confirm).is_none() {
            tokio::task::yield_now().await;
        }
        assert!(ui.answer_confirmation(" Yes "));
        assert!(pending.await.expect("join"));

        let declined = {
            let ui = Arc::clone(&ui);
            tokio::spawn(async move { ui.confirm("Delete?").await })
        };
        while lock(&ui.pending_confirm).is_none() {
            tokio::task::yield_now().await;
        }
        ui.cancel_confirmation();
        assert!(!declined.await.expect("join"));
        assert!(rendered(&ui).contains("Delete? [y/N]"));
    }
}
