//! Terminal rendering of conversation state.

use std::sync::{Arc, Mutex, PoisonError};

use chatrag::{ChatMessage, ConversationState, RagContext, Role, format_similarity};
use chrono::Local;
use tokio::sync::watch;

const PREVIEW_CHARS: usize = 80;

/// `[HH:MM] role: content`, in local time.
pub fn format_message(message: &ChatMessage) -> String {
    format!(
        "[{}] {}: {}",
        message.timestamp.with_timezone(&Local).format("%H:%M"),
        message.role,
        message.content
    )
}

/// Single-line preview of at most `max` characters, with an ellipsis when cut.
pub fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

pub fn print_history(state: &ConversationState) {
    if state.messages.is_empty() {
        println!("(no messages)");
        return;
    }
    for message in &state.messages {
        println!("{}", format_message(message));
    }
}

/// One line per retrieved document, indented under the answer it supports.
pub fn context_lines(context: &RagContext) -> Vec<String> {
    if context.documents.is_empty() {
        return vec!["  (no matching documents)".to_string()];
    }
    context
        .documents
        .iter()
        .enumerate()
        .map(|(idx, doc)| {
            format!(
                "  [{}] similarity {}  {}",
                idx + 1,
                format_similarity(doc.similarity),
                preview(&doc.content, PREVIEW_CHARS)
            )
        })
        .collect()
}

pub fn print_context(context: &RagContext) {
    for line in context_lines(context) {
        println!("{line}");
    }
}

/// Retrieved context waiting to be shown with the next assistant message.
///
/// The responder fills it; only the render loop prints, so the listing
/// never lands in the middle of the input prompt.
#[derive(Debug, Default)]
pub struct ContextSlot(Mutex<Option<RagContext>>);

impl ContextSlot {
    /// Replace any context left over from an earlier request.
    pub fn put(&self, context: RagContext) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(context);
    }

    pub fn take(&self) -> Option<RagContext> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Tracks what the terminal has already shown.
#[derive(Debug, Default)]
struct Transcript {
    last_printed: Option<String>,
    was_busy: bool,
}

impl Transcript {
    /// Lines to print for `state`, given what was printed before.
    fn advance(&mut self, state: &ConversationState, context: Option<&ContextSlot>) -> Vec<String> {
        let mut lines = Vec::new();
        // A cleared log no longer contains the last printed id.
        let start = self
            .last_printed
            .as_ref()
            .and_then(|id| state.messages.iter().position(|m| &m.id == id))
            .map_or(0, |idx| idx + 1);
        for message in &state.messages[start..] {
            if message.role == Role::Assistant {
                if let Some(context) = context.and_then(ContextSlot::take) {
                    lines.extend(context_lines(&context));
                }
            }
            lines.push(format_message(message));
        }
        if let Some(last) = state.messages.last() {
            self.last_printed = Some(last.id.clone());
        }
        if state.is_busy() && !self.was_busy {
            lines.push("Thinking...".to_string());
        }
        self.was_busy = state.is_busy();
        lines
    }
}

/// Print every new message and a busy marker until the conversation is
/// dropped. When `context` is given, its contents are listed just above
/// the assistant message they belong to.
pub async fn follow(mut rx: watch::Receiver<ConversationState>, context: Option<Arc<ContextSlot>>) {
    let mut transcript = Transcript::default();

    loop {
        let lines = transcript.advance(&rx.borrow_and_update(), context.as_deref());
        for line in lines {
            println!("{line}");
        }

        if rx.changed().await.is_err() {
            break;
        }
    }
}
