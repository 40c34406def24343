//! Plain-text rendering of the chat view.

use docchat_core::types::{short_id, Message, QueryChunk, Role, Session};
use docchat_session::ChatView;

pub const HELP: &str = "\
Commands:
  :new [title]          start a new chat session
  :sessions             list chat sessions
  :switch <n|id>        switch to session number n or an id prefix
  :attach <path>...     stage .txt / .pdf files for the next question
  :detach <n>           unstage pending file number n
  :files                show pending and uploaded files
  :history              show the conversation so far
  :help                 show this help
  :quit                 exit
Anything else is sent as a question about the active session.";

/// Number of the session at `index` in the newest-first list. The oldest
/// session is number 1; `:switch <n>` uses the same numbering.
pub fn list_number(index: usize, total: usize) -> usize {
    total.saturating_sub(index)
}

/// Label of a session in the session list: its title, or `Chat <n>`.
pub fn list_label(session: &Session, number: usize) -> String {
    match session.title() {
        Some(title) => title.to_string(),
        None => format!("Chat {}", number),
    }
}

pub fn session_list(view: &ChatView) -> String {
    if view.sessions.is_empty() {
        return if view.is_busy() {
            "Creating your first chat...".to_string()
        } else {
            "No chats yet. Start a new one with :new.".to_string()
        };
    }
    let active_id = view.active.as_ref().map(|s| s.session_id.as_str());
    let total = view.sessions.len();
    view.sessions
        .iter()
        .enumerate()
        .map(|(index, session)| {
            let marker = if Some(session.session_id.as_str()) == active_id {
                '*'
            } else {
                ' '
            };
            let number = list_number(index, total);
            format!(
                "{} {:>2}. {} ({})",
                marker,
                number,
                list_label(session, number),
                short_id(&session.session_id)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `source • page N • score 0.920`, skipping the parts that are missing.
pub fn chunk_meta(chunk: &QueryChunk) -> String {
    let mut parts = vec![chunk
        .source
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown source")
        .to_string()];
    if let Some(page) = chunk.page {
        parts.push(format!("page {}", page));
    }
    if let Some(score) = chunk.score {
        parts.push(format!("score {:.3}", score));
    }
    parts.join(" • ")
}

pub fn message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "docchat",
    };
    let mut out = format!("{}> {}", speaker, message.content);
    if message.role == Role::Assistant {
        if let Some(chunks) = message.chunks.as_deref().filter(|c| !c.is_empty()) {
            out.push_str("\n  Sources:");
            for (i, chunk) in chunks.iter().enumerate() {
                out.push_str(&format!("\n  [{}] {}", i + 1, chunk_meta(chunk)));
                if !chunk.text.trim().is_empty() {
                    out.push_str(&format!("\n      {}", chunk.text.trim()));
                }
            }
        }
    }
    out
}

pub fn history(view: &ChatView) -> String {
    if view.loading_history {
        return "Loading conversation...".to_string();
    }
    if view.messages.is_empty() {
        return "No messages yet. Ask a question to begin.".to_string();
    }
    view.messages
        .iter()
        .map(message)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn files(view: &ChatView) -> String {
    let mut lines = Vec::new();
    if view.pending.is_empty() {
        lines.push("Pending: none".to_string());
    } else {
        lines.push("Pending:".to_string());
        for (i, file) in view.pending.iter().enumerate() {
            lines.push(format!("  {}. {} ({} bytes)", i + 1, file.name, file.size));
        }
    }
    if view.uploaded_files.is_empty() {
        lines.push("Uploaded: none".to_string());
    } else {
        lines.push(format!("Uploaded: {}", view.uploaded_files.join(", ")));
    }
    lines.join("\n")
}

/// The error line when there is one, otherwise the status line.
pub fn notice(view: &ChatView) -> Option<String> {
    match (&view.error, &view.status) {
        (Some(error), _) => Some(format!("error: {}", error)),
        (None, Some(status)) => Some(status.clone()),
        (None, None) => None,
    }
}

pub fn prompt(view: &ChatView) -> String {
    match &view.active {
        Some(session) => format!("{}> ", session.label()),
        None => "docchat> ".to_string(),
    }
}
