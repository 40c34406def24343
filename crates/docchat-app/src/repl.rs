//! Line-oriented coordinator: reads user intents, forwards them to the chat
//! client, and prints what changed.

use std::io::Write;
use std::path::Path;

use docchat_session::{ChatClient, PendingFile, SessionError, SubmitOutcome};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::render;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New(Option<String>),
    Sessions,
    Switch(String),
    Attach(Vec<String>),
    Detach(usize),
    Files,
    History,
    Help,
    Quit,
    Ask(String),
    Empty,
}

/// Parse a line. Lines starting with `:` are commands; anything else is a
/// question.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Command::Ask(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "new" => Ok(Command::New((!arg.is_empty()).then(|| arg.to_string()))),
        "sessions" | "ls" => Ok(Command::Sessions),
        "switch" | "s" if !arg.is_empty() => Ok(Command::Switch(arg.to_string())),
        "switch" | "s" => Err("usage: :switch <n|id-prefix>".to_string()),
        "attach" | "a" if !arg.is_empty() => Ok(Command::Attach(
            arg.split_whitespace().map(str::to_string).collect(),
        )),
        "attach" | "a" => Err("usage: :attach <path>...".to_string()),
        "detach" => arg
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(Command::Detach)
            .ok_or_else(|| "usage: :detach <n>".to_string()),
        "files" => Ok(Command::Files),
        "history" | "h" => Ok(Command::History),
        "help" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(format!("Unknown command :{}. Type :help for commands.", other)),
    }
}

/// Terminal front end over a [`ChatClient`].
pub struct Repl<W: Write> {
    client: ChatClient,
    out: W,
}

impl<W: Write> Repl<W> {
    pub fn new(client: ChatClient, out: W) -> Self {
        Self { client, out }
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Print the greeting and create the first session.
    pub async fn start(&mut self, title: Option<String>) -> std::io::Result<()> {
        writeln!(self.out, "docchat {}. Type :help for commands.", env!("CARGO_PKG_VERSION"))?;
        // Failures are already in the view's error line.
        let _ = self.client.bootstrap(title).await;
        self.print_notice()
    }

    /// Read lines until EOF or `:quit`.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> std::io::Result<()> {
        let mut lines = input.lines();
        loop {
            let view = self.client.view();
            write!(self.out, "{}", render::prompt(&view))?;
            self.out.flush()?;

            let Some(line) = lines.next_line().await? else {
                writeln!(self.out)?;
                return Ok(());
            };
            if !self.handle_line(&line).await? {
                return Ok(());
            }
        }
    }

    /// Handle one input line. Returns `false` when the user asked to quit.
    pub async fn handle_line(&mut self, line: &str) -> std::io::Result<bool> {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(usage) => {
                writeln!(self.out, "{}", usage)?;
                return Ok(true);
            }
        };
        tracing::debug!(?command, "Dispatching");

        match command {
            Command::Empty => {}
            Command::Quit => return Ok(false),
            Command::Help => writeln!(self.out, "{}", render::HELP)?,
            Command::Sessions => {
                writeln!(self.out, "{}", render::session_list(&self.client.view()))?
            }
            Command::Files => writeln!(self.out, "{}", render::files(&self.client.view()))?,
            Command::History => writeln!(self.out, "{}", render::history(&self.client.view()))?,
            Command::New(title) => {
                let _ = self.client.new_session(title).await;
                self.print_notice()?;
            }
            Command::Switch(target) => self.switch(&target).await?,
            Command::Attach(paths) => self.attach(&paths).await?,
            Command::Detach(n) => self.detach(n)?,
            Command::Ask(question) => self.ask(&question).await?,
        }
        Ok(true)
    }

    async fn switch(&mut self, target: &str) -> std::io::Result<()> {
        let view = self.client.view();
        let total = view.sessions.len();
        // A list number first; an all-digit id prefix still matches below.
        let by_number = target
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=total).contains(n))
            .map(|n| view.sessions[total - n].session_id.as_str());
        let matched: Vec<&str> = match by_number {
            Some(id) => vec![id],
            None => view
                .sessions
                .iter()
                .map(|s| s.session_id.as_str())
                .filter(|id| id.starts_with(target))
                .collect(),
        };
        let session_id = match matched.as_slice() {
            [id] => id.to_string(),
            [] => return writeln!(self.out, "No session matches {}.", target),
            _ => return writeln!(self.out, "{} matches more than one session.", target),
        };

        match self.client.select_session(&session_id).await {
            Ok(_) => {
                self.print_notice()?;
                writeln!(self.out, "{}", render::history(&self.client.view()))
            }
            Err(SessionError::Busy) => writeln!(self.out, "{}", SessionError::Busy),
            Err(e) => writeln!(self.out, "error: {}", e),
        }
    }

    async fn attach(&mut self, paths: &[String]) -> std::io::Result<()> {
        let mut files = Vec::new();
        for path in paths {
            match PendingFile::from_path(Path::new(path)).await {
                Ok(file) => files.push(file),
                Err(e) => writeln!(self.out, "error: {}", e)?,
            }
        }
        if files.is_empty() {
            return Ok(());
        }

        match self.client.stage_files(files) {
            Ok(report) => {
                if !report.added.is_empty() {
                    writeln!(self.out, "Attached {}.", report.added.join(", "))?;
                }
                if !report.duplicates.is_empty() {
                    writeln!(self.out, "Already attached: {}.", report.duplicates.join(", "))?;
                }
                self.print_notice()
            }
            Err(_) => self.print_notice(),
        }
    }

    fn detach(&mut self, n: usize) -> std::io::Result<()> {
        let view = self.client.view();
        match view.pending.get(n - 1) {
            Some(file) => {
                self.client.unstage_file(&file.key);
                writeln!(self.out, "Detached {}.", file.name)
            }
            None => writeln!(self.out, "No pending file number {}.", n),
        }
    }

    async fn ask(&mut self, question: &str) -> std::io::Result<()> {
        let pending = self.client.view().pending.len();
        if pending > 0 {
            writeln!(self.out, "Uploading {} file(s) before asking...", pending)?;
        }

        match self.client.ask(question).await {
            Ok(SubmitOutcome::Answered { .. }) => {
                let view = self.client.view();
                match view.messages.last() {
                    Some(last) => writeln!(self.out, "{}", render::message(last))?,
                    None => writeln!(self.out, "(no answer)")?,
                }
                Ok(())
            }
            Ok(SubmitOutcome::NotIndexed { .. }) => self.print_notice(),
            Err(SessionError::Busy) => writeln!(self.out, "{}", SessionError::Busy),
            Err(_) => self.print_notice(),
        }
    }

    fn print_notice(&mut self) -> std::io::Result<()> {
        match render::notice(&self.client.view()) {
            Some(line) => writeln!(self.out, "{}", line),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use docchat_client::{MockRemoteService, Step};
    use docchat_core::config::UploadConfig;

    fn repl(mock: &MockRemoteService) -> Repl<Vec<u8>> {
        let client = ChatClient::new(Arc::new(mock.clone()), UploadConfig::default());
        Repl::new(client, Vec::new())
    }

    fn printed(repl: &Repl<Vec<u8>>) -> String {
        String::from_utf8_lossy(repl.output()).into_owned()
    }

    // ---- Parsing ----

    #[test]
    fn test_parse_questions_and_commands() {
        assert_eq!(parse_command("  "), Ok(Command::Empty));
        assert_eq!(
            parse_command(" What is X? "),
            Ok(Command::Ask("What is X?".to_string()))
        );
        assert_eq!(parse_command(":new"), Ok(Command::New(None)));
        assert_eq!(
            parse_command(":new Quarterly report"),
            Ok(Command::New(Some("Quarterly report".to_string())))
        );
        assert_eq!(
            parse_command(":attach a.txt  b.pdf"),
            Ok(Command::Attach(vec!["a.txt".to_string(), "b.pdf".to_string()]))
        );
        assert_eq!(parse_command(":switch 2"), Ok(Command::Switch("2".to_string())));
        assert_eq!(parse_command(":detach 1"), Ok(Command::Detach(1)));
        assert_eq!(parse_command(":q"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command(":detach 0").is_err());
        assert!(parse_command(":detach x").is_err());
        assert!(parse_command(":switch").is_err());
        assert!(parse_command(":attach").is_err());
        assert_eq!(
            parse_command(":frobnicate"),
            Err("Unknown command :frobnicate. Type :help for commands.".to_string())
        );
    }

    // ---- Dispatch ----

    #[tokio::test]
    async fn test_start_bootstraps_session() {
        let mock = MockRemoteService::new();
        let mut repl = repl(&mock);
        repl.start(Some("Contracts".to_string())).await.unwrap();
        assert!(printed(&repl).contains("Created Contracts."));
        assert_eq!(mock.count(Step::CreateSession), 1);
    }

    #[tokio::test]
    async fn test_start_unconfigured_reports_error() {
        let mock = MockRemoteService::unconfigured();
        let mut repl = repl(&mock);
        repl.start(None).await.unwrap();
        assert!(printed(&repl).contains("error: Backend base URL is not configured"));
    }

    #[tokio::test]
    async fn test_question_prints_answer() {
        let mock = MockRemoteService::new();
        let mut repl = repl(&mock);
        repl.start(None).await.unwrap();
        let session_id = repl.client.view().active.unwrap().session_id;
        mock.mark_indexed(&session_id);

        assert!(repl.handle_line("What is X?").await.unwrap());
        assert!(printed(&repl).contains("docchat> Answer to: What is X?"));
    }

    #[tokio::test]
    async fn test_question_without_index_prints_hint() {
        let mock = MockRemoteService::new();
        let mut repl = repl(&mock);
        repl.start(None).await.unwrap();

        repl.handle_line("What is X?").await.unwrap();
        assert!(printed(&repl)
            .contains("error: No index found for this chat. Upload documents and ingest first."));
    }

    #[tokio::test]
    async fn test_switch_by_number_and_prefix() {
        let mock = MockRemoteService::new();
        let mut repl = repl(&mock);
        repl.start(None).await.unwrap();
        let first = repl.client.view().active.unwrap().session_id;
        repl.handle_line(":new Second").await.unwrap();
        let second = repl.client.view().active.unwrap().session_id;

        // Numbers follow creation order: the bootstrap session is number 1.
        repl.handle_line(":switch 1").await.unwrap();
        assert_eq!(repl.client.view().active.unwrap().session_id, first);
        repl.handle_line(":switch 2").await.unwrap();
        assert_eq!(repl.client.view().active.unwrap().session_id, second);

        repl.handle_line(":switch 3").await.unwrap();
        assert!(printed(&repl).contains("No session matches 3."));

        repl.handle_line(":switch zzzz").await.unwrap();
        assert!(printed(&repl).contains("No session matches zzzz."));

        let prefix = &first[..8];
        repl.handle_line(&format!(":switch {}", prefix)).await.unwrap();
        assert_eq!(repl.client.view().active.unwrap().session_id, first);
    }

    #[tokio::test]
    async fn test_attach_missing_file() {
        let mock = MockRemoteService::new();
        let mut repl = repl(&mock);
        repl.start(None).await.unwrap();
        repl.handle_line(":attach /nonexistent/notes.txt").await.unwrap();
        assert!(printed(&repl).contains("error: Failed to read notes.txt"));
        assert!(repl.client.view().pending.is_empty());
    }

    #[tokio::test]
    async fn test_quit_and_run_until_eof() {
        let mock = MockRemoteService::new();
        let mut repl = repl(&mock);
        assert!(!repl.handle_line(":quit").await.unwrap());

        let input: &[u8] = b":help\n:sessions\n";
        repl.run(input).await.unwrap();
        let out = printed(&repl);
        assert!(out.contains("Commands:"));
        assert!(out.contains("No chats yet"));
    }
}
