//! Tab completion and usage hints for the REPL.

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use std::borrow::Cow;
use std::path::Path;

/// REPL helper providing command, meta command and document path completion.
pub struct WeaverHelper {
    /// JSON files in the working directory, for `open`/`save`.
    documents: Vec<String>,
}

impl WeaverHelper {
    pub fn new() -> Self {
        Self { documents: scan_documents(Path::new(".")) }
    }

    /// Rescan after a save created a new file.
    pub fn refresh_documents(&mut self) {
        self.documents = scan_documents(Path::new("."));
    }
}

impl Default for WeaverHelper {
    fn default() -> Self {
        Self::new()
    }
}

fn scan_documents(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else { return Vec::new() };
    let mut out: Vec<String> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| is_document(p))
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect();
    out.sort();
    out
}

fn is_document(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("json"))
            .unwrap_or(false)
}

/// Commands and their argument hints.
const COMMANDS: &[(&str, &str)] = &[
    ("play", ""),
    ("pause", ""),
    ("stop", ""),
    ("toggle", ""),
    ("tempo", " <bpm>"),
    ("bpm", " <bpm>"),
    ("add", ""),
    ("remove", " <measure>"),
    ("subdiv", " <measure> <1-16>"),
    ("rotate", " <measure> <pulse>"),
    ("edit", " <measure>"),
    ("close", ""),
    ("list", ""),
    ("status", ""),
    ("save", " \"file.json\""),
    ("open", " \"file.json\""),
    ("preset", " save|list|load|delete <name>"),
];

/// Meta commands (prefixed with :).
const META_COMMANDS: &[&str] = &[":help", ":q", ":quit", ":exit", ":live", ":live on", ":live off"];

impl Completer for WeaverHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line_to_pos = &line[..pos];

        if line_to_pos.starts_with(':') {
            let matches = META_COMMANDS
                .iter()
                .filter(|cmd| cmd.starts_with(line_to_pos))
                .map(|cmd| pair(cmd, cmd))
                .collect();
            return Ok((0, matches));
        }

        if let Some(start) = document_completion_start(line_to_pos) {
            let prefix = line_to_pos[start..].trim_start_matches('"');
            let matches = self
                .documents
                .iter()
                .filter(|name| name.starts_with(prefix))
                .map(|name| pair(name, &format!("\"{}\"", name)))
                .collect();
            return Ok((start, matches));
        }

        let words: Vec<&str> = line_to_pos.split_whitespace().collect();
        if words.is_empty() || (words.len() == 1 && !line_to_pos.ends_with(' ')) {
            let prefix = words.first().copied().unwrap_or("");
            let matches = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(prefix))
                .map(|(cmd, _)| pair(cmd, cmd))
                .collect();
            return Ok((0, matches));
        }

        Ok((pos, Vec::new()))
    }
}

fn pair(display: &str, replacement: &str) -> Pair {
    Pair { display: display.to_string(), replacement: replacement.to_string() }
}

/// Start of the path argument when completing `open`/`save`.
fn document_completion_start(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let offset = line.len() - trimmed.len();
    let (cmd, rest) = trimmed.split_once(' ')?;
    if !matches!(cmd, "open" | "save") {
        return None;
    }
    let arg = rest.trim_start();
    if arg.contains(' ') && !arg.starts_with('"') {
        return None;
    }
    Some(offset + cmd.len() + 1 + (rest.len() - arg.len()))
}

impl Hinter for WeaverHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }
        COMMANDS
            .iter()
            .find(|(cmd, args)| !args.is_empty() && *cmd == line.trim())
            .map(|(_, args)| args.to_string())
    }
}

impl Highlighter for WeaverHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[90m{}\x1b[0m", hint))
    }
}

impl Validator for WeaverHelper {}

impl Helper for WeaverHelper {}
