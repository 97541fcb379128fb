use reedline::{Completer, Span, Suggestion};
use std::sync::{Arc, Mutex};

/// Shell commands offered at the start of a line
pub const COMMANDS: &[&str] = &[
    "\\load", "\\search", "\\filter", "\\pick", "\\unfilter", "\\clear", "\\columns", "\\show",
    "\\hide", "\\left", "\\right", "\\reorder", "\\sort", "\\views", "\\save", "\\apply",
    "\\delete", "\\default", "\\fav", "\\select", "\\next", "\\prev", "\\inspect", "\\page",
    "\\fields", "\\export", "\\logs", "\\status", "\\help", "\\quit",
];

/// Commands whose arguments are field paths
const PATH_COMMANDS: &[&str] = &[
    "\\filter", "\\pick", "\\show", "\\hide", "\\left", "\\right", "\\reorder", "\\sort",
    "\\inspect",
];

/// Completes command names and, after a path-taking command, the field
/// paths found in the loaded records
pub struct ExplorerCompleter {
    field_paths: Arc<Mutex<Vec<String>>>,
}

impl ExplorerCompleter {
    pub fn new(field_paths: Arc<Mutex<Vec<String>>>) -> Self {
        Self { field_paths }
    }

    fn candidates(&self, command: Option<&str>) -> Vec<(String, &'static str)> {
        match command {
            None => COMMANDS
                .iter()
                .map(|c| (c.to_string(), "command"))
                .collect(),
            Some(cmd) if PATH_COMMANDS.contains(&cmd) => self
                .field_paths
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .map(|p| (p.clone(), "field"))
                .collect(),
            Some(_) => Vec::new(),
        }
    }
}

impl Completer for ExplorerCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        let input = &line[..pos.min(line.len())];
        let partial = input
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or_default();
        let start_pos = pos.saturating_sub(partial.len());

        let before = input[..start_pos].trim();
        let command = before.split_whitespace().next();

        self.candidates(command)
            .into_iter()
            .filter(|(value, _)| value.starts_with(partial))
            .map(|(value, kind)| Suggestion {
                append_whitespace: kind == "command",
                value,
                description: Some(kind.to_string()),
                extra: None,
                span: Span {
                    start: start_pos,
                    end: pos,
                },
                style: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completer() -> ExplorerCompleter {
        ExplorerCompleter::new(Arc::new(Mutex::new(vec![
            "metadata.source".to_string(),
            "status".to_string(),
            "user.email".to_string(),
        ])))
    }

    #[test]
    fn test_completes_commands() {
        let values: Vec<String> = completer()
            .complete("\\fi", 3)
            .into_iter()
            .map(|s| s.value)
            .collect();
        assert_eq!(values, vec!["\\filter", "\\fields"]);
    }

    #[test]
    fn test_completes_paths_after_command() {
        let suggestions = completer().complete("\\show us", 8);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].value, "user.email");
        assert_eq!(suggestions[0].span.start, 6);
    }

    #[test]
    fn test_no_paths_for_other_commands() {
        assert!(completer().complete("\\save st", 8).is_empty());
    }
}
