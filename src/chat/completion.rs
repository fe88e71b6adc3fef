//! Tab completion for the line editor.
//!
//! Completion is driven by the command registry: the first word after the prefix completes
//! command names, the second completes the command's literal sub-arguments (or config field
//! names), and the arguments of file commands complete paths.

use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use crate::chat::commands::{ArgCompletion, completion_tree};

/// What the word under the cursor should complete to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionTarget {
    /// Replace `line[start..pos]` with one of `candidates`.
    Candidates {
        start: usize,
        candidates: Vec<String>,
    },
    /// Complete a filesystem path.
    Path,
    Nothing,
}

/// Decide how to complete `line` with the cursor at byte offset `pos`.
pub fn complete_command_line(line: &str, pos: usize, prefix: char) -> CompletionTarget {
    let Some(before) = line.get(..pos) else {
        return CompletionTarget::Nothing;
    };
    let Some(body) = before.strip_prefix(prefix) else {
        return CompletionTarget::Nothing;
    };
    let word_start = body
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let word = &body[word_start..];
    let tokens: Vec<&str> = body[..word_start].split_whitespace().collect();
    let start = prefix.len_utf8() + word_start;
    let tree = completion_tree();

    let candidates: Vec<String> = match tokens.as_slice() {
        [] => tree
            .iter()
            .map(|node| node.name)
            .filter(|name| name.starts_with(word))
            .map(String::from)
            .collect(),
        [command, ..] => {
            let Some(node) = tree.iter().find(|node| node.name == *command) else {
                return CompletionTarget::Nothing;
            };
            match &node.args {
                ArgCompletion::Paths => return CompletionTarget::Path,
                ArgCompletion::Words(_) if tokens.len() > 1 => {
                    return CompletionTarget::Nothing;
                }
                ArgCompletion::Words(words) => words
                    .iter()
                    .filter(|candidate| starts_with_ignore_case(candidate, word))
                    .map(|candidate| candidate.to_string())
                    .collect(),
            }
        }
    };
    CompletionTarget::Candidates { start, candidates }
}

fn starts_with_ignore_case(name: &str, word: &str) -> bool {
    name.get(..word.len()).is_some_and(|head| head.eq_ignore_ascii_case(word))
}

/// rustyline helper providing registry-driven completion.
pub struct ReplHelper {
    prefix: char,
    files: FilenameCompleter,
}

impl ReplHelper {
    pub fn new(prefix: char) -> Self {
        Self {
            prefix,
            files: FilenameCompleter::new(),
        }
    }

    pub fn set_prefix(&mut self, prefix: char) {
        self.prefix = prefix;
    }
}

impl Helper for ReplHelper {}

impl Highlighter for ReplHelper {}

impl Validator for ReplHelper {}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        match complete_command_line(line, pos, self.prefix) {
            CompletionTarget::Candidates { start, candidates } => Ok((
                start,
                candidates
                    .into_iter()
                    .map(|candidate| Pair {
                        display: candidate.clone(),
                        replacement: candidate,
                    })
                    .collect(),
            )),
            CompletionTarget::Path => self.files.complete(line, pos, ctx),
            CompletionTarget::Nothing => Ok((pos, Vec::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(line: &str) -> (usize, Vec<String>) {
        match complete_command_line(line, line.len(), '/') {
            CompletionTarget::Candidates { start, candidates } => (start, candidates),
            other => panic!("expected candidates for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn completes_command_names() {
        let names: Vec<String> = completion_tree()
            .into_iter()
            .map(|node| node.name.to_string())
            .collect();
        assert_eq!(candidates("/").1, names);
        assert_eq!(candidates("/s"), (1, vec!["system".to_string(), "save".to_string()]));
        assert_eq!(candidates("/ex"), (1, vec!["exit".to_string()]));
    }

    #[test]
    fn completes_sub_arguments() {
        assert_eq!(candidates("/system "), (8, vec!["show".to_string(), "reset".to_string()]));
        assert_eq!(candidates("/system  r"), (9, vec!["reset".to_string()]));
        assert_eq!(candidates("/system S"), (8, vec!["show".to_string()]));
        assert_eq!(candidates("/help "), (6, Vec::new()));
    }

    #[test]
    fn completes_config_fields_ignoring_case() {
        assert_eq!(
            candidates("/config re"),
            (8, vec!["RenderMarkdown".to_string()])
        );
        assert_eq!(
            complete_command_line("/config Theme d", 15, '/'),
            CompletionTarget::Nothing
        );
    }

    #[test]
    fn file_commands_complete_paths() {
        for line in ["/embed ", "/embed a.txt src/", "/save ", "/load hist"] {
            assert_eq!(
                complete_command_line(line, line.len(), '/'),
                CompletionTarget::Path,
                "{line}"
            );
        }
    }

    #[test]
    fn chat_lines_and_unknown_commands_complete_nothing() {
        assert_eq!(complete_command_line("hello", 5, '/'), CompletionTarget::Nothing);
        assert_eq!(complete_command_line("", 0, '/'), CompletionTarget::Nothing);
        assert_eq!(complete_command_line("/bogus ", 7, '/'), CompletionTarget::Nothing);
    }

    #[test]
    fn respects_cursor_and_prefix() {
        assert_eq!(
            complete_command_line(":sy whatever", 3, ':'),
            CompletionTarget::Candidates {
                start: 1,
                candidates: vec!["system".to_string()]
            }
        );
        assert_eq!(complete_command_line("/sy", 3, ':'), CompletionTarget::Nothing);
    }
}
