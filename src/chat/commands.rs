//! REPL command registry and parsing.
//!
//! A line is a command when its first character is the configured prefix.  The registry in
//! [`COMMANDS`] is the single source for help text and tab completion; each command checks its
//! own arguments when parsed, because they differ in shape (a fixed choice, a file list, an
//! optional path).

use std::fmt;

use super::config::{FIELDS, FieldError};

/// One entry of the command registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    /// Argument names.  Names in `<...>` or `[...]` are placeholders; bare names are literal
    /// choices offered by completion.
    pub args: &'static [&'static str],
    pub description: &'static str,
}

impl CommandSpec {
    /// The literal sub-arguments this command accepts.
    pub fn choices(&self) -> impl Iterator<Item = &'static str> {
        self.args.iter().copied().filter(|arg| !is_placeholder(arg))
    }

    /// The invocation pattern shown in help, e.g. `/system <show | reset>`.
    pub fn invocation(&self, prefix: char) -> String {
        let choices: Vec<&str> = self.choices().collect();
        let args = if !choices.is_empty() && choices.len() == self.args.len() {
            format!("<{}>", choices.join(" | "))
        } else {
            self.args.join(" ")
        };
        if args.is_empty() {
            format!("{prefix}{}", self.name)
        } else {
            format!("{prefix}{} {args}", self.name)
        }
    }

    /// True when the arguments of this command are file paths.
    pub fn takes_paths(&self) -> bool {
        matches!(self.name, "embed" | "save" | "load")
    }
}

fn is_placeholder(arg: &str) -> bool {
    arg.starts_with('<') || arg.starts_with('[')
}

/// Every REPL command, in help order.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "system",
        args: &["show", "reset"],
        description: "Manipulate the system prompt",
    },
    CommandSpec {
        name: "embed",
        args: &["<file>..."],
        description: "Embed files into the system prompt",
    },
    CommandSpec {
        name: "save",
        args: &["[path]"],
        description: "Save the conversation history",
    },
    CommandSpec {
        name: "load",
        args: &["[path]"],
        description: "Replace the conversation history with a saved one",
    },
    CommandSpec {
        name: "copy",
        args: &[],
        description: "Copy the last response to the clipboard",
    },
    CommandSpec {
        name: "config",
        args: &["[<field> <value>]"],
        description: "Show the configuration or change one field",
    },
    CommandSpec {
        name: "help",
        args: &[],
        description: "Display this help",
    },
    CommandSpec {
        name: "exit",
        args: &[],
        description: "Exit the REPL",
    },
];

/// Look a command up by its exact name.
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// The help table: invocation and description, columns aligned.
pub fn help_table(prefix: char) -> String {
    let rows: Vec<(String, &str)> = COMMANDS
        .iter()
        .map(|spec| (spec.invocation(prefix), spec.description))
        .collect();
    let width = rows.iter().map(|(inv, _)| inv.len()).max().unwrap_or(0);
    let mut out = String::from("Help:");
    for (invocation, description) in rows {
        out.push_str(&format!("\n    {invocation:<width$} {description}"));
    }
    out
}

/// How the arguments of a command complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgCompletion {
    /// The first argument is one of these words.
    Words(Vec<&'static str>),
    /// Every argument is a filesystem path.
    Paths,
}

/// One command in the completion tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionNode {
    pub name: &'static str,
    pub args: ArgCompletion,
}

/// Every command with the completions of its arguments, derived from [`COMMANDS`].
///
/// `config` completes configuration field names.
pub fn completion_tree() -> Vec<CompletionNode> {
    COMMANDS
        .iter()
        .map(|spec| {
            let args = if spec.takes_paths() {
                ArgCompletion::Paths
            } else if spec.name == "config" {
                ArgCompletion::Words(FIELDS.iter().map(|field| field.name).collect())
            } else {
                ArgCompletion::Words(spec.choices().collect())
            };
            CompletionNode {
                name: spec.name,
                args,
            }
        })
        .collect()
}

/// What `system` should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemAction {
    Show,
    Reset,
}

/// A parsed REPL command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    System(SystemAction),
    /// Files to append to the system prompt, in order.
    Embed(Vec<String>),
    Save(Option<String>),
    Load(Option<String>),
    Copy,
    ShowConfig,
    SetConfig { field: String, value: String },
    Help,
    Exit,
}

/// A command that could not be carried out.  None of these change session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    UnknownCommand(String),
    Usage(String),
    UnknownField(String),
    UnsupportedFieldType(String),
    InvalidValue { field: String, reason: String },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::UnknownCommand(name) => {
                write!(f, "`{name}` is not a valid REPL command")
            }
            DispatchError::Usage(text) => write!(f, "{text}"),
            DispatchError::UnknownField(name) => write!(f, "unknown config field `{name}`"),
            DispatchError::UnsupportedFieldType(name) => {
                write!(f, "unsupported field type for `{name}`")
            }
            DispatchError::InvalidValue { field, reason } => {
                write!(f, "invalid value for `{field}`: {reason}")
            }
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<FieldError> for DispatchError {
    fn from(err: FieldError) -> Self {
        match err {
            FieldError::Unknown(name) => DispatchError::UnknownField(name),
            FieldError::Unsupported(name) => DispatchError::UnsupportedFieldType(name),
            FieldError::Invalid { field, reason } => DispatchError::InvalidValue { field, reason },
        }
    }
}

/// Parses a REPL line.
///
/// Returns `None` when the line is a chat message, i.e. it does not start with `prefix`
/// (an empty line is a chat message).
///
/// # Examples
///
/// ```
/// # use parley::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/exit", '/'), Some(Ok(ChatCommand::Exit)));
/// assert!(parse_command("/bogus", '/').unwrap().is_err());
/// assert!(parse_command("hello", '/').is_none());
/// assert!(parse_command("", '/').is_none());
/// ```
pub fn parse_command(line: &str, prefix: char) -> Option<Result<ChatCommand, DispatchError>> {
    let rest = line.strip_prefix(prefix)?;
    let mut tokens = rest.split_whitespace();
    let name = tokens.next().unwrap_or("");
    let args: Vec<&str> = tokens.collect();
    Some(parse_tokens(name, &args, prefix))
}

fn parse_tokens(name: &str, args: &[&str], prefix: char) -> Result<ChatCommand, DispatchError> {
    let usage = |text: &str| DispatchError::Usage(format!("`{prefix}{text}"));
    match name {
        "system" => match args {
            ["show"] => Ok(ChatCommand::System(SystemAction::Show)),
            ["reset"] => Ok(ChatCommand::System(SystemAction::Reset)),
            _ => Err(usage("system <option>` command expects `show`, or `reset`")),
        },
        "embed" => {
            if args.is_empty() {
                Err(usage("embed <file>` command expects at least a file name"))
            } else {
                Ok(ChatCommand::Embed(
                    args.iter().map(|arg| arg.to_string()).collect(),
                ))
            }
        }
        "save" => match args {
            [] => Ok(ChatCommand::Save(None)),
            [path] => Ok(ChatCommand::Save(Some(path.to_string()))),
            _ => Err(usage("save <path>` command expects only a file path")),
        },
        "load" => match args {
            [] => Ok(ChatCommand::Load(None)),
            [path] => Ok(ChatCommand::Load(Some(path.to_string()))),
            _ => Err(usage("load <path>` command expects only a file path")),
        },
        "config" => match args {
            [] => Ok(ChatCommand::ShowConfig),
            [field, value] => Ok(ChatCommand::SetConfig {
                field: field.to_string(),
                value: value.to_string(),
            }),
            _ => Err(usage(
                "config <field> <value>` command expects no arguments, or a field and a value",
            )),
        },
        "copy" => Ok(ChatCommand::Copy),
        "help" => Ok(ChatCommand::Help),
        "exit" => Ok(ChatCommand::Exit),
        _ => Err(DispatchError::UnknownCommand(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<ChatCommand, DispatchError> {
        parse_command(line, '/').expect("line should be a command")
    }

    #[test]
    fn chat_lines_are_not_commands() {
        assert!(parse_command("Hello!", '/').is_none());
        assert!(parse_command("", '/').is_none());
        assert!(parse_command(" /exit", '/').is_none());
        assert!(parse_command("/exit", ':').is_none());
        assert_eq!(parse_command(":exit", ':'), Some(Ok(ChatCommand::Exit)));
    }

    #[test]
    fn parse_system() {
        assert_eq!(
            parse("/system show"),
            Ok(ChatCommand::System(SystemAction::Show))
        );
        assert_eq!(
            parse("/system   reset"),
            Ok(ChatCommand::System(SystemAction::Reset))
        );
        for line in ["/system", "/system show reset", "/system bogus"] {
            assert_eq!(
                parse(line),
                Err(DispatchError::Usage(
                    "`/system <option>` command expects `show`, or `reset`".to_string()
                )),
                "{line}"
            );
        }
    }

    #[test]
    fn parse_embed() {
        assert_eq!(
            parse("/embed a.txt  b.txt"),
            Ok(ChatCommand::Embed(vec![
                "a.txt".to_string(),
                "b.txt".to_string()
            ]))
        );
        assert!(matches!(parse("/embed"), Err(DispatchError::Usage(_))));
    }

    #[test]
    fn parse_save_and_load() {
        assert_eq!(parse("/save"), Ok(ChatCommand::Save(None)));
        assert_eq!(
            parse("/save out.json"),
            Ok(ChatCommand::Save(Some("out.json".to_string())))
        );
        assert_eq!(parse("/load"), Ok(ChatCommand::Load(None)));
        assert!(matches!(parse("/save a b"), Err(DispatchError::Usage(_))));
        assert!(matches!(parse("/load a b"), Err(DispatchError::Usage(_))));
    }

    #[test]
    fn parse_config() {
        assert_eq!(parse("/config"), Ok(ChatCommand::ShowConfig));
        assert_eq!(
            parse("/config RenderMarkdown true"),
            Ok(ChatCommand::SetConfig {
                field: "RenderMarkdown".to_string(),
                value: "true".to_string()
            })
        );
        assert!(matches!(parse("/config Model"), Err(DispatchError::Usage(_))));
        assert!(matches!(parse("/config a b c"), Err(DispatchError::Usage(_))));
    }

    #[test]
    fn exit_ignores_trailing_arguments() {
        assert_eq!(parse("/exit now please"), Ok(ChatCommand::Exit));
        assert_eq!(parse("/help me"), Ok(ChatCommand::Help));
        assert_eq!(parse("/copy that"), Ok(ChatCommand::Copy));
    }

    #[test]
    fn unknown_commands() {
        assert_eq!(
            parse("/quit"),
            Err(DispatchError::UnknownCommand("quit".to_string()))
        );
        assert_eq!(parse("/"), Err(DispatchError::UnknownCommand(String::new())));
        assert_eq!(
            parse("/quit").unwrap_err().to_string(),
            "`quit` is not a valid REPL command"
        );
    }

    #[test]
    fn usage_uses_configured_prefix() {
        let err = parse_command(":embed", ':').unwrap().unwrap_err();
        assert_eq!(
            err.to_string(),
            "`:embed <file>` command expects at least a file name"
        );
    }

    #[test]
    fn invocations() {
        assert_eq!(find("system").unwrap().invocation('/'), "/system <show | reset>");
        assert_eq!(find("embed").unwrap().invocation('/'), "/embed <file>...");
        assert_eq!(find("exit").unwrap().invocation(':'), ":exit");
        assert!(find("quit").is_none());
    }

    #[test]
    fn help_table_is_aligned() {
        let help = help_table('/');
        let mut lines = help.lines();
        assert_eq!(lines.next(), Some("Help:"));
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), COMMANDS.len());
        let column = rows[0].find("Manipulate").unwrap();
        for (row, spec) in rows.iter().zip(COMMANDS) {
            assert_eq!(row.find(spec.description), Some(column), "{row}");
        }
        assert!(help.contains("    /system <show | reset> "));
    }

    #[test]
    fn completion_tree_follows_the_registry() {
        let tree = completion_tree();
        let names: Vec<&str> = tree.iter().map(|node| node.name).collect();
        let registry: Vec<&str> = COMMANDS.iter().map(|spec| spec.name).collect();
        assert_eq!(names, registry);

        let args = |name: &str| {
            tree.iter()
                .find(|node| node.name == name)
                .map(|node| node.args.clone())
                .unwrap()
        };
        assert_eq!(args("system"), ArgCompletion::Words(vec!["show", "reset"]));
        assert_eq!(args("embed"), ArgCompletion::Paths);
        assert_eq!(args("load"), ArgCompletion::Paths);
        assert_eq!(args("exit"), ArgCompletion::Words(Vec::new()));
        match args("config") {
            ArgCompletion::Words(words) => {
                assert!(words.contains(&"RenderMarkdown"));
                assert_eq!(words.len(), FIELDS.len());
            }
            other => panic!("unexpected config completion {other:?}"),
        }
    }

    #[test]
    fn field_errors_convert() {
        assert_eq!(
            DispatchError::from(FieldError::Unsupported("ConnectTimeoutSecs".to_string()))
                .to_string(),
            "unsupported field type for `ConnectTimeoutSecs`"
        );
    }
}
