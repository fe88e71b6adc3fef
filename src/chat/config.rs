//! Configuration for the chat application.
//!
//! Command-line arguments are parsed with `arrrg`.  Session settings live in a TOML file with
//! PascalCase keys that is loaded once at startup and rewritten whenever `config <field> <value>`
//! changes a field.  The `config` command reaches fields through [`FIELDS`], a static table of
//! typed getters and setters.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use arrrg_derive::CommandLine;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::client::DEFAULT_API_URL;
use crate::markdown::Theme;
use crate::{Error, Result};

/// Model used when the configuration does not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// System prompt used when the configuration does not name one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a terminal-based chat assistant. Give relatively short answers, while being as accurate as possible.";

/// Where `save` and `load` go when no path is given.
pub const DEFAULT_HISTORY_PATH: &str = "history.json";

const DEFAULT_THEME: &str = "dark";
const DEFAULT_COMMAND_PREFIX: &str = "/";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Command-line arguments for the parley binary.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Path of the configuration file.
    #[arrrg(optional, "Configuration file (default: <config dir>/parley/config.toml)", "PATH")]
    pub config: Option<String>,

    /// Path of the environment file holding the API key.
    #[arrrg(optional, "Environment file to load (default: .env)", "PATH")]
    pub env_file: Option<String>,

    /// Model override for this run only.
    #[arrrg(optional, "Model to use for this run (not saved)", "MODEL")]
    pub model: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Write a default configuration file and exit.
    #[arrrg(flag, "Write the default configuration file and exit")]
    pub init_config: bool,
}

impl ChatArgs {
    pub fn env_file(&self) -> PathBuf {
        PathBuf::from(self.env_file.as_deref().unwrap_or(".env"))
    }

    /// The configuration file named on the command line, or the platform default.
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(PathBuf::from(path)),
            None => ChatConfig::default_path(),
        }
    }
}

/// Persistent settings for a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ChatConfig {
    /// Model identifier sent with every request.
    pub model: String,
    /// Whether responses are re-rendered as markdown below the streamed text.
    pub render_markdown: bool,
    /// Markdown theme name.
    pub theme: String,
    /// Default system prompt; captured once when a session starts.
    pub system_prompt: String,
    /// Single character that starts a REPL command.
    pub command_prefix: String,
    /// Transcript file used by `save` and `load` without a path.
    pub default_history_path: String,
    /// Base URL of the chat completions API.
    pub base_url: String,
    /// Deadline for establishing a connection to the API.
    pub connect_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            render_markdown: false,
            theme: DEFAULT_THEME.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            command_prefix: DEFAULT_COMMAND_PREFIX.to_string(),
            default_history_path: DEFAULT_HISTORY_PATH.to_string(),
            base_url: DEFAULT_API_URL.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ChatConfig {
    /// `<platform config dir>/parley/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "parley")
            .ok_or_else(|| Error::config("could not determine the configuration directory"))?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load and validate the configuration at `path`.
    ///
    /// A missing file is an error: there is no implicit default session.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::io(
                format!("failed to read config `{}`", path.display()),
                e,
            )
        })?;
        let config: ChatConfig = toml::from_str(&contents).map_err(|e| {
            Error::config(format!("failed to parse config `{}`: {e}", path.display()))
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), model = %config.model, "loaded config");
        Ok(config)
    }

    /// Atomically write the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir)
                .map_err(|e| Error::io(format!("failed to create `{}`", dir.display()), e))?;
        }

        let contents = toml::to_string_pretty(self)?;
        let write_error = |e: std::io::Error| {
            Error::io(format!("failed to write config `{}`", path.display()), e)
        };
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new_in("."),
        }
        .map_err(write_error)?;
        temp_file.write_all(contents.as_bytes()).map_err(write_error)?;
        temp_file.as_file_mut().sync_all().map_err(write_error)?;
        temp_file.persist(path).map_err(|e| write_error(e.error))?;
        tracing::info!(path = %path.display(), "saved config");
        Ok(())
    }

    /// Check the invariants a loaded file must satisfy.
    pub fn validate(&self) -> Result<()> {
        check_command_prefix(&self.command_prefix).map_err(|reason| {
            Error::config(format!("invalid CommandPrefix: {reason}"))
        })?;
        check_theme(&self.theme)
            .map_err(|reason| Error::config(format!("invalid Theme: {reason}")))?;
        Ok(())
    }

    /// The command prefix as a character.
    pub fn prefix_char(&self) -> char {
        self.command_prefix
            .chars()
            .next()
            .unwrap_or('/')
    }

    /// Assign `value` to the field called `name` (case-insensitive).
    ///
    /// Returns the canonical field name on success; on failure nothing is changed.
    pub fn set_field(
        &mut self,
        name: &str,
        value: &str,
    ) -> std::result::Result<&'static str, FieldError> {
        let field = find_field(name).ok_or_else(|| FieldError::Unknown(name.to_string()))?;
        match field.access {
            FieldAccess::Bool { set, .. } => set(self, parse_bool(value)),
            FieldAccess::Text { set, .. } => {
                set(self, value).map_err(|reason| FieldError::Invalid {
                    field: field.name.to_string(),
                    reason,
                })?
            }
            FieldAccess::Integer { .. } => {
                return Err(FieldError::Unsupported(field.name.to_string()));
            }
        }
        Ok(field.name)
    }

    /// Every field with its current value, in table order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        FIELDS
            .iter()
            .map(|field| (field.name, field.value(self)))
            .collect()
    }
}

impl fmt::Display for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries();
        let width = entries.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        for (index, (name, value)) in entries.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{name:<width$}  {value}")?;
        }
        Ok(())
    }
}

/// Why `config <field> <value>` was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Unknown(String),
    Unsupported(String),
    Invalid { field: String, reason: String },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Unknown(name) => write!(f, "unknown config field `{name}`"),
            FieldError::Unsupported(name) => {
                write!(f, "unsupported field type for `{name}`")
            }
            FieldError::Invalid { field, reason } => {
                write!(f, "invalid value for `{field}`: {reason}")
            }
        }
    }
}

impl std::error::Error for FieldError {}

/// Typed accessors for one configuration field.
#[derive(Clone, Copy)]
pub enum FieldAccess {
    Bool {
        get: fn(&ChatConfig) -> bool,
        set: fn(&mut ChatConfig, bool),
    },
    Text {
        get: fn(&ChatConfig) -> String,
        set: fn(&mut ChatConfig, &str) -> std::result::Result<(), String>,
    },
    /// Readable but not settable from the REPL.
    Integer { get: fn(&ChatConfig) -> u64 },
}

/// One row of the configuration field table.
#[derive(Clone, Copy)]
pub struct ConfigField {
    pub name: &'static str,
    pub access: FieldAccess,
}

impl ConfigField {
    pub fn value(&self, config: &ChatConfig) -> String {
        match self.access {
            FieldAccess::Bool { get, .. } => get(config).to_string(),
            FieldAccess::Text { get, .. } => format!("{:?}", get(config)),
            FieldAccess::Integer { get } => get(config).to_string(),
        }
    }
}

/// The fields reachable through `config`.
pub static FIELDS: &[ConfigField] = &[
    ConfigField {
        name: "Model",
        access: FieldAccess::Text {
            get: |c| c.model.clone(),
            set: |c, v| {
                non_empty(v)?;
                c.model = v.to_string();
                Ok(())
            },
        },
    },
    ConfigField {
        name: "RenderMarkdown",
        access: FieldAccess::Bool {
            get: |c| c.render_markdown,
            set: |c, v| c.render_markdown = v,
        },
    },
    ConfigField {
        name: "Theme",
        access: FieldAccess::Text {
            get: |c| c.theme.clone(),
            set: |c, v| {
                c.theme = check_theme(v)?.to_string();
                Ok(())
            },
        },
    },
    ConfigField {
        name: "SystemPrompt",
        access: FieldAccess::Text {
            get: |c| c.system_prompt.clone(),
            set: |c, v| {
                c.system_prompt = v.to_string();
                Ok(())
            },
        },
    },
    ConfigField {
        name: "CommandPrefix",
        access: FieldAccess::Text {
            get: |c| c.command_prefix.clone(),
            set: |c, v| {
                check_command_prefix(v)?;
                c.command_prefix = v.to_string();
                Ok(())
            },
        },
    },
    ConfigField {
        name: "DefaultHistoryPath",
        access: FieldAccess::Text {
            get: |c| c.default_history_path.clone(),
            set: |c, v| {
                non_empty(v)?;
                c.default_history_path = v.to_string();
                Ok(())
            },
        },
    },
    ConfigField {
        name: "BaseUrl",
        access: FieldAccess::Text {
            get: |c| c.base_url.clone(),
            set: |c, v| {
                non_empty(v)?;
                c.base_url = v.to_string();
                Ok(())
            },
        },
    },
    ConfigField {
        name: "ConnectTimeoutSecs",
        access: FieldAccess::Integer {
            get: |c| c.connect_timeout_secs,
        },
    },
];

/// Find a field by name, ignoring case.
pub fn find_field(name: &str) -> Option<&'static ConfigField> {
    FIELDS
        .iter()
        .find(|field| field.name.eq_ignore_ascii_case(name))
}

/// `true` and `1` (any case) are true; everything else is false.
pub fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

fn non_empty(value: &str) -> std::result::Result<(), String> {
    if value.trim().is_empty() {
        Err("value cannot be empty".to_string())
    } else {
        Ok(())
    }
}

fn check_command_prefix(value: &str) -> std::result::Result<(), String> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_whitespace() => Ok(()),
        _ => Err(format!(
            "expected exactly one non-whitespace character, got {value:?}"
        )),
    }
}

fn check_theme(value: &str) -> std::result::Result<&'static str, String> {
    Theme::by_name(value).map(|theme| theme.name()).ok_or_else(|| {
        format!(
            "unknown theme {value:?}; expected one of: {}",
            Theme::names().collect::<Vec<_>>().join(", ")
        )
    })
}
