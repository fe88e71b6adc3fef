//! Markdown to terminal text.
//!
//! Responses are re-rendered through [`render`] when markdown rendering is switched on.  The
//! renderer walks `pulldown-cmark` events and writes ANSI-styled text according to a [`Theme`].
//! The `notty` and `ascii` themes never emit escape sequences; `ascii` also restricts all
//! decorations (bullets, rules, table borders) to ASCII.

use pulldown_cmark::{Alignment, CodeBlockKind, Event, LinkType, Options, Parser, Tag, TagEnd};
use unicode_width::UnicodeWidthStr;

use crate::{Error, Result};

const RESET: &str = "\x1b[0m";
const RULE_WIDTH: usize = 40;

/// ANSI sequences for each styled element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Palette {
    heading: &'static str,
    emphasis: &'static str,
    strong: &'static str,
    strikethrough: &'static str,
    code: &'static str,
    quote: &'static str,
    link: &'static str,
    chrome: &'static str,
}

/// A named rendering theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    name: &'static str,
    palette: Option<Palette>,
    ascii: bool,
}

const THEMES: &[Theme] = &[
    Theme {
        name: "dark",
        palette: Some(Palette {
            heading: "\x1b[1;36m",
            emphasis: "\x1b[3m",
            strong: "\x1b[1m",
            strikethrough: "\x1b[9m",
            code: "\x1b[33m",
            quote: "\x1b[90m",
            link: "\x1b[4;34m",
            chrome: "\x1b[90m",
        }),
        ascii: false,
    },
    Theme {
        name: "light",
        palette: Some(Palette {
            heading: "\x1b[1;34m",
            emphasis: "\x1b[3m",
            strong: "\x1b[1m",
            strikethrough: "\x1b[9m",
            code: "\x1b[35m",
            quote: "\x1b[2m",
            link: "\x1b[4;36m",
            chrome: "\x1b[2m",
        }),
        ascii: false,
    },
    Theme {
        name: "dracula",
        palette: Some(Palette {
            heading: "\x1b[1;38;5;141m",
            emphasis: "\x1b[3;38;5;228m",
            strong: "\x1b[1;38;5;215m",
            strikethrough: "\x1b[9m",
            code: "\x1b[38;5;84m",
            quote: "\x1b[38;5;61m",
            link: "\x1b[4;38;5;117m",
            chrome: "\x1b[38;5;61m",
        }),
        ascii: false,
    },
    Theme {
        name: "pink",
        palette: Some(Palette {
            heading: "\x1b[1;38;5;205m",
            emphasis: "\x1b[3;38;5;218m",
            strong: "\x1b[1;38;5;212m",
            strikethrough: "\x1b[9m",
            code: "\x1b[38;5;218m",
            quote: "\x1b[38;5;175m",
            link: "\x1b[4;38;5;211m",
            chrome: "\x1b[38;5;175m",
        }),
        ascii: false,
    },
    Theme {
        name: "notty",
        palette: None,
        ascii: false,
    },
    Theme {
        name: "ascii",
        palette: None,
        ascii: true,
    },
];

impl Theme {
    /// Look a theme up by name, ignoring case.
    pub fn by_name(name: &str) -> Option<Theme> {
        THEMES
            .iter()
            .find(|theme| theme.name.eq_ignore_ascii_case(name.trim()))
            .copied()
    }

    /// Names of every known theme.
    pub fn names() -> impl Iterator<Item = &'static str> {
        THEMES.iter().map(|theme| theme.name)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True when this theme writes ANSI escape sequences.
    pub fn is_styled(&self) -> bool {
        self.palette.is_some()
    }

    fn bullet(&self) -> &'static str {
        if self.ascii { "-" } else { "•" }
    }

    fn rule(&self) -> &'static str {
        if self.ascii { "-" } else { "─" }
    }

    fn quote_bar(&self) -> &'static str {
        if self.ascii { "> " } else { "│ " }
    }
}

/// Render `text` with the theme called `theme_name`.
///
/// Fails only when the theme is unknown.
pub fn render(text: &str, theme_name: &str) -> Result<String> {
    let theme = Theme::by_name(theme_name).ok_or_else(|| {
        Error::config(format!(
            "unknown theme `{theme_name}`; expected one of: {}",
            Theme::names().collect::<Vec<_>>().join(", ")
        ))
    })?;
    Ok(render_with_theme(text, &theme))
}

/// Render `text` with an already resolved theme.
pub fn render_with_theme(text: &str, theme: &Theme) -> String {
    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut writer = Writer::new(theme);
    for event in Parser::new_ext(text, options) {
        writer.process(event);
    }
    writer.finish()
}

#[derive(Default)]
struct TableBuffer {
    alignments: Vec<Alignment>,
    head: Vec<String>,
    rows: Vec<Vec<String>>,
    cell: String,
    in_head: bool,
}

struct Writer<'a> {
    theme: &'a Theme,
    out: String,
    styles: Vec<&'static str>,
    lists: Vec<Option<u64>>,
    links: Vec<Option<String>>,
    quote_depth: usize,
    in_code_block: bool,
    line_start: bool,
    table: Option<TableBuffer>,
}

impl<'a> Writer<'a> {
    fn new(theme: &'a Theme) -> Self {
        Self {
            theme,
            out: String::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            links: Vec::new(),
            quote_depth: 0,
            in_code_block: false,
            line_start: true,
            table: None,
        }
    }

    fn finish(self) -> String {
        let trimmed = self.out.trim_end_matches('\n');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}\n")
        }
    }

    /// Open a style, or write `plain` when the theme has no colors.
    fn open(&mut self, pick: fn(&Palette) -> &'static str, plain: &str) {
        if self.table.is_some() {
            return;
        }
        match self.theme.palette {
            Some(palette) => {
                let code = pick(&palette);
                self.styles.push(code);
                self.out.push_str(code);
            }
            None => self.write_raw(plain),
        }
    }

    fn close(&mut self, plain: &str) {
        if self.table.is_some() {
            return;
        }
        match self.theme.palette {
            Some(_) => {
                self.styles.pop();
                self.out.push_str(RESET);
                for code in &self.styles {
                    self.out.push_str(code);
                }
            }
            None => self.write_raw(plain),
        }
    }

    fn prefix(&self, list_levels: usize) -> String {
        let mut prefix = self.theme.quote_bar().repeat(self.quote_depth);
        prefix.push_str(&"  ".repeat(list_levels));
        if self.in_code_block {
            prefix.push_str("    ");
        }
        prefix
    }

    /// Write text that contains no newline.
    fn write_raw(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(table) = self.table.as_mut() {
            table.cell.push_str(text);
            return;
        }
        if self.line_start {
            let prefix = self.prefix(self.lists.len());
            self.out.push_str(&prefix);
            self.line_start = false;
        }
        self.out.push_str(text);
    }

    fn write_text(&mut self, text: &str) {
        let mut segments = text.split('\n').peekable();
        while let Some(segment) = segments.next() {
            self.write_raw(segment);
            if segments.peek().is_some() {
                self.newline();
            }
        }
    }

    fn newline(&mut self) {
        if let Some(table) = self.table.as_mut() {
            table.cell.push(' ');
            return;
        }
        self.out.push('\n');
        self.line_start = true;
    }

    fn finish_line(&mut self) {
        if !self.line_start {
            self.newline();
        }
    }

    fn blank_line(&mut self) {
        self.finish_line();
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    fn process(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Paragraph) => {}
            Event::End(TagEnd::Paragraph) => {
                if self.lists.is_empty() {
                    self.blank_line();
                } else {
                    self.finish_line();
                }
            }

            Event::Start(Tag::Heading { level, .. }) => {
                self.blank_line();
                let hashes = format!("{} ", "#".repeat(level as usize));
                self.open(|p| p.heading, &hashes);
            }
            Event::End(TagEnd::Heading(_)) => {
                self.close("");
                self.blank_line();
            }

            Event::Start(Tag::BlockQuote(_)) => {
                self.finish_line();
                self.quote_depth += 1;
                self.open(|p| p.quote, "");
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                self.close("");
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank_line();
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                self.finish_line();
                if let CodeBlockKind::Fenced(lang) = &kind
                    && !lang.is_empty()
                {
                    let label = format!("[{lang}]");
                    self.open(|p| p.chrome, "");
                    self.write_raw(&label);
                    self.close("");
                    self.newline();
                }
                self.in_code_block = true;
                self.open(|p| p.code, "");
            }
            Event::End(TagEnd::CodeBlock) => {
                self.close("");
                self.in_code_block = false;
                self.blank_line();
            }

            Event::Start(Tag::List(start)) => {
                self.finish_line();
                self.lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            Event::Start(Tag::Item) => {
                self.finish_line();
                let marker = match self.lists.last_mut() {
                    Some(Some(number)) => {
                        let marker = format!("{number}. ");
                        *number += 1;
                        marker
                    }
                    _ => format!("{} ", self.theme.bullet()),
                };
                let prefix = self.prefix(self.lists.len().saturating_sub(1));
                self.out.push_str(&prefix);
                self.out.push_str(&marker);
                self.line_start = false;
            }
            Event::End(TagEnd::Item) => self.finish_line(),
            Event::TaskListMarker(done) => self.write_raw(if done { "[x] " } else { "[ ] " }),

            Event::Start(Tag::Emphasis) => self.open(|p| p.emphasis, "*"),
            Event::End(TagEnd::Emphasis) => self.close("*"),
            Event::Start(Tag::Strong) => self.open(|p| p.strong, "**"),
            Event::End(TagEnd::Strong) => self.close("**"),
            Event::Start(Tag::Strikethrough) => self.open(|p| p.strikethrough, "~~"),
            Event::End(TagEnd::Strikethrough) => self.close("~~"),

            Event::Start(Tag::Link {
                link_type,
                dest_url,
                ..
            }) => {
                let url = match link_type {
                    LinkType::Autolink | LinkType::Email => None,
                    _ if dest_url.is_empty() => None,
                    _ => Some(dest_url.to_string()),
                };
                self.links.push(url);
                self.open(|p| p.link, "");
            }
            Event::End(TagEnd::Link) => {
                self.close("");
                if let Some(Some(url)) = self.links.pop() {
                    self.write_raw(&format!(" ({url})"));
                }
            }
            Event::Start(Tag::Image { dest_url, .. }) => {
                self.links.push(Some(dest_url.to_string()));
                self.write_raw("[image: ");
            }
            Event::End(TagEnd::Image) => {
                self.write_raw("]");
                if let Some(Some(url)) = self.links.pop() {
                    self.write_raw(&format!(" ({url})"));
                }
            }

            Event::Code(code) => {
                self.open(|p| p.code, "`");
                self.write_raw(&code);
                self.close("`");
            }
            Event::Text(text) => self.write_text(&text),
            Event::Html(html) | Event::InlineHtml(html) => self.write_text(&html),
            Event::SoftBreak | Event::HardBreak => self.newline(),
            Event::Rule => {
                self.finish_line();
                let rule = self.theme.rule().repeat(RULE_WIDTH);
                self.open(|p| p.chrome, "");
                self.write_raw(&rule);
                self.close("");
                self.blank_line();
            }

            Event::Start(Tag::Table(alignments)) => {
                self.finish_line();
                self.table = Some(TableBuffer {
                    alignments,
                    ..TableBuffer::default()
                });
            }
            Event::End(TagEnd::Table) => {
                if let Some(table) = self.table.take() {
                    self.flush_table(table);
                }
                self.blank_line();
            }
            Event::Start(Tag::TableHead) => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = true;
                }
            }
            Event::End(TagEnd::TableHead) => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = false;
                }
            }
            Event::Start(Tag::TableRow) => {
                if let Some(table) = self.table.as_mut()
                    && !table.in_head
                {
                    table.rows.push(Vec::new());
                }
            }
            Event::Start(Tag::TableCell) => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.clear();
                }
            }
            Event::End(TagEnd::TableCell) => {
                if let Some(table) = self.table.as_mut() {
                    let cell = std::mem::take(&mut table.cell).trim().to_string();
                    if table.in_head {
                        table.head.push(cell);
                    } else if let Some(row) = table.rows.last_mut() {
                        row.push(cell);
                    }
                }
            }

            _ => {}
        }
    }

    fn flush_table(&mut self, table: TableBuffer) {
        let columns = table
            .head
            .len()
            .max(table.rows.iter().map(Vec::len).max().unwrap_or(0));
        if columns == 0 {
            return;
        }
        let mut widths = vec![0usize; columns];
        for row in std::iter::once(&table.head).chain(table.rows.iter()) {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(UnicodeWidthStr::width(cell.as_str()));
            }
        }

        let (vertical, horizontal, cross) = if self.theme.ascii {
            ("|", "-", "+")
        } else {
            ("│", "─", "┼")
        };
        let separator = widths
            .iter()
            .map(|w| horizontal.repeat(*w))
            .collect::<Vec<_>>()
            .join(&format!("{horizontal}{cross}{horizontal}"));

        let format_row = |cells: &[String]| -> String {
            let line = widths
                .iter()
                .enumerate()
                .map(|(i, width)| {
                    let cell = cells.get(i).map(String::as_str).unwrap_or("");
                    let alignment = table.alignments.get(i).copied().unwrap_or(Alignment::None);
                    pad(cell, *width, alignment)
                })
                .collect::<Vec<_>>()
                .join(&format!(" {vertical} "));
            line.trim_end().to_string()
        };

        if !table.head.is_empty() {
            let head = format_row(&table.head);
            self.open(|p| p.strong, "");
            self.write_raw(&head);
            self.close("");
            self.newline();
            self.open(|p| p.chrome, "");
            self.write_raw(&separator);
            self.close("");
            self.newline();
        }
        for row in &table.rows {
            let line = format_row(row);
            self.write_raw(&line);
            self.newline();
        }
    }
}

fn pad(text: &str, width: usize, alignment: Alignment) -> String {
    let fill = width.saturating_sub(UnicodeWidthStr::width(text));
    match alignment {
        Alignment::Right => format!("{}{text}", " ".repeat(fill)),
        Alignment::Center => {
            let left = fill / 2;
            format!("{}{text}{}", " ".repeat(left), " ".repeat(fill - left))
        }
        Alignment::Left | Alignment::None => format!("{text}{}", " ".repeat(fill)),
    }
}
