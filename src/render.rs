//! Output rendering for the REPL.
//!
//! This module provides a trait-based rendering abstraction so the chat engine and command
//! dispatcher never write to the terminal directly.  The default implementation writes to
//! stdout/stderr with optional ANSI styling.

use std::io::{self, Stdout, Write};

/// ANSI escape code for dim text (used for the rendered block frame).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for yellow text (used for the interrupted marker).
const ANSI_YELLOW: &str = "\x1b[33m";

/// Label of the frame around a rendered markdown block.
const RENDERED_LABEL: &str = "rendered";

/// Trait for rendering REPL output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Capturing output in tests
pub trait Renderer: Send {
    /// Print a chunk of response text.
    ///
    /// This is called incrementally as chunks are streamed from the API and must reach the
    /// terminal immediately.
    fn print_text(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print a fully rendered copy of the response below the streamed text.
    fn print_rendered(&mut self, rendered: &str);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self) {}
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    line_start: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            line_start: true,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    /// Starts a fresh line if streamed text left the cursor mid-line.
    fn break_line(&mut self) {
        if !self.line_start {
            println!();
            self.line_start = true;
        }
    }

    fn frame(&self, label: &str) -> String {
        let rule = format!("{:-^40}", format!(" {label} "));
        if self.use_color {
            format!("{ANSI_DIM}{rule}{ANSI_RESET}")
        } else {
            rule
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        print!("{text}");
        self.line_start = text.ends_with('\n');
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.break_line();
        self.flush();
        if self.use_color {
            eprintln!("{ANSI_RED}Error:{ANSI_RESET} {error}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.break_line();
        println!("{info}");
        self.flush();
    }

    fn print_rendered(&mut self, rendered: &str) {
        self.break_line();
        println!("{}", self.frame(RENDERED_LABEL));
        print!("{rendered}");
        if !rendered.ends_with('\n') {
            println!();
        }
        println!("{}", self.frame("end"));
        self.flush();
    }

    fn finish_response(&mut self) {
        println!();
        self.line_start = true;
        self.flush();
    }

    fn print_interrupted(&mut self) {
        self.break_line();
        if self.use_color {
            println!("{ANSI_YELLOW}[interrupted]{ANSI_RESET}");
        } else {
            println!("[interrupted]");
        }
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
        let frame = renderer.frame("rendered");
        assert_eq!(frame.len(), 40);
        assert!(frame.starts_with("---"));
        assert!(frame.contains(" rendered "));
    }
}
