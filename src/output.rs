//! Output rendering abstraction for octool.
//!
//! Command handlers and the chat path return an [`Output`]: a list of typed
//! lines with no terminal escapes. A [`Renderer`] decides how they look;
//! [`StdoutRenderer`] colors them and applies markdown-lite to replies.

use colored::Colorize;
use std::io::{self, Write};

use crate::format;

/// One line (or block) of user-facing output.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Plain(String),
    Heading(String),
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
    /// An assistant reply. A `streamed` reply was already shown through a
    /// [`StreamSink`] and is not printed again.
    Reply {
        speaker: String,
        text: String,
        markdown: bool,
        streamed: bool,
    },
}

impl Line {
    /// The text carried by the line, without styling.
    pub fn text(&self) -> &str {
        match self {
            Line::Plain(s)
            | Line::Heading(s)
            | Line::Info(s)
            | Line::Success(s)
            | Line::Warning(s)
            | Line::Error(s) => s,
            Line::Reply { text, .. } => text,
        }
    }
}

/// Everything produced by handling one input line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output {
    /// Clear the terminal before printing.
    pub clear_screen: bool,
    pub lines: Vec<Line>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: Line) -> &mut Self {
        self.lines.push(line);
        self
    }

    pub fn plain(&mut self, s: impl Into<String>) -> &mut Self {
        self.push(Line::Plain(s.into()))
    }

    pub fn heading(&mut self, s: impl Into<String>) -> &mut Self {
        self.push(Line::Heading(s.into()))
    }

    pub fn info(&mut self, s: impl Into<String>) -> &mut Self {
        self.push(Line::Info(s.into()))
    }

    pub fn success(&mut self, s: impl Into<String>) -> &mut Self {
        self.push(Line::Success(s.into()))
    }

    pub fn warning(&mut self, s: impl Into<String>) -> &mut Self {
        self.push(Line::Warning(s.into()))
    }

    pub fn error(&mut self, s: impl Into<String>) -> &mut Self {
        self.push(Line::Error(s.into()))
    }

    pub fn extend(&mut self, other: Output) -> &mut Self {
        self.clear_screen |= other.clear_screen;
        self.lines.extend(other.lines);
        self
    }

    /// Whether any line is an error.
    pub fn has_error(&self) -> bool {
        self.lines.iter().any(|l| matches!(l, Line::Error(_)))
    }

    /// Plain concatenation of every line, one per row.
    pub fn to_plain_text(&self) -> String {
        self.lines
            .iter()
            .map(Line::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Trait for presenting [`Output`].
pub trait Renderer {
    fn render(&mut self, output: &Output);
}

/// Receives a reply piece by piece while the provider streams it.
pub trait StreamSink: Send {
    /// Called before the first chunk.
    fn begin(&mut self, speaker: &str);
    fn chunk(&mut self, text: &str);
    /// Called after the last chunk, whether or not the stream completed.
    fn end(&mut self);
}

/// Renders output to the terminal with colors.
///
/// Errors and warnings go to stderr so piping a one-shot reply captures only
/// the reply text.
#[derive(Debug, Default)]
pub struct StdoutRenderer;

impl StdoutRenderer {
    pub fn new() -> Self {
        Self
    }

    fn style(line: &Line) -> String {
        match line {
            Line::Plain(s) => s.clone(),
            Line::Heading(s) => s.bold().to_string(),
            Line::Info(s) => s.dimmed().to_string(),
            Line::Success(s) => format!("{} {}", "✓".green().bold(), s),
            Line::Warning(s) => format!("{} {}", "warning:".yellow().bold(), s),
            Line::Error(s) => format!("{} {}", "error:".red().bold(), s),
            Line::Reply {
                speaker,
                text,
                markdown,
                ..
            } => {
                let body = if *markdown {
                    format::render_markdown_lite(text)
                } else {
                    text.clone()
                };
                format!("{}\n{}\n", format!("{speaker}:").cyan().bold(), body)
            }
        }
    }
}

impl Renderer for StdoutRenderer {
    fn render(&mut self, output: &Output) {
        if output.clear_screen {
            print!("\x1b[2J\x1b[H");
        }
        for line in &output.lines {
            match line {
                Line::Reply { streamed: true, .. } => {}
                Line::Warning(_) | Line::Error(_) => eprintln!("{}", Self::style(line)),
                _ => println!("{}", Self::style(line)),
            }
        }
        io::stdout().flush().ok();
    }
}

impl StreamSink for StdoutRenderer {
    fn begin(&mut self, speaker: &str) {
        println!("{}", format!("{speaker}:").cyan().bold());
    }

    fn chunk(&mut self, text: &str) {
        print!("{text}");
        io::stdout().flush().ok();
    }

    fn end(&mut self) {
        println!();
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_plain_text() {
        let mut out = Output::new();
        out.heading("Configs").info("none yet").error("boom");
        assert!(out.has_error());
        assert_eq!(out.to_plain_text(), "Configs\nnone yet\nboom");
    }

    #[test]
    fn test_extend_keeps_clear_flag() {
        let mut a = Output::new();
        a.plain("a");
        let mut b = Output::new();
        b.clear_screen = true;
        b.plain("b");
        a.extend(b);
        assert!(a.clear_screen);
        assert_eq!(a.lines.len(), 2);
    }

    #[test]
    fn test_reply_style_applies_markdown() {
        colored::control::set_override(false);
        let line = Line::Reply {
            speaker: "AI".into(),
            text: "**hi**".into(),
            markdown: true,
            streamed: false,
        };
        assert_eq!(StdoutRenderer::style(&line), "AI:\nhi\n");
        let line = Line::Reply {
            speaker: "AI".into(),
            text: "**hi**".into(),
            markdown: false,
            streamed: false,
        };
        assert_eq!(StdoutRenderer::style(&line), "AI:\n**hi**\n");
    }
}
