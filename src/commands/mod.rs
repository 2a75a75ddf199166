//! Command language for the chat REPL.
//!
//! A line that starts with `/` is split into a name and arguments
//! (whitespace separated, quotes group) and resolved into a [`Command`].
//! Name lookup is exact; there is no prefix or fuzzy matching.

mod parse;

pub use parse::{parse, ParsedCommand};

use crate::error::CommandError;

/// Every top-level command with the language-pack key of its help line.
pub const COMMANDS: &[(&str, &str)] = &[
    ("/help", "help.help"),
    ("/clear", "help.clear"),
    ("/new", "help.new"),
    ("/config", "help.config"),
    ("/history", "help.history"),
    ("/lang", "help.lang"),
    ("/markdown", "help.markdown"),
    ("/stream", "help.stream"),
    ("/version", "help.version"),
    ("/exit", "help.exit"),
];

/// A resolved command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Clear,
    Exit,
    /// Archive the current history and start over.
    New,
    Version,
    /// `None` toggles.
    Markdown(Option<bool>),
    /// `None` shows the current setting.
    Stream(Option<bool>),
    Config(ConfigCommand),
    History(HistoryCommand),
    Lang(LangCommand),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigCommand {
    List,
    Current,
    Switch(String),
    New(Option<String>),
    Edit {
        id: String,
        field: String,
        value: String,
    },
    Delete {
        id: String,
        replacement: Option<String>,
    },
    Default(String),
    Check(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCommand {
    Stats,
    Show,
    Compress,
    Summary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LangCommand {
    List,
    Switch(String),
}

impl Command {
    /// Maps a parsed line onto a command.
    pub fn resolve(parsed: &ParsedCommand) -> Result<Self, CommandError> {
        let args = parsed.args.as_slice();
        match parsed.name.as_str() {
            "help" => Ok(Command::Help),
            "clear" => Ok(Command::Clear),
            "exit" => Ok(Command::Exit),
            "new" => Ok(Command::New),
            "version" => Ok(Command::Version),
            "markdown" => resolve_switch("/markdown", args).map(Command::Markdown),
            "stream" => resolve_switch("/stream", args).map(Command::Stream),
            "config" => resolve_config(args).map(Command::Config),
            "history" => resolve_history(args).map(Command::History),
            "lang" => resolve_lang(args).map(Command::Lang),
            other => Err(CommandError::UnknownCommand(format!("/{other}"))),
        }
    }
}

/// Optional `on`/`off` argument.
fn resolve_switch(command: &str, args: &[String]) -> Result<Option<bool>, CommandError> {
    match args.first().map(String::as_str) {
        None => Ok(None),
        Some("on") => Ok(Some(true)),
        Some("off") => Ok(Some(false)),
        Some(other) => Err(CommandError::InvalidArgument(format!(
            "{command} expects on or off, got '{other}'"
        ))),
    }
}

fn resolve_config(args: &[String]) -> Result<ConfigCommand, CommandError> {
    let Some(sub) = args.first() else {
        return Ok(ConfigCommand::List);
    };
    let rest = &args[1..];
    match sub.as_str() {
        "list" => Ok(ConfigCommand::List),
        "current" => Ok(ConfigCommand::Current),
        "switch" => Ok(ConfigCommand::Switch(required(rest, 0, "/config switch", "id")?)),
        "new" => Ok(ConfigCommand::New(rest.first().cloned())),
        "edit" => {
            let id = required(rest, 0, "/config edit", "id")?;
            let field = required(rest, 1, "/config edit", "field")?;
            if rest.len() < 3 {
                return Err(missing("/config edit", "value"));
            }
            Ok(ConfigCommand::Edit {
                id,
                field,
                value: rest[2..].join(" "),
            })
        }
        "delete" => Ok(ConfigCommand::Delete {
            id: required(rest, 0, "/config delete", "id")?,
            replacement: rest.get(1).cloned(),
        }),
        "default" => Ok(ConfigCommand::Default(required(rest, 0, "/config default", "id")?)),
        "check" => Ok(ConfigCommand::Check(rest.first().cloned())),
        other => Err(unknown_sub("/config", other)),
    }
}

fn resolve_history(args: &[String]) -> Result<HistoryCommand, CommandError> {
    match args.first().map(String::as_str) {
        None | Some("stats") => Ok(HistoryCommand::Stats),
        Some("show") => Ok(HistoryCommand::Show),
        Some("compress") => Ok(HistoryCommand::Compress),
        Some("summary") => Ok(HistoryCommand::Summary),
        Some(other) => Err(unknown_sub("/history", other)),
    }
}

fn resolve_lang(args: &[String]) -> Result<LangCommand, CommandError> {
    match args.first().map(String::as_str) {
        None | Some("list") => Ok(LangCommand::List),
        Some("switch") => Ok(LangCommand::Switch(required(&args[1..], 0, "/lang switch", "code")?)),
        Some(code) if args.len() == 1 && code.contains('-') => {
            Ok(LangCommand::Switch(code.to_string()))
        }
        Some(other) => Err(unknown_sub("/lang", other)),
    }
}

fn required(args: &[String], index: usize, command: &str, arg: &str) -> Result<String, CommandError> {
    args.get(index).cloned().ok_or_else(|| missing(command, arg))
}

fn missing(command: &str, arg: &str) -> CommandError {
    CommandError::MissingArgument {
        command: command.to_string(),
        arg: arg.to_string(),
    }
}

fn unknown_sub(command: &str, sub: &str) -> CommandError {
    CommandError::UnknownSubcommand {
        command: command.to_string(),
        sub: sub.to_string(),
    }
}
