//! Tokenizer for command lines.

use crate::constants::COMMAND_PREFIX;
use crate::error::CommandError;

/// A command line split into name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Name without the prefix, e.g. `config`.
    pub name: String,
    pub args: Vec<String>,
}

/// Splits a line into a command.
///
/// Returns `Ok(None)` when the line is not a command (chat input). Words are
/// separated by whitespace; single or double quotes group a segment into one
/// argument, and a backslash escapes the next character inside quotes.
pub fn parse(line: &str) -> Result<Option<ParsedCommand>, CommandError> {
    let line = line.trim();
    let Some(body) = line.strip_prefix(COMMAND_PREFIX) else {
        return Ok(None);
    };

    let mut words = split_words(body)?.into_iter();
    let name = words.next().unwrap_or_default();
    Ok(Some(ParsedCommand {
        name,
        args: words.collect(),
    }))
}

fn split_words(input: &str) -> Result<Vec<String>, CommandError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) if c == '\\' => match chars.next() {
                Some(next) => current.push(next),
                None => return Err(CommandError::UnterminatedQuote),
            },
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(CommandError::UnterminatedQuote);
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        parse(line).unwrap().unwrap().args
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse("hello there").unwrap(), None);
        assert_eq!(parse("what is 4/2?").unwrap(), None);
        assert_eq!(parse("").unwrap(), None);
    }

    #[test]
    fn test_splits_name_and_args() {
        let parsed = parse("  /config   switch  ds ").unwrap().unwrap();
        assert_eq!(parsed.name, "config");
        assert_eq!(parsed.args, vec!["switch", "ds"]);
    }

    #[test]
    fn test_quotes_group_segments() {
        assert_eq!(
            args(r#"/config edit ds system_prompt "You are  helpful""#),
            vec!["edit", "ds", "system_prompt", "You are  helpful"]
        );
        assert_eq!(args("/x 'a b' c"), vec!["a b", "c"]);
        assert_eq!(args(r#"/x "say \"hi\"""#), vec![r#"say "hi""#]);
        assert_eq!(args(r#"/x """#), vec![""]);
        assert_eq!(args(r#"/x pre"fix"ed"#), vec!["prefixed"]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(
            parse(r#"/x "open"#),
            Err(CommandError::UnterminatedQuote)
        );
    }

    #[test]
    fn test_bare_prefix_has_empty_name() {
        let parsed = parse("/").unwrap().unwrap();
        assert_eq!(parsed.name, "");
        assert!(parsed.args.is_empty());
    }
}
