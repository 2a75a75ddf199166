use colored::Colorize;

use crate::message::{Role, Turn};

/// Format a history turn for terminal display with a speaker label.
///
/// `ai_name` labels assistant turns; `you` and `summary` are the localized
/// labels for the other two roles.
pub fn format_turn(turn: &Turn, you: &str, ai_name: &str, summary: &str, markdown: bool) -> String {
    let time = turn.timestamp.with_timezone(&chrono::Local).format("%H:%M");
    let label = match turn.role {
        Role::User => format!("{}:", you).green().bold(),
        Role::Assistant => format!("{}:", ai_name).cyan().bold(),
        Role::Summary => format!("{}:", summary).yellow(),
    };
    let body = match turn.role {
        Role::User => turn.content.clone(),
        Role::Assistant if markdown => render_markdown_lite(&turn.content),
        Role::Assistant => turn.content.clone(),
        Role::Summary => turn.content.dimmed().to_string(),
    };
    format!("{} {}\n{}", label, time.to_string().dimmed(), body)
}

/// Minimal markdown renderer for terminal output.
/// Not a full parser. Handles the three most common patterns
/// in LLM output: bold, inline code, and fenced code blocks.
pub fn render_markdown_lite(text: &str) -> String {
    let mut output = String::new();
    let mut in_code_block = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            if in_code_block {
                in_code_block = false;
                output.push('\n');
            } else {
                in_code_block = true;
                let lang = line.trim_start().trim_start_matches('`');
                if !lang.is_empty() {
                    output.push_str(&format!("  {}\n", lang.dimmed()));
                }
            }
            continue;
        }

        if in_code_block {
            output.push_str(&format!("  {}\n", line.dimmed()));
            continue;
        }

        if let Some(heading) = line.strip_prefix("# ").or_else(|| line.strip_prefix("## ")) {
            output.push_str(&heading.bold().underline().to_string());
        } else {
            output.push_str(&render_inline(line));
        }
        output.push('\n');
    }

    if output.ends_with('\n') {
        output.pop();
    }
    output
}

/// Handle **bold** and `inline code` within a single line.
fn render_inline(line: &str) -> String {
    let mut result = String::new();
    let chars: Vec<char> = line.chars().collect();
    let len = chars.len();
    let mut i = 0;

    while i < len {
        if i + 1 < len && chars[i] == '*' && chars[i + 1] == '*' {
            if let Some(end) = find_closing(&chars, i + 2, &['*', '*']) {
                let bold_text: String = chars[i + 2..end].iter().collect();
                result.push_str(&bold_text.bold().to_string());
                i = end + 2;
                continue;
            }
        }

        if chars[i] == '`' {
            if let Some(end) = find_closing(&chars, i + 1, &['`']) {
                let code_text: String = chars[i + 1..end].iter().collect();
                result.push_str(&code_text.cyan().to_string());
                i = end + 1;
                continue;
            }
        }

        result.push(chars[i]);
        i += 1;
    }

    result
}

fn find_closing(chars: &[char], start: usize, pat: &[char]) -> Option<usize> {
    if chars.len() < pat.len() {
        return None;
    }
    (start..=chars.len() - pat.len()).find(|&i| chars[i..i + pat.len()] == *pat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_markdown_lite_strips_markers() {
        plain();
        assert_eq!(render_markdown_lite("a **bold** and `code`"), "a bold and code");
        assert_eq!(render_markdown_lite("```rust\nfn x() {}\n```\ndone"), "  rust\n  fn x() {}\n\ndone");
        assert_eq!(render_markdown_lite("# Title"), "Title");
    }

    #[test]
    fn test_unclosed_markers_are_kept() {
        plain();
        assert_eq!(render_markdown_lite("2 ** 3 and `tick"), "2 ** 3 and `tick");
        assert_eq!(render_markdown_lite("*"), "*");
    }

    #[test]
    fn test_format_turn_labels() {
        plain();
        let turn = Turn::assistant("**hi**");
        let out = format_turn(&turn, "You", "Bot", "Summary", true);
        assert!(out.starts_with("Bot: "));
        assert!(out.ends_with("\nhi"));
        let raw = format_turn(&turn, "You", "Bot", "Summary", false);
        assert!(raw.ends_with("\n**hi**"));
    }
}
