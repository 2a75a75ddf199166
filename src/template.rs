//! Template variable resolution for prompts and welcome text.
//!
//! Replaces `{{name}}` tokens (whitespace inside the braces is allowed,
//! names are case-insensitive) with values derived from the wall clock.
//! Unknown tokens are left untouched so user-authored text with literal
//! braces survives.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Local};
use regex::{Captures, Regex};

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(\w+)\s*\}\}").unwrap_or_else(|e| panic!("invalid token pattern: {e}"))
});

/// Tokens that mark a prompt as already carrying time information.
const TIME_TOKENS: &[&str] = &[
    "time",
    "date",
    "datetime",
    "timestamp",
    "weekday",
    "year",
    "month",
    "day",
];

type ValueFn = Box<dyn Fn(&DateTime<Local>) -> String + Send + Sync>;

/// Registry of template variables.
///
/// The clock is sampled once per [`TemplateResolver::resolve`] call and every
/// token in that pass sees the same instant.
pub struct TemplateResolver {
    variables: HashMap<String, ValueFn>,
}

impl TemplateResolver {
    /// Creates a resolver with the built-in time variables and English weekday names.
    pub fn new() -> Self {
        let mut resolver = Self {
            variables: HashMap::new(),
        };
        resolver.register("time", |now| now.format("%H:%M:%S").to_string());
        resolver.register("date", |now| now.format("%Y-%m-%d").to_string());
        resolver.register("datetime", |now| now.format("%Y-%m-%d %H:%M:%S").to_string());
        resolver.register("timestamp", |now| now.timestamp().to_string());
        resolver.register("year", |now| now.year().to_string());
        resolver.register("month", |now| now.month().to_string());
        resolver.register("day", |now| now.day().to_string());
        resolver.register("weekday", |now| now.format("%A").to_string());
        resolver
    }

    /// Replaces `{{weekday}}` with localized names, Monday first.
    pub fn with_weekday_names(mut self, names: [String; 7]) -> Self {
        self.register("weekday", move |now| {
            names[now.weekday().num_days_from_monday() as usize].clone()
        });
        self
    }

    /// Registers (or replaces) a variable.
    pub fn register<F>(&mut self, name: &str, value: F)
    where
        F: Fn(&DateTime<Local>) -> String + Send + Sync + 'static,
    {
        self.variables.insert(name.to_lowercase(), Box::new(value));
    }

    /// Names of all registered variables, sorted.
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.variables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolves every recognized token against the current local time.
    pub fn resolve(&self, text: &str) -> String {
        self.resolve_at(text, &Local::now())
    }

    /// Resolves every recognized token against a fixed instant.
    pub fn resolve_at(&self, text: &str, now: &DateTime<Local>) -> String {
        if !text.contains("{{") {
            return text.to_string();
        }
        TOKEN_PATTERN
            .replace_all(text, |caps: &Captures| {
                let name = caps[1].to_lowercase();
                match self.variables.get(&name) {
                    Some(value) => value(now),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends a `{{datetime}}` line to a system prompt that has no time token.
///
/// `label` is the localized text placed before the token (e.g. "Current time:").
pub fn ensure_datetime(prompt: &str, label: &str) -> String {
    let has_time = TOKEN_PATTERN
        .captures_iter(prompt)
        .any(|caps| TIME_TOKENS.contains(&caps[1].to_lowercase().as_str()));
    if has_time {
        prompt.to_string()
    } else if prompt.trim().is_empty() {
        format!("{} {{{{datetime}}}}", label)
    } else {
        format!("{}\n\n{} {{{{datetime}}}}", prompt, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_resolves_builtin_tokens() {
        let resolver = TemplateResolver::new();
        let out = resolver.resolve_at("{{date}} {{time}} / {{ year }}-{{MONTH}}-{{day}}", &fixed());
        assert_eq!(out, "2024-03-09 14:05:07 / 2024-3-9");
    }

    #[test]
    fn test_datetime_and_weekday() {
        let resolver = TemplateResolver::new();
        assert_eq!(
            resolver.resolve_at("{{datetime}}", &fixed()),
            "2024-03-09 14:05:07"
        );
        assert_eq!(resolver.resolve_at("{{weekday}}", &fixed()), "Saturday");
    }

    #[test]
    fn test_unknown_tokens_left_untouched() {
        let resolver = TemplateResolver::new();
        let text = "keep {{unknown}} and {single} and {{ }}";
        assert_eq!(resolver.resolve_at(text, &fixed()), text);
    }

    #[test]
    fn test_same_instant_is_idempotent() {
        let resolver = TemplateResolver::new();
        let now = fixed();
        let first = resolver.resolve_at("{{date}} {{time}}", &now);
        let second = resolver.resolve_at("{{date}} {{time}}", &now);
        assert_eq!(first, second);
    }

    #[test]
    fn test_localized_weekdays_and_custom_variables() {
        let names = ["一", "二", "三", "四", "五", "六", "日"].map(|d| format!("星期{d}"));
        let mut resolver = TemplateResolver::new().with_weekday_names(names);
        resolver.register("Project", |_| "octool".to_string());

        let out = resolver.resolve_at("{{weekday}} {{project}}", &fixed());
        assert_eq!(out, "星期六 octool");
        assert!(resolver.variables().contains(&"project"));
    }

    #[test]
    fn test_ensure_datetime_appends_only_when_missing() {
        assert_eq!(
            ensure_datetime("Be brief.", "Current time:"),
            "Be brief.\n\nCurrent time: {{datetime}}"
        );
        assert_eq!(ensure_datetime("Today is {{ date }}", "Current time:"), "Today is {{ date }}");
        assert_eq!(ensure_datetime("", "Now:"), "Now: {{datetime}}");
        // Unrelated tokens do not count as time information.
        assert!(ensure_datetime("{{project}}", "Now:").ends_with("{{datetime}}"));
    }
}
