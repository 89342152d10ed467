use super::config::DEFAULT_REPAIR_CLAUSE;
use super::token;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

static THINK_BLOCK: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"<think>.*?(</think>|$)")
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("valid think-block regex")
});

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t\r]*\n\s*").expect("valid paragraph regex"));

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const QUOTE_PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('“', '”'), ('‘', '’'), ('`', '`')];

/// Turns raw model output into a message that carries every required
/// placeholder exactly once. Never fails.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    repair_clause: String,
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::new(DEFAULT_REPAIR_CLAUSE)
    }
}

impl ResponseValidator {
    /// `repair_clause` must contain `{placeholders}`; it is replaced by the missing tokens.
    pub fn new(repair_clause: impl Into<String>) -> Self {
        Self {
            repair_clause: repair_clause.into(),
        }
    }

    pub fn validate(&self, raw_text: &str, required: &[String]) -> String {
        let cleaned = strip_noise(raw_text);
        let (text, missing) = enforce_single_occurrence(&cleaned, required);
        let mut text = normalize_whitespace(&text);

        if !missing.is_empty() {
            log::warn!(
                "Model output missing placeholders {:?}, appending repair clause",
                missing
            );
            text = self.append_clause(text, &missing);
        }

        text
    }

    fn append_clause(&self, mut text: String, missing: &[String]) -> String {
        let clause = self
            .repair_clause
            .replace("{placeholders}", &render_token_list(missing));

        if text.is_empty() {
            return clause;
        }

        if !text.ends_with(['.', '!', '?']) {
            text.push('.');
        }
        text.push(' ');
        text.push_str(&clause);
        text
    }
}

/// `{a}`, `{a} and {b}`, `{a}, {b} and {c}`
fn render_token_list(names: &[String]) -> String {
    let tokens: Vec<String> = names.iter().map(|n| token(n)).collect();
    match tokens.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}

/// True when nothing usable is left once reasoning blocks, fences and quotes are gone
pub fn is_blank_completion(raw: &str) -> bool {
    strip_noise(raw).is_empty()
}

/// Drop reasoning blocks, markdown fences and wrapping quotes.
fn strip_noise(raw: &str) -> String {
    let mut text = THINK_BLOCK.replace_all(raw, "").trim().to_string();

    loop {
        let before = text.len();
        text = strip_fence(&text);
        text = strip_quotes(&text);
        if text.len() == before {
            return text;
        }
    }
}

fn strip_fence(text: &str) -> String {
    let mut text = text.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Opening fence may carry a language tag on its own line
        text = match rest.split_once('\n') {
            Some((tag, body)) if !tag.trim().contains(' ') => body,
            _ => rest,
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim().to_string()
}

fn strip_quotes(text: &str) -> String {
    let text = text.trim();
    for (open, close) in QUOTE_PAIRS {
        if let Some(inner) = text.strip_prefix(*open).and_then(|t| t.strip_suffix(*close)) {
            return inner.trim().to_string();
        }
    }
    text.to_string()
}

/// Canonicalise each required placeholder (case-insensitive, inner spaces allowed),
/// keep its first occurrence, remove the rest along with the whitespace before them.
/// Returns the text and the names never seen.
fn enforce_single_occurrence(text: &str, required: &[String]) -> (String, Vec<String>) {
    let mut text = text.to_string();
    let mut missing = Vec::new();

    for name in required {
        let pattern = format!(r"(\s*)\{{\s*{}\s*\}}", regex::escape(name));
        let matcher = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(matcher) => matcher,
            Err(e) => {
                log::warn!("Skipping placeholder check for {:?}: {}", name, e);
                continue;
            }
        };

        let canonical = token(name);
        let mut seen = false;
        text = matcher
            .replace_all(&text, |caps: &regex::Captures| {
                if seen {
                    String::new()
                } else {
                    seen = true;
                    format!("{}{}", &caps[1], canonical)
                }
            })
            .into_owned();

        if !seen {
            missing.push(name.clone());
        }
    }

    (text, missing)
}

/// Collapse whitespace inside paragraphs, keep single blank lines between them.
fn normalize_whitespace(text: &str) -> String {
    PARAGRAPH_BREAK
        .split(text.trim())
        .map(|paragraph| WHITESPACE_RUN.replace_all(paragraph.trim(), " ").into_owned())
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
