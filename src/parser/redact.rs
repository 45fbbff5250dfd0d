use regex::{Captures, Regex};
use std::borrow::Cow;

pub const REDACTION_MARKER: &str = "<REDACTED>";

/// Keys whose values never leave the parser in clear text.
const SENSITIVE_KEYS: &[&str] = &["password", "pwd", r"user\s*id", "uid"];

/// Replaces the value half of sensitive `key=value` pairs.
///
/// A key only counts at a word boundary, so `TESTPassword=x` is left alone.
/// A quoted value ends at its closing quote. Otherwise, when a `;` follows on
/// the same line the value is everything up to it (connection strings allow
/// spaces in values); with no `;` ahead it stops at the first whitespace.
#[derive(Debug, Clone)]
pub struct Redactor {
    pattern: Regex,
}

impl Redactor {
    pub fn new() -> Self {
        Self::with_keys(SENSITIVE_KEYS.iter().copied())
            .expect("built-in redaction keys are valid regex")
    }

    /// Builds a redactor for the given key patterns (regex syntax, matched
    /// case-insensitively).
    pub fn with_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Result<Self, regex::Error> {
        let alternation = keys.into_iter().collect::<Vec<_>>().join("|");
        let pattern = Regex::new(&format!(
            r#"(?i)(?P<key>\b(?:{})[ \t]*=[ \t]*)(?:"[^"\r\n]*"|'[^'\r\n]*'|[^;\r\n]*[^;\s](?P<end>[ \t]*;)|[^;\s]+)"#,
            alternation
        ))?;
        Ok(Self { pattern })
    }

    pub fn redact<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.pattern.replace_all(text, |caps: &Captures| {
            let end = caps.name("end").map_or("", |m| m.as_str());
            format!("{}{}{}", &caps["key"], REDACTION_MARKER, end)
        })
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}
