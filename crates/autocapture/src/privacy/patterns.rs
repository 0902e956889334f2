//! Built-in patterns for sensitive text.

use regex::Regex;

use crate::error::{Error, Result};

/// A named, compiled pattern.
#[derive(Debug, Clone)]
pub struct TextPattern {
    /// Identifier reported when the pattern matches.
    pub name: String,
    /// What the pattern is meant to catch.
    pub description: String,
    regex: Regex,
}

impl TextPattern {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if `pattern` is not a valid regex.
    pub fn compile(name: &str, description: &str, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::validation(format!("invalid privacy pattern '{pattern}': {e}")))?;
        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            regex,
        })
    }

    /// Whether the text contains a match.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Replace every match with `placeholder`.
    #[must_use]
    pub fn redact(&self, text: &str, placeholder: &str) -> String {
        self.regex.replace_all(text, placeholder).into_owned()
    }
}

const BUILTIN: &[(&str, &str, &str)] = &[
    (
        "credit_card",
        "Card numbers (Visa, MasterCard, Amex, Discover), optionally space or dash separated",
        r"\b(?:4\d{3}|5[1-5]\d{2}|6(?:011|5\d{2}))(?:[ -]?\d{4}){3}\b|\b3[47]\d{2}[ -]?\d{6}[ -]?\d{5}\b",
    ),
    ("ssn", "US Social Security Numbers", r"\b\d{3}-\d{2}-\d{4}\b"),
    (
        "email",
        "E-mail addresses",
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
    ),
    (
        "bearer_token",
        "Bearer authentication tokens",
        r"(?i)bearer\s+[a-zA-Z0-9_.=-]+",
    ),
    (
        "api_key",
        "API key assignments (api_key=, apikey:, ...)",
        r#"(?i)(api[_-]?key|apikey|api[_-]?secret)\s*[:=]\s*['"]?[a-zA-Z0-9_-]{16,}['"]?"#,
    ),
    (
        "password",
        "Password assignments",
        r#"(?i)(password|passwd|pwd)\s*[:=]\s*['"]?[^\s'"]{4,}['"]?"#,
    ),
];

/// All built-in patterns.
#[must_use]
pub fn builtin_patterns() -> Vec<TextPattern> {
    BUILTIN
        .iter()
        .filter_map(|(name, description, pattern)| {
            TextPattern::compile(name, description, pattern).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(name: &str) -> TextPattern {
        builtin_patterns()
            .into_iter()
            .find(|p| p.name == name)
            .unwrap()
    }

    #[test]
    fn test_all_builtins_compile() {
        assert_eq!(builtin_patterns().len(), BUILTIN.len());
    }

    #[test]
    fn test_credit_card() {
        let p = pattern("credit_card");
        assert!(p.matches("card 4111111111111111 on file"));
        assert!(p.matches("4111 1111 1111 1111"));
        assert!(p.matches("5500-0000-0000-0004"));
        assert!(p.matches("3782 822463 10005"));
        assert!(!p.matches("order 1234"));
    }

    #[test]
    fn test_ssn() {
        let p = pattern("ssn");
        assert!(p.matches("SSN: 123-45-6789"));
        assert!(!p.matches("123456789"));
    }

    #[test]
    fn test_email() {
        let p = pattern("email");
        assert!(p.matches("reach me at jane.doe@example.com"));
        assert!(!p.matches("@handle"));
    }

    #[test]
    fn test_bearer_and_api_key() {
        assert!(pattern("bearer_token").matches("Authorization: Bearer abc.def.ghi"));
        assert!(pattern("api_key").matches("api_key=abcdefghijklmnop1234"));
        assert!(!pattern("api_key").matches("api_key=short"));
    }

    #[test]
    fn test_password() {
        let p = pattern("password");
        assert!(p.matches("password=hunter22"));
        assert!(p.matches("PWD: 'secret!'"));
        assert!(!p.matches("forgot your password?"));
    }

    #[test]
    fn test_redact() {
        let p = pattern("ssn");
        assert_eq!(p.redact("a 123-45-6789 b", "[REDACTED]"), "a [REDACTED] b");
    }

    #[test]
    fn test_invalid_pattern() {
        let err = TextPattern::compile("bad", "", "(unclosed").unwrap_err();
        assert!(err.is_configuration_error());
    }
}
