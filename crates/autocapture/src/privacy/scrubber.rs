//! The text scrubber applied to `text` and `value` attributes.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::Result;

use super::patterns::{builtin_patterns, TextPattern};

/// Replacement for redacted matches.
pub const REDACTION_PLACEHOLDER: &str = "[REDACTED]";

/// What to do with text that matches a sensitive pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrubMode {
    /// Replace matched substrings with the placeholder.
    #[default]
    Redact,
    /// Drop the whole value.
    Omit,
    /// Record text unchanged.
    Off,
}

/// Pattern-based scrubber.
#[derive(Debug, Clone)]
pub struct TextScrubber {
    mode: ScrubMode,
    patterns: Vec<TextPattern>,
}

impl Default for TextScrubber {
    fn default() -> Self {
        Self::new()
    }
}

impl TextScrubber {
    /// Redact with the built-in patterns.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: ScrubMode::Redact,
            patterns: builtin_patterns(),
        }
    }

    /// Build a scrubber from a mode, the built-in toggle and custom regexes.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first invalid custom pattern.
    pub fn with_patterns(mode: ScrubMode, use_builtin: bool, custom: &[String]) -> Result<Self> {
        let mut patterns = if use_builtin {
            builtin_patterns()
        } else {
            Vec::new()
        };
        for (i, source) in custom.iter().enumerate() {
            patterns.push(TextPattern::compile(
                &format!("custom_{i}"),
                "custom pattern",
                source,
            )?);
        }
        debug!(?mode, patterns = patterns.len(), "Text scrubber ready");
        Ok(Self { mode, patterns })
    }

    /// The configured mode.
    #[must_use]
    pub fn mode(&self) -> ScrubMode {
        self.mode
    }

    /// Names of the patterns found in `text`.
    #[must_use]
    pub fn detect(&self, text: &str) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|p| p.matches(text))
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Scrub `text` according to the mode. `None` means the value must be dropped.
    #[must_use]
    pub fn scrub(&self, text: &str) -> Option<String> {
        match self.mode {
            ScrubMode::Off => Some(text.to_string()),
            ScrubMode::Omit => {
                if let Some(p) = self.patterns.iter().find(|p| p.matches(text)) {
                    trace!(pattern = %p.name, "Omitting sensitive text");
                    None
                } else {
                    Some(text.to_string())
                }
            }
            ScrubMode::Redact => {
                let mut out = text.to_string();
                for p in &self.patterns {
                    if p.matches(&out) {
                        trace!(pattern = %p.name, "Redacting sensitive text");
                        out = p.redact(&out, REDACTION_PLACEHOLDER);
                    }
                }
                Some(out)
            }
        }
    }
}

/// Replace each non-whitespace character with `*`.
#[must_use]
pub fn mask(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { c } else { '*' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_mode() {
        let scrubber = TextScrubber::new();
        assert_eq!(
            scrubber.scrub("mail jane@example.com now").as_deref(),
            Some("mail [REDACTED] now")
        );
        assert_eq!(scrubber.scrub("Buy now").as_deref(), Some("Buy now"));
    }

    #[test]
    fn test_omit_mode() {
        let scrubber = TextScrubber::with_patterns(ScrubMode::Omit, true, &[]).unwrap();
        assert_eq!(scrubber.scrub("123-45-6789"), None);
        assert_eq!(scrubber.scrub("hello").as_deref(), Some("hello"));
    }

    #[test]
    fn test_off_mode() {
        let scrubber = TextScrubber::with_patterns(ScrubMode::Off, true, &[]).unwrap();
        assert_eq!(scrubber.scrub("123-45-6789").as_deref(), Some("123-45-6789"));
    }

    #[test]
    fn test_custom_patterns() {
        let custom = vec![r"ORDER-\d+".to_string()];
        let scrubber = TextScrubber::with_patterns(ScrubMode::Redact, false, &custom).unwrap();
        assert_eq!(
            scrubber.scrub("ref ORDER-991").as_deref(),
            Some("ref [REDACTED]")
        );
        assert_eq!(scrubber.detect("ORDER-1 and 123-45-6789"), vec!["custom_0"]);
    }

    #[test]
    fn test_invalid_custom_pattern() {
        let custom = vec!["[".to_string()];
        assert!(TextScrubber::with_patterns(ScrubMode::Redact, true, &custom).is_err());
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("Sign up now"), "**** ** ***");
        assert_eq!(mask(""), "");
    }

    #[test]
    fn test_mode_serde() {
        let mode: ScrubMode = serde_json::from_str(r#""omit""#).unwrap();
        assert_eq!(mode, ScrubMode::Omit);
    }
}
