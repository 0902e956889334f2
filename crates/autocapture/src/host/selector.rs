//! CSS selector subset used by safelists.
//!
//! Supports type and universal selectors, `#id`, `.class`, attribute
//! selectors (presence, `=`, `~=`, `|=`, `^=`, `$=`, `*=`), compound
//! selectors, descendant and child combinators, and comma-separated lists.
//! Pseudo-classes and sibling combinators are rejected at parse time.

use std::fmt;

use crate::error::{Error, Result};

use super::element::Element;

/// A parsed, comma-separated list of selectors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorList {
    selectors: Vec<Selector>,
}

impl SelectorList {
    /// Parse a selector list such as `".no-track, input[type=password]"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelector`] if any member fails to parse.
    pub fn parse(source: &str) -> Result<Self> {
        let mut selectors = Vec::new();
        for part in split_top_level(source) {
            selectors.push(Selector::parse(part)?);
        }
        if selectors.is_empty() {
            return Err(Error::invalid_selector(source, "empty selector"));
        }
        Ok(Self { selectors })
    }

    /// Build a list from several selector strings (each may itself be a list).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelector`] for the first source that fails.
    pub fn from_sources<S: AsRef<str>>(sources: &[S]) -> Result<Self> {
        let mut selectors = Vec::new();
        for source in sources {
            selectors.extend(Self::parse(source.as_ref())?.selectors);
        }
        Ok(Self { selectors })
    }

    /// Check whether any selector in the list matches the element.
    #[must_use]
    pub fn matches(&self, element: &Element) -> bool {
        self.selectors.iter().any(|s| s.matches(element))
    }

    /// Number of selectors in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    /// Whether the list has no selectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

/// A single complex selector (compounds joined by combinators).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeMatcher>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeMatcher {
    name: String,
    test: Option<(AttributeOp, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeOp {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

impl Selector {
    /// Parse a single complex selector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelector`] on malformed or unsupported input.
    pub fn parse(source: &str) -> Result<Self> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_selector(source, "empty selector"));
        }

        let mut parser = Parser {
            source: trimmed,
            chars: trimmed.char_indices().peekable(),
        };
        let mut compounds = vec![parser.compound()?];
        let mut combinators = Vec::new();

        loop {
            let saw_space = parser.skip_whitespace();
            match parser.peek() {
                None => break,
                Some('>') => {
                    parser.bump();
                    parser.skip_whitespace();
                    combinators.push(Combinator::Child);
                }
                Some('+' | '~') => {
                    return Err(parser.error("sibling combinators are not supported"));
                }
                Some(_) if saw_space => combinators.push(Combinator::Descendant),
                Some(c) => return Err(parser.error(&format!("unexpected character '{c}'"))),
            }
            compounds.push(parser.compound()?);
        }

        Ok(Self {
            source: trimmed.to_string(),
            compounds,
            combinators,
        })
    }

    /// Check whether the selector matches the element.
    #[must_use]
    pub fn matches(&self, element: &Element) -> bool {
        self.matches_from(self.compounds.len() - 1, element)
    }

    fn matches_from(&self, index: usize, element: &Element) -> bool {
        if !self.compounds[index].matches(element) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => element
                .parent()
                .is_some_and(|parent| self.matches_from(index - 1, &parent)),
            Combinator::Descendant => element
                .ancestors()
                .any(|ancestor| self.matches_from(index - 1, &ancestor)),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
    }

    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && !tag.eq_ignore_ascii_case(&element.tag_name()) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id() != *id {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = element.class_list();
            if !self.classes.iter().all(|c| classes.contains(c)) {
                return false;
            }
        }
        self.attributes.iter().all(|a| a.matches(element))
    }
}

impl AttributeMatcher {
    fn matches(&self, element: &Element) -> bool {
        let Some(actual) = element.attribute(&self.name) else {
            return false;
        };
        let Some((op, expected)) = &self.test else {
            return true;
        };
        match op {
            AttributeOp::Equals => actual == *expected,
            AttributeOp::Includes => actual.split_whitespace().any(|w| w == expected),
            AttributeOp::DashMatch => {
                actual == *expected || actual.starts_with(&format!("{expected}-"))
            }
            AttributeOp::Prefix => !expected.is_empty() && actual.starts_with(expected.as_str()),
            AttributeOp::Suffix => !expected.is_empty() && actual.ends_with(expected.as_str()),
            AttributeOp::Substring => !expected.is_empty() && actual.contains(expected.as_str()),
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl Parser<'_> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    fn error(&self, message: &str) -> Error {
        Error::invalid_selector(self.source, message)
    }

    /// Returns true if any whitespace was consumed.
    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
            skipped = true;
        }
        skipped
    }

    fn ident(&mut self) -> Result<String> {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if ident.is_empty() {
            return Err(self.error("expected identifier"));
        }
        Ok(ident)
    }

    fn compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();

        match self.peek() {
            Some('*') => {
                self.bump();
                compound.tag = Some("*".to_string());
            }
            Some(c) if c.is_alphabetic() || c == '_' || c == '-' => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attributes.push(self.attribute()?);
                }
                Some(':') => return Err(self.error("pseudo-classes are not supported")),
                _ => break,
            }
        }

        if compound.is_empty() {
            return Err(self.error("expected a simple selector"));
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttributeMatcher> {
        self.skip_whitespace();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        let op = match self.peek() {
            Some(']') => {
                self.bump();
                return Ok(AttributeMatcher { name, test: None });
            }
            Some('=') => {
                self.bump();
                AttributeOp::Equals
            }
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                self.bump();
                if self.bump() != Some('=') {
                    return Err(self.error("expected '=' in attribute selector"));
                }
                match c {
                    '~' => AttributeOp::Includes,
                    '|' => AttributeOp::DashMatch,
                    '^' => AttributeOp::Prefix,
                    '$' => AttributeOp::Suffix,
                    _ => AttributeOp::Substring,
                }
            }
            Some(_) => return Err(self.error("malformed attribute selector")),
            None => return Err(self.error("unterminated attribute selector")),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let mut value = String::new();
                loop {
                    match self.bump() {
                        Some(c) if c == quote => break,
                        Some(c) => value.push(c),
                        None => return Err(self.error("unterminated string")),
                    }
                }
                value
            }
            _ => self.ident()?,
        };
        self.skip_whitespace();
        if self.bump() != Some(']') {
            return Err(self.error("unterminated attribute selector"));
        }

        Ok(AttributeMatcher {
            name,
            test: Some((op, value)),
        })
    }
}

/// Split on commas that are not inside brackets or quotes.
fn split_top_level(source: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in source.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&source[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button() -> Element {
        Element::new("button")
            .with_attribute("id", "buy")
            .with_attribute("class", "btn no-track")
            .with_attribute("data-role", "checkout-primary")
    }

    #[test]
    fn test_type_selector_is_case_insensitive() {
        let selector = Selector::parse("BUTTON").unwrap();
        assert!(selector.matches(&button()));
        assert!(!Selector::parse("a").unwrap().matches(&button()));
    }

    #[test]
    fn test_id_and_class_selectors() {
        assert!(Selector::parse("#buy").unwrap().matches(&button()));
        assert!(Selector::parse(".no-track").unwrap().matches(&button()));
        assert!(Selector::parse("button.btn.no-track").unwrap().matches(&button()));
        assert!(!Selector::parse(".btn.missing").unwrap().matches(&button()));
    }

    #[test]
    fn test_attribute_operators() {
        let el = button();
        assert!(Selector::parse("[data-role]").unwrap().matches(&el));
        assert!(Selector::parse("[data-role=checkout-primary]").unwrap().matches(&el));
        assert!(Selector::parse("[data-role^='checkout']").unwrap().matches(&el));
        assert!(Selector::parse("[data-role$=\"primary\"]").unwrap().matches(&el));
        assert!(Selector::parse("[data-role*=out]").unwrap().matches(&el));
        assert!(Selector::parse("[data-role|=checkout]").unwrap().matches(&el));
        assert!(Selector::parse("[class~=btn]").unwrap().matches(&el));
        assert!(!Selector::parse("[class~=bt]").unwrap().matches(&el));
        assert!(!Selector::parse("[href]").unwrap().matches(&el));
    }

    #[test]
    fn test_password_input_selector() {
        let input = Element::new("input").with_attribute("type", "password");
        let selector = Selector::parse("input[type=\"password\"]").unwrap();
        assert!(selector.matches(&input));
        let text = Element::new("input").with_attribute("type", "text");
        assert!(!selector.matches(&text));
    }

    #[test]
    fn test_descendant_and_child_combinators() {
        let form = Element::new("form").with_attribute("class", "private");
        let fieldset = Element::new("fieldset").with_parent(&form);
        let input = Element::new("input").with_parent(&fieldset);

        assert!(Selector::parse(".private input").unwrap().matches(&input));
        assert!(Selector::parse("form fieldset > input").unwrap().matches(&input));
        assert!(!Selector::parse("form > input").unwrap().matches(&input));
        assert!(!Selector::parse(".public input").unwrap().matches(&input));
    }

    #[test]
    fn test_selector_list() {
        let list = SelectorList::parse(".no-track, a[href^=mailto]").unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.matches(&button()));
        let link = Element::new("a").with_attribute("href", "mailto:me@example.com");
        assert!(list.matches(&link));
        assert!(!list.matches(&Element::new("div")));
    }

    #[test]
    fn test_comma_inside_attribute_value() {
        let list = SelectorList::parse("[title='a,b']").unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.matches(&Element::new("span").with_attribute("title", "a,b")));
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("div[").is_err());
        assert!(Selector::parse("a:hover").is_err());
        assert!(Selector::parse("a + b").is_err());
        assert!(Selector::parse("[x~y]").is_err());
        assert!(SelectorList::parse("a,").is_err());
    }

    #[test]
    fn test_from_sources_combines_lists() {
        let list = SelectorList::from_sources(&[".a", ".b, .c"]).unwrap();
        assert_eq!(list.len(), 3);
        assert!(SelectorList::from_sources::<&str>(&[]).unwrap().is_empty());
    }
}
