//! Privacy scrubbing for extracted text.
//!
//! Element text and form values pass through a [`TextScrubber`] before they are
//! recorded as payload attributes. Sensitive substrings (card numbers, SSNs,
//! e-mail addresses, credentials) are redacted, or the value is omitted.
//! With masking enabled the whole value is replaced by `*`.
//!
//! ```
//! use autocapture::privacy::TextScrubber;
//!
//! let scrubber = TextScrubber::new();
//! assert_eq!(
//!     scrubber.scrub("ssn 123-45-6789").as_deref(),
//!     Some("ssn [REDACTED]")
//! );
//! ```

mod patterns;
mod scrubber;

pub use patterns::{builtin_patterns, TextPattern};
pub use scrubber::{mask, ScrubMode, TextScrubber, REDACTION_PLACEHOLDER};
