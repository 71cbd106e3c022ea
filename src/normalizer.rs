//! Turns raw upload content into candidate email addresses.

use crate::models::EmailAddress;
use once_cell::sync::Lazy;
use regex::Regex;

static DELIMITERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\r\n,]+").expect("Failed to compile delimiter regex. This should not happen.")
});

/// Splits raw text or CSV content into trimmed, non-empty candidates.
///
/// Newlines and commas are one delimiter class, so a CSV with one address
/// per line and a comma-separated paste are handled the same way. No format
/// checking, case folding or deduplication happens here: classification is
/// the validation service's job.
///
/// # Arguments
/// * `raw` - The file content or pasted text.
///
/// # Returns
/// * `Vec<EmailAddress>` in input order. Empty when the input holds only
///   whitespace and delimiters.
pub fn normalize(raw: &str) -> Vec<EmailAddress> {
    let addresses: Vec<EmailAddress> = DELIMITERS
        .split(raw)
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(str::to_string)
        .collect();

    tracing::debug!(
        "Normalized {} bytes of input into {} candidate addresses.",
        raw.len(),
        addresses.len()
    );
    addresses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mixed_delimiters() {
        assert_eq!(
            normalize("a@x.com, b@x.com\nc@x.com"),
            vec!["a@x.com", "b@x.com", "c@x.com"]
        );
    }

    #[test]
    fn test_normalize_clean_input_unchanged() {
        let clean = vec!["first@example.com", "Second@Example.com", "not-an-email"];
        assert_eq!(normalize(&clean.join("\n")), clean);
    }

    #[test]
    fn test_normalize_crlf_and_runs() {
        assert_eq!(
            normalize("a@x.com\r\n\r\n,,b@x.com,\r\n"),
            vec!["a@x.com", "b@x.com"]
        );
    }

    #[test]
    fn test_normalize_keeps_duplicates_and_case() {
        assert_eq!(
            normalize("A@X.com\na@x.com\nA@X.com"),
            vec!["A@X.com", "a@x.com", "A@X.com"]
        );
    }

    #[test]
    fn test_normalize_trims_inner_whitespace_only_at_edges() {
        assert_eq!(normalize("  john doe@x.com \t"), vec!["john doe@x.com"]);
    }

    #[test]
    fn test_normalize_empty_input() {
        assert!(normalize("").is_empty());
        assert!(normalize("   \n\t \r\n , ,").is_empty());
    }
}
