//! OTP extraction from free text.

use once_cell::sync::Lazy;
use regex::Regex;

// 4-8 digit runs at word boundaries: long enough to skip years and PINs
// shorter than 4, short enough to reject phone numbers and order ids.
static OTP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4,8}\b").expect("valid otp pattern"));

/// Extract candidate OTP codes in first-occurrence order.
///
/// A candidate is a maximal run of 4-8 decimal digits bounded by
/// non-digit characters. Digit runs embedded in a longer run are not
/// candidates. Pure and total; returns an empty vec when nothing
/// matches.
pub fn extract(text: &str) -> Vec<String> {
    OTP_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_standalone_code() {
        assert_eq!(extract("code 123456 exp"), vec!["123456"]);
    }

    #[test]
    fn rejects_long_runs() {
        assert!(extract("order #12345678901").is_empty());
    }

    #[test]
    fn rejects_short_runs() {
        assert!(extract("room 123 floor 9").is_empty());
    }

    #[test]
    fn first_occurrence_order() {
        assert_eq!(
            extract("use 4321 or fallback 87654321"),
            vec!["4321", "87654321"]
        );
    }

    #[test]
    fn boundaries_are_non_digit() {
        // punctuation and letters count as boundaries
        assert_eq!(extract("Your code is 824193, thanks"), vec!["824193"]);
        assert_eq!(extract("(55512)"), vec!["55512"]);
    }

    #[test]
    fn empty_input() {
        assert!(extract("").is_empty());
        assert!(extract("no digits here").is_empty());
    }
}
