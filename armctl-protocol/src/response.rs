//! Classification of board status lines.
//!
//! The board replies with free-form text. A line whose first word starts
//! with `error` or `invalid` (any case) reports a rejected command; every
//! other line is informational.

/// Prefixes that mark a line as an error report
pub const ERROR_PREFIXES: [&str; 2] = ["error", "invalid"];

/// A classified status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response<'a> {
    /// Informational line
    Status(&'a str),
    /// Board rejected a command
    Error(&'a str),
}

impl<'a> Response<'a> {
    /// Classify one line of board output
    pub fn classify(line: &'a str) -> Self {
        let trimmed = line.trim();
        let is_error = ERROR_PREFIXES.iter().any(|prefix| {
            trimmed
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        });
        if is_error {
            Response::Error(trimmed)
        } else {
            Response::Status(trimmed)
        }
    }

    /// Whether this line reports a rejected command
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// The line text without surrounding whitespace
    pub fn text(&self) -> &'a str {
        match self {
            Response::Status(text) | Response::Error(text) => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        assert_eq!(
            Response::classify("Servo 2 set to 1450"),
            Response::Status("Servo 2 set to 1450")
        );
        assert!(!Response::classify("all servos neutral\r").is_error());
        assert!(!Response::classify("").is_error());
    }

    #[test]
    fn test_error_lines() {
        assert!(Response::classify("Error: bad servo").is_error());
        assert!(Response::classify("  INVALID command").is_error());
        assert!(Response::classify("invalid").is_error());
        assert_eq!(Response::classify("error x").text(), "error x");
    }

    #[test]
    fn test_error_word_elsewhere_is_status() {
        assert!(!Response::classify("no error").is_error());
    }

    #[test]
    fn test_multibyte_prefix_does_not_panic() {
        assert!(!Response::classify("µs pulse").is_error());
    }
}
