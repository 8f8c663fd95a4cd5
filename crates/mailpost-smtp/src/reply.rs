//! SMTP reply types and parsing.

use crate::error::{Error, Result};

/// SMTP reply from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g. 250).
    pub code: ReplyCode,
    /// Reply message lines.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    pub const fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Parses an SMTP reply from response lines.
    ///
    /// Replies can be single-line or multi-line:
    /// - Single: `250 OK`
    /// - Multi: `250-First line` / `250-Second line` / `250 Last line`
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is malformed.
    pub fn parse(lines: &[String]) -> Result<Self> {
        let Some(first) = lines.first() else {
            return Err(Error::Protocol("Empty reply".into()));
        };

        if first.len() < 3 {
            return Err(Error::Protocol(format!("Reply too short: {first}")));
        }

        let code_str = &first[0..3];
        let code = code_str
            .parse::<u16>()
            .map_err(|_| Error::Protocol(format!("Invalid reply code: {code_str}")))?;

        let mut message = Vec::new();
        for line in lines {
            if line.len() > 4 {
                // Skip the code and separator ("250-" or "250 ")
                message.push(line[4..].to_string());
            } else if line.len() == 3 {
                message.push(String::new());
            } else {
                return Err(Error::Protocol(format!("Malformed reply line: {line}")));
            }
        }

        Ok(Self::new(ReplyCode::new(code), message))
    }

    /// Checks if a line terminates a reply.
    ///
    /// Continuation lines use `-` after the code; the final line uses a space.
    #[must_use]
    pub fn is_final_line(line: &str) -> bool {
        line.len() >= 4 && line.as_bytes()[3] == b' '
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Reply codes this client checks for.
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_OK: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    mod reply_code_tests {
        use super::*;

        #[test]
        fn success_codes() {
            assert!(ReplyCode::OK.is_success());
            assert!(ReplyCode::SERVICE_READY.is_success());
            assert!(ReplyCode::CLOSING.is_success());
            assert!(ReplyCode::AUTH_OK.is_success());
        }

        #[test]
        fn intermediate_codes() {
            assert!(ReplyCode::START_DATA.is_intermediate());
            assert!(!ReplyCode::START_DATA.is_success());
        }

        #[test]
        fn error_codes() {
            assert!(ReplyCode::new(451).is_transient());
            assert!(ReplyCode::AUTH_FAILED.is_permanent());
            assert!(ReplyCode::MAILBOX_UNAVAILABLE.is_permanent());
            assert!(ReplyCode::TRANSACTION_FAILED.is_permanent());
        }

        #[test]
        fn as_u16() {
            assert_eq!(ReplyCode::OK.as_u16(), 250);
            assert_eq!(ReplyCode::SERVICE_READY.as_u16(), 220);
        }

        #[test]
        fn display() {
            assert_eq!(format!("{}", ReplyCode::OK), "250");
            assert_eq!(format!("{}", ReplyCode::AUTH_FAILED), "535");
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn single_line_reply() {
            let lines = vec!["250 OK".to_string()];
            let reply = Reply::parse(&lines).unwrap();
            assert_eq!(reply.code.as_u16(), 250);
            assert_eq!(reply.message, vec!["OK"]);
            assert!(reply.is_success());
        }

        #[test]
        fn multi_line_reply() {
            let lines = vec![
                "250-First line".to_string(),
                "250-Second line".to_string(),
                "250 Last line".to_string(),
            ];
            let reply = Reply::parse(&lines).unwrap();
            assert_eq!(reply.code.as_u16(), 250);
            assert_eq!(reply.message, vec!["First line", "Second line", "Last line"]);
        }

        #[test]
        fn greeting() {
            let lines = vec!["220 smtp.example.com ESMTP ready".to_string()];
            let reply = Reply::parse(&lines).unwrap();
            assert_eq!(reply.code, ReplyCode::SERVICE_READY);
            assert_eq!(reply.message_text(), "smtp.example.com ESMTP ready");
        }

        #[test]
        fn bare_code() {
            let lines = vec!["250".to_string()];
            let reply = Reply::parse(&lines).unwrap();
            assert_eq!(reply.message, vec![String::new()]);
        }

        #[test]
        fn is_final_line() {
            assert!(Reply::is_final_line("250 OK"));
            assert!(!Reply::is_final_line("250-Continuing"));
            assert!(!Reply::is_final_line("250"));
        }

        #[test]
        fn error_empty() {
            assert!(Reply::parse(&[]).is_err());
        }

        #[test]
        fn error_too_short() {
            let lines = vec!["25".to_string()];
            assert!(Reply::parse(&lines).is_err());
        }

        #[test]
        fn error_invalid_code() {
            let lines = vec!["ABC OK".to_string()];
            assert!(Reply::parse(&lines).is_err());
        }
    }
}
