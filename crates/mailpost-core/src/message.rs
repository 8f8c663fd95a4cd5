//! Outgoing message model, recipient normalization, and composition.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

/// A request to send one email message.
///
/// Treated as immutable once constructed: composition and identity are pure
/// functions of its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    /// Sender address. When empty, the configured username is used.
    #[serde(default)]
    pub from: Option<String>,
    /// To addresses. Required, at least one.
    pub to: Vec<String>,
    /// CC addresses.
    #[serde(default)]
    pub cc: Vec<String>,
    /// BCC addresses. Envelope only; never rendered into headers.
    #[serde(default)]
    pub bcc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// Whether the body is HTML rather than plain text.
    #[serde(default)]
    pub render_html: bool,
}

impl SendRequest {
    /// Creates a new request with the given subject and body.
    #[must_use]
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            body: body.into(),
            render_html: false,
        }
    }

    /// Sets the sender address.
    #[must_use]
    pub fn sender(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    /// Adds a CC recipient.
    #[must_use]
    pub fn cc(mut self, recipient: impl Into<String>) -> Self {
        self.cc.push(recipient.into());
        self
    }

    /// Adds a BCC recipient.
    #[must_use]
    pub fn bcc(mut self, recipient: impl Into<String>) -> Self {
        self.bcc.push(recipient.into());
        self
    }

    /// Marks the body as HTML.
    #[must_use]
    pub const fn html(mut self, render_html: bool) -> Self {
        self.render_html = render_html;
        self
    }

    /// Returns the envelope recipients: to ++ cc ++ bcc with duplicates
    /// removed, first occurrence winning.
    ///
    /// This list drives the RCPT TO sequence only. Headers render `to` and
    /// `cc` exactly as provided and never mention `bcc`.
    #[must_use]
    pub fn envelope_recipients(&self) -> Vec<String> {
        unique_in_order(self.to.iter().chain(&self.cc).chain(&self.bcc).cloned())
    }
}

/// Deduplicates a sequence, keeping the first occurrence of each item and
/// preserving the order of first appearance.
#[must_use]
pub fn unique_in_order<T, I>(items: I) -> Vec<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for item in items {
        if seen.insert(item.clone()) {
            result.push(item);
        }
    }
    result
}

/// MIME header block inserted when the body is HTML.
const HTML_MIME_BLOCK: &str = "MIME-version: 1.0;\nContent-Type: text/html; charset=\"UTF-8\";\n\n";

/// A fully composed message: headers, optional MIME block, and the exact
/// bytes handed to the DATA phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    /// The To/Cc/Subject header lines.
    pub header_block: String,
    /// The MIME block, present only for HTML bodies.
    pub mime_block: Option<String>,
    /// The message body.
    pub body: String,
    /// The wire payload: headers + MIME block + blank line + body.
    pub raw: Vec<u8>,
}

impl ComposedMessage {
    /// Composes the wire payload for a request.
    ///
    /// Deterministic: identical requests produce byte-identical output. The
    /// Cc header line is always present, even when empty, and Bcc addresses
    /// are deliberately excluded from every header line.
    ///
    /// Header values are interpolated verbatim: a subject or address
    /// containing CR/LF sequences is emitted as-is, so untrusted input can
    /// inject additional header lines. Callers own that boundary.
    #[must_use]
    pub fn compose(request: &SendRequest) -> Self {
        let header_block = format!(
            "To: {}\r\nCc: {}\r\nSubject: {}\r\n",
            request.to.join(", "),
            request.cc.join(", "),
            request.subject,
        );
        let mime_block = request.render_html.then(|| HTML_MIME_BLOCK.to_string());

        let mut raw = String::with_capacity(header_block.len() + request.body.len() + 64);
        raw.push_str(&header_block);
        if let Some(mime) = &mime_block {
            raw.push_str(mime);
        }
        raw.push_str("\r\n");
        raw.push_str(&request.body);
        raw.push_str("\r\n");

        Self {
            header_block,
            mime_block,
            body: request.body.clone(),
            raw: raw.into_bytes(),
        }
    }
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

    mod normalizer_tests {
        use super::*;
        use proptest::prelude::*;

        #[test]
        fn first_seen_order_across_lists() {
            let request = SendRequest::new("s", "b")
                .to("a@x")
                .to("b@x")
                .cc("b@x")
                .cc("c@x");
            assert_eq!(request.envelope_recipients(), ["a@x", "b@x", "c@x"]);
        }

        #[test]
        fn empty_cc_and_bcc_are_permitted() {
            let request = SendRequest::new("s", "b").to("a@x");
            assert_eq!(request.envelope_recipients(), ["a@x"]);
        }

        #[test]
        fn bcc_participates_in_envelope() {
            let request = SendRequest::new("s", "b").to("a@x").bcc("d@x").bcc("a@x");
            assert_eq!(request.envelope_recipients(), ["a@x", "d@x"]);
        }

        #[test]
        fn equality_is_exact_no_case_folding() {
            let request = SendRequest::new("s", "b").to("A@x").to("a@x");
            assert_eq!(request.envelope_recipients(), ["A@x", "a@x"]);
        }

        #[test]
        fn unique_in_order_generic() {
            assert_eq!(unique_in_order([3, 1, 3, 2, 1]), vec![3, 1, 2]);
            assert_eq!(unique_in_order(Vec::<u8>::new()), Vec::<u8>::new());
        }

        proptest! {
            #[test]
            fn every_unique_address_exactly_once_in_first_seen_order(
                to in prop::collection::vec("[a-e]@x\\.test", 1..5),
                cc in prop::collection::vec("[a-e]@x\\.test", 0..5),
                bcc in prop::collection::vec("[a-e]@x\\.test", 0..5),
            ) {
                let request = SendRequest {
                    from: None,
                    to: to.clone(),
                    cc: cc.clone(),
                    bcc: bcc.clone(),
                    subject: String::new(),
                    body: String::new(),
                    render_html: false,
                };

                let mut expected: Vec<String> = Vec::new();
                for addr in to.iter().chain(&cc).chain(&bcc) {
                    if !expected.contains(addr) {
                        expected.push(addr.clone());
                    }
                }

                prop_assert_eq!(request.envelope_recipients(), expected);
            }
        }
    }

    mod compose_tests {
        use super::*;

        #[test]
        fn plain_text_exact_bytes() {
            let request = SendRequest::new("Hi", "Hello").to("a@x");
            let composed = ComposedMessage::compose(&request);
            assert_eq!(composed.raw, b"To: a@x\r\nCc: \r\nSubject: Hi\r\n\r\nHello\r\n");
            assert!(composed.mime_block.is_none());
        }

        #[test]
        fn multiple_recipients_joined_with_comma_space() {
            let request = SendRequest::new("Hi", "Hello")
                .to("a@x")
                .to("b@x")
                .cc("c@x");
            let composed = ComposedMessage::compose(&request);
            assert_eq!(
                composed.header_block,
                "To: a@x, b@x\r\nCc: c@x\r\nSubject: Hi\r\n"
            );
        }

        #[test]
        fn html_flag_changes_only_the_mime_block() {
            let plain = ComposedMessage::compose(&SendRequest::new("Hi", "Hello").to("a@x"));
            let html = ComposedMessage::compose(&SendRequest::new("Hi", "Hello").to("a@x").html(true));

            assert_eq!(plain.header_block, html.header_block);
            assert_eq!(plain.body, html.body);
            assert_eq!(
                html.mime_block.as_deref(),
                Some("MIME-version: 1.0;\nContent-Type: text/html; charset=\"UTF-8\";\n\n")
            );
            assert_eq!(
                html.raw,
                b"To: a@x\r\nCc: \r\nSubject: Hi\r\nMIME-version: 1.0;\nContent-Type: text/html; charset=\"UTF-8\";\n\n\r\nHello\r\n"
            );
        }

        #[test]
        fn bcc_never_appears_in_headers() {
            let request = SendRequest::new("Hi", "Hello").to("a@x").bcc("hidden@x");
            let composed = ComposedMessage::compose(&request);
            assert!(!composed.header_block.contains("hidden@x"));
            assert!(!String::from_utf8(composed.raw).unwrap().contains("hidden@x"));
        }

        #[test]
        fn deterministic_for_identical_requests() {
            let request = SendRequest::new("Hi", "Hello").to("a@x").cc("b@x").html(true);
            let first = ComposedMessage::compose(&request);
            let second = ComposedMessage::compose(&request);
            assert_eq!(first, second);
        }
    }
}
