//! Content-derived message identity.

use md5::{Digest, Md5};

/// Computes the identifier for a composed message: the lowercase-hex
/// encoding of the 128-bit digest of its raw bytes.
///
/// The identifier is a pure function of the message content: sending the
/// byte-identical message again yields the same id. It exists to track
/// content equality across sends, not as a security commitment.
#[must_use]
pub fn message_id(raw: &[u8]) -> String {
    hex::encode(Md5::digest(raw))
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

    #[test]
    fn test_known_digests() {
        assert_eq!(message_id(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(message_id(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_deterministic() {
        let raw = b"To: a@x\r\nCc: \r\nSubject: Hi\r\n\r\nHello\r\n";
        assert_eq!(message_id(raw), message_id(raw));
    }

    #[test]
    fn test_single_byte_change_changes_id() {
        assert_ne!(message_id(b"Hello"), message_id(b"Hello!"));
    }

    #[test]
    fn test_shape() {
        let id = message_id(b"anything");
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
