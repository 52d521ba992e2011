//! Wire vocabulary of the discovery protocol
//!
//! Every datagram carries exactly one ASCII token, with no header, length
//! prefix or version field. A payload is recognised only on an exact byte
//! match; anything else is inert.

use std::fmt;

/// Broadcast by a node looking for peers
pub const DISCOVERY_TOKEN: &[u8] = b"pelotari?";

/// Unicast reply from a node that heard a discovery broadcast
pub const RESPONSE_TOKEN: &[u8] = b"aupa!";

/// Unicast reply from the discoverer once it has registered the responder
pub const CONFIRM_TOKEN: &[u8] = b"dale!";

/// Reserved: liveness probe. Not wired into any loop.
pub const HEARTBEAT_TOKEN: &[u8] = b"hor?";

/// Reserved: answer to a liveness probe. Not wired into any loop.
pub const HEARTBEAT_ACK_TOKEN: &[u8] = b"hemen nago!";

/// Longest token in the vocabulary; receive buffers only need to hold this much
pub const MAX_TOKEN_LEN: usize = HEARTBEAT_ACK_TOKEN.len();

// ─────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────

/// One protocol message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    /// "Who is listening?" (broadcast flow)
    Discovery,
    /// "I'm here, let's connect" (unicast, discovered → discoverer)
    Response,
    /// "Registered you, proceed" (unicast, discoverer → discovered)
    Confirm,
    /// Reserved liveness probe
    Heartbeat,
    /// Reserved liveness answer
    HeartbeatAck,
}

impl Message {
    /// All messages in the vocabulary
    pub const ALL: [Message; 5] = [
        Message::Discovery,
        Message::Response,
        Message::Confirm,
        Message::Heartbeat,
        Message::HeartbeatAck,
    ];

    /// The exact bytes sent on the wire
    pub const fn as_bytes(&self) -> &'static [u8] {
        match self {
            Message::Discovery => DISCOVERY_TOKEN,
            Message::Response => RESPONSE_TOKEN,
            Message::Confirm => CONFIRM_TOKEN,
            Message::Heartbeat => HEARTBEAT_TOKEN,
            Message::HeartbeatAck => HEARTBEAT_ACK_TOKEN,
        }
    }

    /// Recognise a received payload. Returns `None` for anything that is not
    /// an exact token match, including tokens with trailing bytes.
    pub fn parse(payload: &[u8]) -> Option<Message> {
        Self::ALL.into_iter().find(|m| m.as_bytes() == payload)
    }

    /// Short name used in log fields
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Discovery => "DISCOVERY",
            Message::Response => "RESPONSE",
            Message::Confirm => "CONFIRM",
            Message::Heartbeat => "HEARTBEAT",
            Message::HeartbeatAck => "HEARTBEAT_ACK",
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_tokens() {
        assert_eq!(Message::Discovery.as_bytes(), b"pelotari?");
        assert_eq!(Message::Response.as_bytes(), b"aupa!");
        assert_eq!(Message::Confirm.as_bytes(), b"dale!");
        assert_eq!(Message::Heartbeat.as_bytes(), b"hor?");
        assert_eq!(Message::HeartbeatAck.as_bytes(), b"hemen nago!");
    }

    #[test]
    fn test_parse_known() {
        assert_eq!(Message::parse(b"pelotari?"), Some(Message::Discovery));
        assert_eq!(Message::parse(b"aupa!"), Some(Message::Response));
        assert_eq!(Message::parse(b"dale!"), Some(Message::Confirm));
    }

    #[test]
    fn test_parse_rejects_near_misses() {
        assert_eq!(Message::parse(b""), None);
        assert_eq!(Message::parse(b"pelotari"), None);
        assert_eq!(Message::parse(b"pelotari?\n"), None);
        assert_eq!(Message::parse(b"AUPA!"), None);
        assert_eq!(Message::parse(&[0xff, 0x00, 0x13]), None);
    }

    #[test]
    fn test_max_token_len_covers_vocabulary() {
        for msg in Message::ALL {
            assert!(msg.as_bytes().len() <= MAX_TOKEN_LEN);
        }
    }
}
