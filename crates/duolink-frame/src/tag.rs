//! Well-known wire tags and reserved bodies.
//!
//! The tag names the channel a frame was framed for. Further tags can be
//! added for other traffic kinds without changing the header layout.

use duolink_transport::ChannelId;

/// Traffic framed for the reliable channel.
pub const TAG_TCP: u8 = b'T';

/// Traffic framed for the best-effort channel.
pub const TAG_UDP: u8 = b'U';

/// Reserved heartbeat body, exchanged only between the link monitor and the
/// servers' probe responders. The interactive client frames whole input
/// lines, so user text never matches it byte for byte in practice.
pub const HEARTBEAT: &[u8] = b"__ping__";

/// The tag matching a channel.
pub fn tag_for(channel: ChannelId) -> u8 {
    match channel {
        ChannelId::Tcp => TAG_TCP,
        ChannelId::Udp => TAG_UDP,
    }
}

/// Human-readable tag name for logs.
pub fn tag_name(tag: u8) -> &'static str {
    match tag {
        TAG_TCP => "TCP",
        TAG_UDP => "UDP",
        _ => "UNKNOWN",
    }
}

/// True when a body is the heartbeat sentinel.
pub fn is_heartbeat(body: &[u8]) -> bool {
    body == HEARTBEAT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_follow_channels() {
        assert_eq!(tag_for(ChannelId::Tcp), TAG_TCP);
        assert_eq!(tag_for(ChannelId::Udp), TAG_UDP);
    }

    #[test]
    fn tag_names() {
        assert_eq!(tag_name(TAG_TCP), "TCP");
        assert_eq!(tag_name(TAG_UDP), "UDP");
        assert_eq!(tag_name(0x00), "UNKNOWN");
    }

    #[test]
    fn heartbeat_requires_exact_equality() {
        assert!(is_heartbeat(b"__ping__"));
        assert!(!is_heartbeat(b"__ping__ "));
        assert!(!is_heartbeat(b"__PING__"));
        assert!(!is_heartbeat(b""));
    }
}
