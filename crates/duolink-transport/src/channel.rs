/// Identity of one of the two chat channels.
///
/// Exactly one channel is active at any instant. The link monitor owns the
/// transition; everyone else only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelId {
    /// Connection-oriented, ordered primary channel.
    Tcp,
    /// Connectionless, unordered backup channel.
    Udp,
}

impl ChannelId {
    /// The alternate channel.
    pub fn other(self) -> Self {
        match self {
            ChannelId::Tcp => ChannelId::Udp,
            ChannelId::Udp => ChannelId::Tcp,
        }
    }

    /// Lowercase channel name for logs and status lines.
    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Tcp => "tcp",
            ChannelId::Udp => "udp",
        }
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
