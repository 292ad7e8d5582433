//! Sender identity parsing.
//!
//! An incoming line's prefix identifies its origin: either a full
//! `nick!user@host` mask or a bare name (a nickname, or the server itself).

use crate::error::MessageParseError;

/// The sender of a wire line.
///
/// Produced fresh for every parsed line; never persisted. The nickname is
/// always present; username and hostname only appear in full-mask prefixes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin {
    /// Nickname (or server name for bare server prefixes).
    pub nick: String,
    /// Username (ident), when the prefix carried a full mask.
    pub user: Option<String>,
    /// Hostname, when the prefix carried a full mask.
    pub host: Option<String>,
}

impl Origin {
    /// Build an origin from explicit components.
    pub fn new(
        nick: impl Into<String>,
        user: Option<impl Into<String>>,
        host: Option<impl Into<String>>,
    ) -> Self {
        Origin {
            nick: nick.into(),
            user: user.map(Into::into),
            host: host.map(Into::into),
        }
    }

    /// Parse a prefix string (without its leading `:`) into an origin.
    ///
    /// Accepts `nick!user@host`, `nick@host`, and bare `nick` shapes.
    pub fn parse(s: &str) -> Result<Self, MessageParseError> {
        if s.is_empty() || s.chars().any(|c| c == ' ' || c.is_control()) {
            return Err(MessageParseError::InvalidPrefix(s.to_owned()));
        }

        let (before, host) = match s.find('@') {
            Some(at) => (&s[..at], Some(&s[at + 1..])),
            None => (s, None),
        };
        let (nick, user) = match before.find('!') {
            Some(bang) => (&before[..bang], Some(&before[bang + 1..])),
            None => (before, None),
        };

        if nick.is_empty() || user.is_some_and(str::is_empty) || host.is_some_and(str::is_empty) {
            return Err(MessageParseError::InvalidPrefix(s.to_owned()));
        }

        Ok(Origin {
            nick: nick.to_owned(),
            user: user.map(str::to_owned),
            host: host.map(str::to_owned),
        })
    }

    /// True when this prefix carried a full `nick!user@host` mask.
    pub fn is_full_mask(&self) -> bool {
        self.user.is_some() && self.host.is_some()
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.nick)?;
        if let Some(user) = &self.user {
            write!(f, "!{}", user)?;
        }
        if let Some(host) = &self.host {
            write!(f, "@{}", host)?;
        }
        Ok(())
    }
}
