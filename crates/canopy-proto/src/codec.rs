//! Wire-line parsing into dispatchable events.
//!
//! One raw line becomes zero or more [`Delivery`] pairs. Four line shapes
//! are special-cased before generic parsing: a NOTICE from the bare server
//! (no user prefix), a fatal ERROR line, a full `nick!user@host` prefix,
//! and a bare-`nick` prefix. Prefix-less lines (`PING :token`) parse
//! generically with no sender.

use std::sync::Arc;

use tracing::warn;

use crate::command::Verb;
use crate::daemon::DialectView;
use crate::error::MessageParseError;
use crate::event::{Delivery, EventKey, Payload};
use crate::origin::Origin;

/// Channel-name normalization switches for one connection.
#[derive(Clone, Copy, Debug)]
pub struct NormalizePolicy {
    /// Lowercase channel names (case-sensitivity disabled).
    pub lowercase: bool,
    /// Prefix `#` onto names that carry no recognized channel prefix.
    pub autoprefix: bool,
}

impl Default for NormalizePolicy {
    fn default() -> Self {
        NormalizePolicy {
            lowercase: true,
            autoprefix: true,
        }
    }
}

/// Normalize a channel name under the given dialect and policy.
///
/// Idempotent: normalizing a normalized name is a no-op.
pub fn normalize_channel_name(name: &str, view: &DialectView<'_>, policy: &NormalizePolicy) -> String {
    let mut n = if policy.lowercase {
        name.to_lowercase()
    } else {
        name.to_owned()
    };
    if policy.autoprefix {
        let prefixed = n
            .chars()
            .next()
            .is_some_and(|c| c == '#' || view.is_channel_prefix(c));
        if !prefixed {
            n.insert(0, '#');
        }
    }
    n
}

/// Parse one raw line into its event deliveries.
///
/// Returns an empty vector for lines that are recognized but produce no
/// dispatch (unknown textual commands, which are logged at warning level).
pub fn parse_line(
    raw: &str,
    view: &DialectView<'_>,
    policy: &NormalizePolicy,
) -> Result<Vec<Delivery>, MessageParseError> {
    let line = raw.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(MessageParseError::EmptyLine);
    }

    // Fatal server ERROR line.
    if let Some(rest) = line.strip_prefix("ERROR ") {
        let payload = Payload {
            message: Some(strip_leading_colon(rest).to_owned()),
            ..Payload::default()
        };
        return Ok(vec![Delivery::new(EventKey::ServerError, Arc::new(payload))]);
    }

    // Peel off the sender prefix, when present.
    let (prefix, rest) = match line.strip_prefix(':') {
        Some(prefixed) => {
            let (p, r) = prefixed
                .split_once(' ')
                .ok_or_else(|| MessageParseError::InvalidCommand(prefixed.to_owned()))?;
            (Some(p), r.trim_start())
        }
        None => (None, line),
    };

    let (token, remainder) = match rest.split_once(' ') {
        Some((t, r)) => (t, r.trim_start()),
        None => (rest, ""),
    };

    // A NOTICE not originating from a user mask is the server talking;
    // it carries no sender nickname.
    if token.eq_ignore_ascii_case("NOTICE") && !prefix.is_some_and(|p| p.contains('!')) {
        let (mut args, trailing) = split_args(remainder);
        let recipient = if args.is_empty() {
            None
        } else {
            Some(args.remove(0))
        };
        let payload = Payload {
            server: prefix.map(str::to_owned),
            recipient,
            message: trailing,
            ..Payload::default()
        };
        return Ok(vec![Delivery::new(EventKey::ServerNotice, Arc::new(payload))]);
    }

    let sender = prefix.map(Origin::parse).transpose()?;
    let (args, trailing) = split_args(remainder);

    if token.len() == 3 && token.bytes().all(|b| b.is_ascii_digit()) {
        let code: u16 = token
            .parse()
            .map_err(|_| MessageParseError::InvalidCommand(token.to_owned()))?;
        return Ok(numeric_deliveries(code, sender, args, trailing, view));
    }

    if token.len() >= 3 && token.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Ok(command_deliveries(token, sender, args, trailing, view, policy));
    }

    Err(MessageParseError::InvalidCommand(token.to_owned()))
}

fn strip_leading_colon(s: &str) -> &str {
    s.strip_prefix(':').unwrap_or(s)
}

/// Split an argument string into space-separated arguments plus the
/// trailing free text after the first argument-position colon.
fn split_args(remainder: &str) -> (Vec<String>, Option<String>) {
    if remainder.is_empty() {
        return (Vec::new(), None);
    }
    if let Some(trailing) = remainder.strip_prefix(':') {
        return (Vec::new(), Some(trailing.to_owned()));
    }
    if let Some(pos) = remainder.find(" :") {
        let args = remainder[..pos]
            .split_ascii_whitespace()
            .map(str::to_owned)
            .collect();
        (args, Some(remainder[pos + 2..].to_owned()))
    } else {
        let args = remainder
            .split_ascii_whitespace()
            .map(str::to_owned)
            .collect();
        (args, None)
    }
}

/// A numeric reply fans out three ways: the bare code, the symbolic name
/// (when the dialect knows one), and the generic any-reply delivery.
fn numeric_deliveries(
    code: u16,
    sender: Option<Origin>,
    mut args: Vec<String>,
    trailing: Option<String>,
    view: &DialectView<'_>,
) -> Vec<Delivery> {
    let recipient = if args.is_empty() {
        None
    } else {
        Some(args.remove(0))
    };
    let payload = Arc::new(Payload {
        sender,
        code: Some(code),
        recipient,
        args,
        trailing,
        ..Payload::default()
    });

    let mut out = vec![Delivery::new(EventKey::Numeric(code), Arc::clone(&payload))];
    let symbolic = view.resolve_reply(code);
    if symbolic != code.to_string() {
        out.push(Delivery::new(EventKey::Reply(symbolic), Arc::clone(&payload)));
    }
    out.push(Delivery::new(EventKey::AnyReply, payload));
    out
}

/// Build the command-specific payload and the generic any-command delivery.
fn command_deliveries(
    token: &str,
    sender: Option<Origin>,
    args: Vec<String>,
    trailing: Option<String>,
    view: &DialectView<'_>,
    policy: &NormalizePolicy,
) -> Vec<Delivery> {
    let Some(verb) = Verb::from_wire(token) else {
        warn!(command = %token, "unknown command, dropping line");
        return Vec::new();
    };

    let mut payload = Payload {
        sender,
        verb: Some(verb),
        ..Payload::default()
    };

    let arg = |i: usize| args.get(i).cloned();
    let normalize = |name: &str| normalize_channel_name(name, view, policy);
    let is_channel = |name: &str| name.chars().next().is_some_and(|c| view.is_channel_prefix(c));

    match verb {
        Verb::Nick => {
            payload.nick = trailing.clone().or_else(|| arg(0));
        }
        Verb::Quit => {
            payload.message = trailing.clone();
        }
        Verb::Join => {
            // Some daemons put the channel in the trailing text, others in
            // the argument list.
            payload.channel = trailing.clone().or_else(|| arg(0)).map(|c| normalize(&c));
        }
        Verb::Part => {
            payload.channel = arg(0).map(|c| normalize(&c));
            payload.message = trailing.clone();
        }
        Verb::Mode => {
            match arg(0) {
                Some(target) if is_channel(&target) => payload.channel = Some(normalize(&target)),
                Some(target) => payload.recipient = Some(target),
                None => {}
            }
            // Usermode lines omit the mode string from the argument list
            // and carry it in the trailing text instead.
            payload.mode = arg(1).or_else(|| trailing.clone());
            payload.parameter = arg(2);
        }
        Verb::Topic => {
            payload.channel = arg(0).map(|c| normalize(&c));
            payload.topic = trailing.clone();
        }
        Verb::Invite => {
            payload.recipient = arg(0);
            payload.channel = arg(1).or_else(|| trailing.clone()).map(|c| normalize(&c));
        }
        Verb::Kick => {
            payload.channel = arg(0).map(|c| normalize(&c));
            payload.recipient = arg(1);
            payload.message = trailing.clone();
        }
        Verb::Privmsg | Verb::Notice => {
            match arg(0) {
                Some(target) if is_channel(&target) => payload.channel = Some(normalize(&target)),
                Some(target) => payload.recipient = Some(target),
                None => {}
            }
            payload.message = trailing.clone();
        }
        Verb::Ping | Verb::Pong => {
            payload.server = trailing.clone().or_else(|| arg(0));
        }
        _ => {
            // Commands we can send but do not expect inbound; keep the raw
            // pieces so a listener can still inspect them.
            payload.args = args;
            payload.trailing = trailing;
        }
    }

    let payload = Arc::new(payload);
    vec![
        Delivery::new(EventKey::Command(verb), Arc::clone(&payload)),
        Delivery::new(EventKey::AnyCommand, payload),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::DaemonRegistry;

    fn parse(line: &str) -> Vec<Delivery> {
        let registry = DaemonRegistry::builtin();
        let view = registry.default_view();
        parse_line(line, &view, &NormalizePolicy::default()).unwrap()
    }

    #[test]
    fn test_privmsg_full_prefix() {
        let out = parse(":Alice!a@host.com PRIVMSG #room :hello");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].key, EventKey::Command(Verb::Privmsg));
        assert_eq!(out[1].key, EventKey::AnyCommand);
        let p = &out[0].payload;
        assert_eq!(p.channel.as_deref(), Some("#room"));
        assert_eq!(p.message.as_deref(), Some("hello"));
        let sender = p.sender.as_ref().unwrap();
        assert_eq!(sender.nick, "Alice");
        assert_eq!(sender.user.as_deref(), Some("a"));
        assert_eq!(sender.host.as_deref(), Some("host.com"));
    }

    #[test]
    fn test_privmsg_to_nick() {
        let out = parse(":Alice!a@h PRIVMSG Bot :psst");
        let p = &out[0].payload;
        assert_eq!(p.channel, None);
        assert_eq!(p.recipient.as_deref(), Some("Bot"));
    }

    #[test]
    fn test_numeric_triple_delivery() {
        let out = parse(":server.example.com 372 Bot :- some motd text");
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].key, EventKey::Numeric(372));
        assert_eq!(out[1].key, EventKey::Reply("motd".into()));
        assert_eq!(out[2].key, EventKey::AnyReply);
        let p = &out[0].payload;
        assert_eq!(p.code, Some(372));
        assert_eq!(p.recipient.as_deref(), Some("Bot"));
        assert_eq!(p.trailing.as_deref(), Some("- some motd text"));
        assert_eq!(p.sender.as_ref().unwrap().nick, "server.example.com");
    }

    #[test]
    fn test_unknown_numeric_two_deliveries() {
        let out = parse(":server 999 Bot :mystery");
        // No symbolic name, so only the bare code and the generic delivery.
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].key, EventKey::Numeric(999));
        assert_eq!(out[1].key, EventKey::AnyReply);
    }

    #[test]
    fn test_names_reply_args() {
        let out = parse(":server.example.com 353 Bot = #room :Alice @Bob");
        let p = &out[0].payload;
        assert_eq!(p.recipient.as_deref(), Some("Bot"));
        assert_eq!(p.args, vec!["=".to_string(), "#room".to_string()]);
        assert_eq!(p.trailing.as_deref(), Some("Alice @Bob"));
    }

    #[test]
    fn test_server_notice_shapes() {
        for line in [
            "NOTICE AUTH :*** Looking up your hostname",
            ":irc.example.com NOTICE * :*** Found your hostname",
        ] {
            let out = parse(line);
            assert_eq!(out.len(), 1, "line: {line}");
            assert_eq!(out[0].key, EventKey::ServerNotice);
            assert!(out[0].payload.sender.is_none());
            assert!(out[0].payload.message.is_some());
        }
        // A NOTICE from a full user mask is an ordinary notice event.
        let out = parse(":Alice!a@h NOTICE Bot :hi");
        assert_eq!(out[0].key, EventKey::Command(Verb::Notice));
    }

    #[test]
    fn test_error_line() {
        let out = parse("ERROR :Closing Link: excess flood");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key, EventKey::ServerError);
        assert_eq!(
            out[0].payload.message.as_deref(),
            Some("Closing Link: excess flood")
        );
    }

    #[test]
    fn test_prefixless_ping() {
        let out = parse("PING :irc.example.com");
        assert_eq!(out[0].key, EventKey::Command(Verb::Ping));
        assert!(out[0].payload.sender.is_none());
        assert_eq!(out[0].payload.server.as_deref(), Some("irc.example.com"));
    }

    #[test]
    fn test_join_channel_in_trailing_or_args() {
        let a = parse(":Alice!a@h JOIN :#Room");
        assert_eq!(a[0].payload.channel.as_deref(), Some("#room"));
        let b = parse(":Alice!a@h JOIN #Room");
        assert_eq!(b[0].payload.channel.as_deref(), Some("#room"));
    }

    #[test]
    fn test_mode_channel_vs_usermode() {
        let chan = parse(":Op!o@h MODE #room +o Alice");
        let p = &chan[0].payload;
        assert_eq!(p.channel.as_deref(), Some("#room"));
        assert_eq!(p.mode.as_deref(), Some("+o"));
        assert_eq!(p.parameter.as_deref(), Some("Alice"));

        let user = parse(":Bot MODE Bot :+i");
        let p = &user[0].payload;
        assert_eq!(p.channel, None);
        assert_eq!(p.recipient.as_deref(), Some("Bot"));
        assert_eq!(p.mode.as_deref(), Some("+i"));
        assert_eq!(p.parameter, None);
    }

    #[test]
    fn test_kick_fields() {
        let out = parse(":Op!o@h KICK #room Alice :begone");
        let p = &out[0].payload;
        assert_eq!(p.channel.as_deref(), Some("#room"));
        assert_eq!(p.recipient.as_deref(), Some("Alice"));
        assert_eq!(p.message.as_deref(), Some("begone"));
    }

    #[test]
    fn test_nick_change() {
        let out = parse(":Bot!b@host NICK :Bot2");
        assert_eq!(out[0].payload.nick.as_deref(), Some("Bot2"));
        assert_eq!(out[0].payload.sender.as_ref().unwrap().nick, "Bot");
    }

    #[test]
    fn test_topic_fields() {
        let out = parse(":Alice!a@h TOPIC #room :new topic here");
        let p = &out[0].payload;
        assert_eq!(p.channel.as_deref(), Some("#room"));
        assert_eq!(p.topic.as_deref(), Some("new topic here"));
    }

    #[test]
    fn test_unknown_command_drops() {
        let out = parse(":server.example.com WALLOPS :wibble");
        assert!(out.is_empty());
    }

    #[test]
    fn test_invalid_command_token() {
        let registry = DaemonRegistry::builtin();
        let view = registry.default_view();
        let err = parse_line(":x ~~ y", &view, &NormalizePolicy::default()).unwrap_err();
        assert!(matches!(err, MessageParseError::InvalidCommand(_)));
        let err = parse_line("", &view, &NormalizePolicy::default()).unwrap_err();
        assert_eq!(err, MessageParseError::EmptyLine);
    }

    #[test]
    fn test_trailing_with_colons() {
        let out = parse(":Alice!a@h PRIVMSG #room :see: it keeps :colons");
        assert_eq!(
            out[0].payload.message.as_deref(),
            Some("see: it keeps :colons")
        );
    }

    #[test]
    fn test_normalize_idempotent() {
        let registry = DaemonRegistry::builtin();
        let view = registry.default_view();
        let policy = NormalizePolicy::default();
        for name in ["Room", "#Room", "&local", "#already-fine"] {
            let once = normalize_channel_name(name, &view, &policy);
            let twice = normalize_channel_name(&once, &view, &policy);
            assert_eq!(once, twice, "normalize not idempotent for {name}");
        }
        assert_eq!(normalize_channel_name("Room", &view, &policy), "#room");
    }

    #[test]
    fn test_normalize_policy_switches() {
        let registry = DaemonRegistry::builtin();
        let view = registry.default_view();
        let case_sensitive = NormalizePolicy {
            lowercase: false,
            autoprefix: true,
        };
        assert_eq!(
            normalize_channel_name("Room", &view, &case_sensitive),
            "#Room"
        );
        let raw = NormalizePolicy {
            lowercase: true,
            autoprefix: false,
        };
        assert_eq!(normalize_channel_name("Room", &view, &raw), "room");
    }
}
