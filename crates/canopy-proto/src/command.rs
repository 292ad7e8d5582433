//! Outbound command construction.
//!
//! Every command a session may transmit is declared in a static table of
//! parameter shapes; [`render`] validates a caller's arguments against the
//! shape and produces the wire line. Arity violations are synchronous
//! caller errors, never sent down the socket.

use crate::error::CommandError;

/// The set of wire verbs the engine can send and recognize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)] // variant names are the wire verbs
pub enum Verb {
    Pass,
    Nick,
    User,
    Oper,
    Quit,
    Join,
    Part,
    Mode,
    Topic,
    Names,
    List,
    Invite,
    Kick,
    Version,
    Stats,
    Links,
    Time,
    Connect,
    Trace,
    Admin,
    Info,
    Privmsg,
    Notice,
    Who,
    Whois,
    Whowas,
    Ping,
    Pong,
}

/// Declared shape of one positional parameter.
#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    /// Parameter name, for error messages.
    pub name: &'static str,
    /// Must be supplied.
    pub required: bool,
    /// Accepts a comma-joined list of values.
    pub list: bool,
    /// Rendered with a leading `:` (trailing free text; always last).
    pub colon: bool,
}

const fn req(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: true,
        list: false,
        colon: false,
    }
}

const fn opt(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: false,
        list: false,
        colon: false,
    }
}

const fn req_list(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: true,
        list: true,
        colon: false,
    }
}

const fn opt_list(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: false,
        list: true,
        colon: false,
    }
}

const fn req_colon(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: true,
        list: false,
        colon: true,
    }
}

const fn opt_colon(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: false,
        list: false,
        colon: true,
    }
}

impl Verb {
    /// The verb as it appears on the wire.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Verb::Pass => "PASS",
            Verb::Nick => "NICK",
            Verb::User => "USER",
            Verb::Oper => "OPER",
            Verb::Quit => "QUIT",
            Verb::Join => "JOIN",
            Verb::Part => "PART",
            Verb::Mode => "MODE",
            Verb::Topic => "TOPIC",
            Verb::Names => "NAMES",
            Verb::List => "LIST",
            Verb::Invite => "INVITE",
            Verb::Kick => "KICK",
            Verb::Version => "VERSION",
            Verb::Stats => "STATS",
            Verb::Links => "LINKS",
            Verb::Time => "TIME",
            Verb::Connect => "CONNECT",
            Verb::Trace => "TRACE",
            Verb::Admin => "ADMIN",
            Verb::Info => "INFO",
            Verb::Privmsg => "PRIVMSG",
            Verb::Notice => "NOTICE",
            Verb::Who => "WHO",
            Verb::Whois => "WHOIS",
            Verb::Whowas => "WHOWAS",
            Verb::Ping => "PING",
            Verb::Pong => "PONG",
        }
    }

    /// Map an inbound command token onto a verb, case-insensitively.
    pub fn from_wire(s: &str) -> Option<Verb> {
        let upper = s.to_ascii_uppercase();
        Some(match upper.as_str() {
            "PASS" => Verb::Pass,
            "NICK" => Verb::Nick,
            "USER" => Verb::User,
            "OPER" => Verb::Oper,
            "QUIT" => Verb::Quit,
            "JOIN" => Verb::Join,
            "PART" => Verb::Part,
            "MODE" => Verb::Mode,
            "TOPIC" => Verb::Topic,
            "NAMES" => Verb::Names,
            "LIST" => Verb::List,
            "INVITE" => Verb::Invite,
            "KICK" => Verb::Kick,
            "VERSION" => Verb::Version,
            "STATS" => Verb::Stats,
            "LINKS" => Verb::Links,
            "TIME" => Verb::Time,
            "CONNECT" => Verb::Connect,
            "TRACE" => Verb::Trace,
            "ADMIN" => Verb::Admin,
            "INFO" => Verb::Info,
            "PRIVMSG" => Verb::Privmsg,
            "NOTICE" => Verb::Notice,
            "WHO" => Verb::Who,
            "WHOIS" => Verb::Whois,
            "WHOWAS" => Verb::Whowas,
            "PING" => Verb::Ping,
            "PONG" => Verb::Pong,
            _ => return None,
        })
    }

    /// The verb's declared parameter shape, in positional order.
    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            Verb::Pass => &[req("password")],
            Verb::Nick => &[req("nickname")],
            Verb::User => &[req("user"), req("host"), req("server"), req_colon("realname")],
            Verb::Oper => &[req("user"), req("password")],
            Verb::Quit => &[opt_colon("message")],
            Verb::Join => &[req_list("channels"), opt_list("keys")],
            Verb::Part => &[req_list("channels")],
            Verb::Mode => &[req("target"), req("modes"), opt("argument")],
            Verb::Topic => &[req("channel"), opt_colon("topic")],
            Verb::Names => &[opt_list("channels")],
            Verb::List => &[opt_list("channels"), opt("server")],
            Verb::Invite => &[req("nickname"), req("channel")],
            Verb::Kick => &[req_list("channels"), req_list("users"), opt_colon("comment")],
            Verb::Version => &[opt("server")],
            Verb::Stats => &[opt("query"), opt("server")],
            Verb::Links => &[opt("remote"), opt("mask")],
            Verb::Time => &[opt("server")],
            Verb::Connect => &[req("target"), opt("port"), opt("remote")],
            Verb::Trace => &[opt("server")],
            Verb::Admin => &[opt("server")],
            Verb::Info => &[opt("server")],
            Verb::Privmsg => &[req_list("targets"), req_colon("text")],
            Verb::Notice => &[req_list("targets"), req_colon("text")],
            Verb::Who => &[opt("mask"), opt("operators")],
            Verb::Whois => &[req_list("masks")],
            Verb::Whowas => &[req("nickname"), opt("count"), opt("server")],
            Verb::Ping => &[req_colon("server")],
            Verb::Pong => &[req_colon("server"), opt("server2")],
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// One caller-supplied argument: a single value or a comma-joined list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Arg {
    /// A single value.
    One(String),
    /// Multiple values, joined with commas on the wire.
    Many(Vec<String>),
}

impl Arg {
    /// A single value.
    pub fn one(value: impl Into<String>) -> Arg {
        Arg::One(value.into())
    }

    /// A list of values.
    pub fn many<I, S>(values: I) -> Arg
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arg::Many(values.into_iter().map(Into::into).collect())
    }
}

/// Render a verb and its arguments to a wire line (no terminator).
///
/// Arguments are positional against [`Verb::params`]. Omitting a trailing
/// optional parameter is fine; omitting a required one, supplying more
/// arguments than declared, or passing a list where a single value is
/// expected fails synchronously.
pub fn render(verb: Verb, args: &[Arg]) -> Result<String, CommandError> {
    let spec = verb.params();
    if args.len() > spec.len() {
        return Err(CommandError::TooManyParameters {
            verb: verb.as_wire(),
            expected: spec.len(),
            got: args.len(),
        });
    }

    let mut out = String::from(verb.as_wire());
    for (param, arg) in spec.iter().zip(args.iter().map(Some).chain(std::iter::repeat(None))) {
        let Some(arg) = arg else {
            if param.required {
                return Err(CommandError::MissingParameter {
                    verb: verb.as_wire(),
                    param: param.name,
                });
            }
            break;
        };
        let value = match arg {
            Arg::One(v) => v.clone(),
            Arg::Many(vs) => {
                if !param.list {
                    return Err(CommandError::UnexpectedList {
                        verb: verb.as_wire(),
                        param: param.name,
                    });
                }
                vs.join(",")
            }
        };
        if value.is_empty() && param.required {
            return Err(CommandError::MissingParameter {
                verb: verb.as_wire(),
                param: param.name,
            });
        }
        out.push(' ');
        if param.colon {
            out.push(':');
        }
        out.push_str(&value);
    }
    Ok(out)
}
