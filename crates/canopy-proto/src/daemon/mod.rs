//! Server-software dialect profiles and their registry.
//!
//! IRC daemons disagree about mode letters, privilege prefixes, and what
//! the numeric replies mean. A [`Dialect`] captures one daemon's profile;
//! the [`DaemonRegistry`] holds every known profile plus a fallback profile
//! built as the conflict-free union of all of them. Lookups on a named
//! profile consult the merged (own ∪ fallback) view with the profile's own
//! entries taking precedence; lookups on the fallback degrade unknown codes
//! to their literal character or number instead of erroring.

mod profiles;

use std::collections::HashMap;

use crate::error::ModeParseError;

pub use profiles::builtin_profiles;

/// The six single-character code categories a dialect maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// Modes applied to a user (`+i`, `+w`, ...).
    UserMode,
    /// Channel modes that grant a member a privilege (`+o`, `+v`, ...).
    Privilege,
    /// Nickname sigils in NAMES output (`@`, `+`, ...).
    UserPrefix,
    /// Leading characters marking a channel name (`#`, `&`, ...).
    ChannelPrefix,
    /// Property modes applied to a channel (`+m`, `+t`, ...).
    ChannelMode,
    /// Server notice masks and other server-level modes.
    ServerMode,
}

impl Category {
    /// All categories, in merge order.
    pub const ALL: [Category; 6] = [
        Category::UserMode,
        Category::Privilege,
        Category::UserPrefix,
        Category::ChannelPrefix,
        Category::ChannelMode,
        Category::ServerMode,
    ];
}

/// One server-software profile: six code maps plus the numeric-reply map.
///
/// Immutable after construction. The registry's fallback profile is the only
/// one that accumulates entries as later profiles register.
#[derive(Clone, Debug, Default)]
pub struct Dialect {
    name: String,
    usermode: HashMap<char, String>,
    privilege: HashMap<char, String>,
    user_prefix: HashMap<char, String>,
    channel_prefix: HashMap<char, String>,
    channel_mode: HashMap<char, String>,
    server_mode: HashMap<char, String>,
    replies: HashMap<u16, String>,
}

impl Dialect {
    /// Start building a profile with the given name.
    pub fn builder(name: impl Into<String>) -> DialectBuilder {
        DialectBuilder {
            dialect: Dialect {
                name: name.into(),
                ..Dialect::default()
            },
        }
    }

    /// The profile name (e.g. `"Unreal"`).
    pub fn name(&self) -> &str {
        &self.name
    }

    fn category(&self, cat: Category) -> &HashMap<char, String> {
        match cat {
            Category::UserMode => &self.usermode,
            Category::Privilege => &self.privilege,
            Category::UserPrefix => &self.user_prefix,
            Category::ChannelPrefix => &self.channel_prefix,
            Category::ChannelMode => &self.channel_mode,
            Category::ServerMode => &self.server_mode,
        }
    }

    fn category_mut(&mut self, cat: Category) -> &mut HashMap<char, String> {
        match cat {
            Category::UserMode => &mut self.usermode,
            Category::Privilege => &mut self.privilege,
            Category::UserPrefix => &mut self.user_prefix,
            Category::ChannelPrefix => &mut self.channel_prefix,
            Category::ChannelMode => &mut self.channel_mode,
            Category::ServerMode => &mut self.server_mode,
        }
    }
}

/// Builder for [`Dialect`] descriptor data.
pub struct DialectBuilder {
    dialect: Dialect,
}

impl DialectBuilder {
    /// Add entries to one of the six code categories.
    pub fn codes<const N: usize>(mut self, cat: Category, entries: [(char, &str); N]) -> Self {
        let map = self.dialect.category_mut(cat);
        for (code, name) in entries {
            map.insert(code, name.to_owned());
        }
        self
    }

    /// Add numeric-reply names.
    pub fn replies<const N: usize>(mut self, entries: [(u16, &str); N]) -> Self {
        for (code, name) in entries {
            self.dialect.replies.insert(code, name.to_owned());
        }
        self
    }

    /// Finish the profile.
    pub fn build(self) -> Dialect {
        self.dialect
    }
}

/// Outcome of matching server-version text against registered profile names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Detection {
    /// Exactly one profile name appeared in the text.
    Unique(String),
    /// Two or more profile names appeared; auto-detection is ambiguous.
    Ambiguous(Vec<String>),
    /// No profile name appeared.
    None,
}

/// Process-lifetime registry of dialect profiles.
///
/// Constructed once at startup and passed by reference to every component
/// that needs dialect lookups.
#[derive(Debug, Default)]
pub struct DaemonRegistry {
    profiles: Vec<Dialect>,
    fallback: Dialect,
    // Keys that ever conflicted stay excluded from the fallback, even if a
    // third profile later re-registers one of the contested values.
    conflicted: HashMap<Category, std::collections::HashSet<char>>,
    conflicted_replies: std::collections::HashSet<u16>,
}

impl DaemonRegistry {
    /// An empty registry; the fallback profile starts with no entries.
    pub fn new() -> Self {
        DaemonRegistry {
            profiles: Vec::new(),
            fallback: Dialect::builder("default").build(),
            conflicted: HashMap::new(),
            conflicted_replies: std::collections::HashSet::new(),
        }
    }

    /// A registry pre-loaded with the built-in profiles.
    pub fn builtin() -> Self {
        let mut registry = DaemonRegistry::new();
        for dialect in builtin_profiles() {
            registry.register(dialect);
        }
        registry
    }

    /// Register a profile and fold it into the fallback.
    ///
    /// For every category (and the reply map): a key the fallback does not
    /// yet carry is added; a key it carries with the same value is left as
    /// registered first; a key it carries with a *different* value is a
    /// conflict and is removed from the fallback entirely.
    pub fn register(&mut self, dialect: Dialect) {
        for cat in Category::ALL {
            let incoming = dialect.category(cat).clone();
            let dead = self.conflicted.entry(cat).or_default();
            let target = self.fallback.category_mut(cat);
            for (code, name) in incoming {
                if dead.contains(&code) {
                    continue;
                }
                match target.get(&code) {
                    None => {
                        target.insert(code, name);
                    }
                    Some(existing) if *existing == name => {}
                    Some(_) => {
                        target.remove(&code);
                        dead.insert(code);
                    }
                }
            }
        }
        for (code, name) in dialect.replies.clone() {
            if self.conflicted_replies.contains(&code) {
                continue;
            }
            match self.fallback.replies.get(&code) {
                None => {
                    self.fallback.replies.insert(code, name);
                }
                Some(existing) if *existing == name => {}
                Some(_) => {
                    self.fallback.replies.remove(&code);
                    self.conflicted_replies.insert(code);
                }
            }
        }
        self.profiles.push(dialect);
    }

    /// Look up a profile by name; returns its merged view.
    pub fn lookup(&self, name: &str) -> Option<DialectView<'_>> {
        self.profiles.iter().find(|d| d.name == name).map(|d| DialectView {
            own: Some(d),
            fallback: &self.fallback,
        })
    }

    /// The fallback view.
    pub fn default_view(&self) -> DialectView<'_> {
        DialectView {
            own: None,
            fallback: &self.fallback,
        }
    }

    /// A view for the named profile, or the fallback when the name is
    /// absent or unknown.
    pub fn view(&self, name: Option<&str>) -> DialectView<'_> {
        name.and_then(|n| self.lookup(n))
            .unwrap_or_else(|| self.default_view())
    }

    /// Registered profile names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|d| d.name.as_str())
    }

    /// Match free text (typically the 002 "your host" reply) against every
    /// registered profile name by exact substring.
    pub fn detect(&self, text: &str) -> Detection {
        let matches: Vec<String> = self
            .profiles
            .iter()
            .filter(|d| text.contains(&d.name))
            .map(|d| d.name.clone())
            .collect();
        match matches.len() {
            0 => Detection::None,
            1 => Detection::Unique(matches.into_iter().next().unwrap_or_default()),
            _ => Detection::Ambiguous(matches),
        }
    }
}

/// A read view over one profile merged with the fallback.
///
/// The profile's own entries take precedence. A view with no own profile is
/// the fallback view, whose `resolve` lookups degrade unknown codes to their
/// literal character/number.
#[derive(Clone, Copy, Debug)]
pub struct DialectView<'a> {
    own: Option<&'a Dialect>,
    fallback: &'a Dialect,
}

impl<'a> DialectView<'a> {
    /// The name of the underlying profile (`"default"` for the fallback).
    pub fn name(&self) -> &'a str {
        self.own.map_or_else(|| self.fallback.name(), Dialect::name)
    }

    /// Merged lookup: the symbolic name for a code, if known.
    pub fn get(&self, cat: Category, code: char) -> Option<&'a str> {
        self.own
            .and_then(|d| d.category(cat).get(&code))
            .or_else(|| self.fallback.category(cat).get(&code))
            .map(String::as_str)
    }

    /// Merged membership test.
    pub fn knows(&self, cat: Category, code: char) -> bool {
        self.get(cat, code).is_some()
    }

    /// Resolve a code to its symbolic name, degrading to the literal
    /// character when unknown.
    pub fn resolve(&self, cat: Category, code: char) -> String {
        self.get(cat, code)
            .map_or_else(|| code.to_string(), str::to_owned)
    }

    /// Merged lookup of a numeric reply's symbolic name.
    pub fn reply_name(&self, code: u16) -> Option<&'a str> {
        self.own
            .and_then(|d| d.replies.get(&code))
            .or_else(|| self.fallback.replies.get(&code))
            .map(String::as_str)
    }

    /// Resolve a numeric reply, degrading to the bare number when unknown.
    pub fn resolve_reply(&self, code: u16) -> String {
        self.reply_name(code)
            .map_or_else(|| code.to_string(), str::to_owned)
    }

    /// True when `c` marks the start of a channel name under this dialect.
    pub fn is_channel_prefix(&self, c: char) -> bool {
        self.knows(Category::ChannelPrefix, c)
    }
}

/// Decide whether a mode string changes member privileges.
///
/// The string must be a `+`/`-` sign followed by one or more word
/// characters; anything else is a [`ModeParseError`]. Returns true only
/// when every letter is a privilege code in the merged view.
pub fn classify_mode_string(view: &DialectView<'_>, mode: &str) -> Result<bool, ModeParseError> {
    let mut chars = mode.chars();
    let sign = chars.next().ok_or(ModeParseError::MissingModeModifier)?;
    if sign != '+' && sign != '-' {
        return Err(ModeParseError::InvalidModeModifier { modifier: sign });
    }
    let letters: Vec<char> = chars.collect();
    if letters.is_empty() {
        return Err(ModeParseError::EmptyModeLetters);
    }
    if let Some(bad) = letters
        .iter()
        .find(|c| !c.is_ascii_alphanumeric() && **c != '_')
    {
        return Err(ModeParseError::InvalidModeLetter { letter: *bad });
    }
    Ok(letters
        .iter()
        .all(|c| view.knows(Category::Privilege, *c)))
}
