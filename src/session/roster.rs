//! Per-channel membership state.
//!
//! All mutation happens under the session's channel-state lock, from the
//! session's own ordered handlers. NAMES replies accumulate into scratch
//! maps separate from the live rosters; "end of NAMES" swaps the scratch in
//! atomically, so readers never observe a half-rebuilt roster.

use std::collections::{BTreeSet, HashMap, HashSet};

/// The privilege levels one member holds in one channel.
///
/// Empty means unvoiced.
pub type PrivilegeSet = BTreeSet<String>;

/// One channel's membership map: nickname to privilege levels.
pub type Roster = HashMap<String, PrivilegeSet>;

/// Joined channels, their rosters, stored join keys, and in-flight NAMES
/// rebuilds.
///
/// Invariant: a channel is in `joined` exactly when it has a roster in
/// `members`; the two are added and removed together.
#[derive(Debug, Default)]
pub(crate) struct ChannelState {
    joined: HashSet<String>,
    members: HashMap<String, Roster>,
    passwords: HashMap<String, String>,
    scratch: HashMap<String, Roster>,
}

impl ChannelState {
    /// We joined a channel: track it with ourselves as its only, unvoiced,
    /// member.
    pub(crate) fn join_self(&mut self, channel: &str, self_nick: &str) {
        self.joined.insert(channel.to_owned());
        let roster = self.members.entry(channel.to_owned()).or_default();
        roster.insert(self_nick.to_owned(), PrivilegeSet::new());
    }

    /// Someone else joined a channel we are in, unvoiced.
    pub(crate) fn join_other(&mut self, channel: &str, nick: &str) {
        if let Some(roster) = self.members.get_mut(channel) {
            roster.insert(nick.to_owned(), PrivilegeSet::new());
        }
    }

    /// We left (or were removed from) a channel: drop its roster, scratch,
    /// and stored password. Returns the password for a possible rejoin.
    pub(crate) fn drop_channel(&mut self, channel: &str) -> Option<String> {
        self.joined.remove(channel);
        self.members.remove(channel);
        self.scratch.remove(channel);
        self.passwords.remove(channel)
    }

    /// Someone else left one channel.
    pub(crate) fn remove_member(&mut self, channel: &str, nick: &str) {
        if let Some(roster) = self.members.get_mut(channel) {
            roster.remove(nick);
        }
    }

    /// Someone quit: remove them from every roster.
    pub(crate) fn remove_everywhere(&mut self, nick: &str) {
        for roster in self.members.values_mut() {
            roster.remove(nick);
        }
    }

    /// A nickname changed: carry its privileges over in every roster.
    pub(crate) fn rename(&mut self, old: &str, new: &str) {
        for roster in self.members.values_mut() {
            if let Some(privileges) = roster.remove(old) {
                roster.insert(new.to_owned(), privileges);
            }
        }
    }

    /// Remember a channel's join key.
    pub(crate) fn record_password(&mut self, channel: &str, key: &str) {
        self.passwords.insert(channel.to_owned(), key.to_owned());
    }

    /// Accumulate one NAMES entry into the channel's scratch roster.
    pub(crate) fn names_accumulate(&mut self, channel: &str, nick: &str, privileges: PrivilegeSet) {
        self.scratch
            .entry(channel.to_owned())
            .or_default()
            .insert(nick.to_owned(), privileges);
    }

    /// End of NAMES: atomically replace the live roster with the scratch.
    ///
    /// The scratch is discarded either way; a NAMES listing for a channel
    /// we are not in never creates a roster.
    pub(crate) fn names_commit(&mut self, channel: &str) {
        let rebuilt = self.scratch.remove(channel).unwrap_or_default();
        if self.joined.contains(channel) {
            self.members.insert(channel.to_owned(), rebuilt);
        }
    }

    /// Is this channel currently joined?
    pub(crate) fn is_joined(&self, channel: &str) -> bool {
        self.joined.contains(channel)
    }

    /// Snapshot the joined-channel names.
    pub(crate) fn joined_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.joined.iter().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot one channel's roster.
    pub(crate) fn roster(&self, channel: &str) -> Option<Roster> {
        self.members.get(channel).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn privileges<const N: usize>(names: [&str; N]) -> PrivilegeSet {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_join_and_part_keep_sets_in_step() {
        let mut state = ChannelState::default();
        state.join_self("#room", "bot");
        assert!(state.is_joined("#room"));
        assert!(state.roster("#room").is_some());

        state.join_other("#room", "Alice");
        assert_eq!(state.roster("#room").unwrap().len(), 2);

        state.drop_channel("#room");
        assert!(!state.is_joined("#room"));
        assert!(state.roster("#room").is_none());
    }

    #[test]
    fn test_drop_channel_returns_password() {
        let mut state = ChannelState::default();
        state.join_self("#room", "bot");
        state.record_password("#room", "sesame");
        assert_eq!(state.drop_channel("#room").as_deref(), Some("sesame"));
        assert_eq!(state.drop_channel("#room"), None);
    }

    #[test]
    fn test_quit_removes_from_every_roster() {
        let mut state = ChannelState::default();
        state.join_self("#a", "bot");
        state.join_self("#b", "bot");
        state.join_other("#a", "Alice");
        state.join_other("#b", "Alice");
        state.remove_everywhere("Alice");
        assert!(!state.roster("#a").unwrap().contains_key("Alice"));
        assert!(!state.roster("#b").unwrap().contains_key("Alice"));
        assert!(state.roster("#a").unwrap().contains_key("bot"));
    }

    #[test]
    fn test_rename_preserves_privileges() {
        let mut state = ChannelState::default();
        state.join_self("#room", "bot");
        state.names_accumulate("#room", "Alice", privileges(["operator"]));
        state.names_accumulate("#room", "bot", PrivilegeSet::new());
        state.names_commit("#room");

        state.rename("Alice", "Alicia");
        let roster = state.roster("#room").unwrap();
        assert!(!roster.contains_key("Alice"));
        assert_eq!(roster["Alicia"], privileges(["operator"]));
    }

    #[test]
    fn test_names_two_phase_leaves_live_roster_until_commit() {
        let mut state = ChannelState::default();
        state.join_self("#room", "bot");
        state.join_other("#room", "Stale");

        // Mid-rebuild, the live roster still shows the old membership.
        state.names_accumulate("#room", "Alice", PrivilegeSet::new());
        state.names_accumulate("#room", "Bob", privileges(["operator"]));
        let live = state.roster("#room").unwrap();
        assert!(live.contains_key("Stale"));
        assert!(!live.contains_key("Alice"));

        // Commit swaps the whole roster at once.
        state.names_commit("#room");
        let live = state.roster("#room").unwrap();
        assert!(!live.contains_key("Stale"));
        assert_eq!(live["Alice"], PrivilegeSet::new());
        assert_eq!(live["Bob"], privileges(["operator"]));
        assert!(!live.contains_key("bot"));
    }

    #[test]
    fn test_names_commit_for_unjoined_channel_is_discarded() {
        let mut state = ChannelState::default();
        state.names_accumulate("#elsewhere", "Alice", PrivilegeSet::new());
        state.names_commit("#elsewhere");
        assert!(state.roster("#elsewhere").is_none());
        assert!(!state.is_joined("#elsewhere"));
    }
}
