//! The session's internal ordered handlers.
//!
//! These run on the ordered worker, ahead of external ordered listeners,
//! so that by the time an ordered listener sees an event the roster already
//! reflects it. All channel-state mutation lives here, under the
//! channel-state lock; lock guards are dropped before any socket write.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, info, warn};

use canopy_proto::command::{Arg, Verb};
use canopy_proto::daemon::{classify_mode_string, Category, Detection};
use canopy_proto::event::{EventKey, Payload};

use crate::error::SessionError;
use crate::session::roster::PrivilegeSet;
use crate::session::{Session, SessionState, READY_GRACE};

// Numeric replies the session reacts to itself.
const RPL_WELCOME: u16 = 1;
const RPL_YOURHOST: u16 = 2;
const RPL_NAMREPLY: u16 = 353;
const RPL_ENDOFNAMES: u16 = 366;
const RPL_ENDOFMOTD: u16 = 376;
const ERR_NOMOTD: u16 = 422;
const ERR_NICKNAMEINUSE: u16 = 433;

impl Session {
    /// Apply one delivery to the session's own state.
    ///
    /// Symbolic and generic duplicates of the same line are ignored here;
    /// state reacts to the command/numeric delivery only.
    pub(crate) async fn apply(
        self: &Arc<Self>,
        key: &EventKey,
        payload: &Payload,
    ) -> Result<(), SessionError> {
        match key {
            EventKey::Command(verb) => self.apply_command(*verb, payload).await,
            EventKey::Numeric(code) => self.apply_numeric(*code, payload).await,
            _ => Ok(()),
        }
    }

    async fn apply_command(
        self: &Arc<Self>,
        verb: Verb,
        payload: &Payload,
    ) -> Result<(), SessionError> {
        match verb {
            Verb::Ping => {
                let token = payload
                    .server
                    .clone()
                    .unwrap_or_else(|| self.config().server.clone());
                self.command(Verb::Pong, &[Arg::one(token)]).await
            }
            Verb::Join => {
                let (Some(sender), Some(channel)) =
                    (payload.sender.as_ref(), payload.channel.as_deref())
                else {
                    return Ok(());
                };
                let me = self.current_nick();
                if sender.nick == me {
                    self.channels.lock().join_self(channel, &me);
                    debug!(channel = %channel, "joined");
                    let all_confirmed = {
                        let mut readiness = self.readiness.lock();
                        readiness.pending.remove(channel);
                        readiness.joins_issued && readiness.pending.is_empty()
                    };
                    if all_confirmed {
                        self.try_claim_ready("all channels joined");
                    }
                } else {
                    self.channels.lock().join_other(channel, &sender.nick);
                }
                Ok(())
            }
            Verb::Part => {
                let (Some(sender), Some(channel)) =
                    (payload.sender.as_ref(), payload.channel.as_deref())
                else {
                    return Ok(());
                };
                if sender.nick == self.current_nick() {
                    self.channels.lock().drop_channel(channel);
                    debug!(channel = %channel, "parted");
                } else {
                    self.channels.lock().remove_member(channel, &sender.nick);
                }
                Ok(())
            }
            Verb::Kick => {
                let (Some(channel), Some(target)) =
                    (payload.channel.as_deref(), payload.recipient.as_deref())
                else {
                    return Ok(());
                };
                if target == self.current_nick() {
                    let password = self.channels.lock().drop_channel(channel);
                    info!(channel = %channel, "kicked from channel");
                    if self.config().rejoin_on_kick {
                        self.join_channel(channel, password.as_deref()).await?;
                    }
                } else {
                    self.channels.lock().remove_member(channel, target);
                }
                Ok(())
            }
            Verb::Quit => {
                if let Some(sender) = payload.sender.as_ref() {
                    self.channels.lock().remove_everywhere(&sender.nick);
                }
                Ok(())
            }
            Verb::Nick => {
                let (Some(sender), Some(new_nick)) =
                    (payload.sender.as_ref(), payload.nick.as_deref())
                else {
                    return Ok(());
                };
                self.channels.lock().rename(&sender.nick, new_nick);
                let renamed_self = {
                    let mut nick = self.nick.write();
                    if *nick == sender.nick {
                        *nick = new_nick.to_owned();
                        true
                    } else {
                        false
                    }
                };
                if renamed_self {
                    info!(nick = %new_nick, "nickname changed");
                }
                Ok(())
            }
            Verb::Mode => self.apply_mode(payload).await,
            _ => Ok(()),
        }
    }

    /// Privilege-affecting channel modes are not parsed incrementally; the
    /// authoritative NAMES listing is re-requested and its two-phase
    /// rebuild corrects the roster. Malformed mode strings fall through to
    /// property-mode handling rather than failing the pipeline.
    async fn apply_mode(&self, payload: &Payload) -> Result<(), SessionError> {
        let (Some(channel), Some(mode)) = (payload.channel.as_deref(), payload.mode.as_deref())
        else {
            return Ok(());
        };
        if payload.parameter.is_none() {
            return Ok(());
        }
        let is_privilege = {
            let dialect = self.dialect_name();
            let view = self.registry().view(dialect.as_deref());
            match classify_mode_string(&view, mode) {
                Ok(result) => result,
                Err(e) => {
                    debug!(mode = %mode, error = %e, "malformed mode string; treating as property mode");
                    false
                }
            }
        };
        if is_privilege {
            self.command(Verb::Names, &[Arg::one(channel)]).await?;
        }
        Ok(())
    }

    async fn apply_numeric(
        self: &Arc<Self>,
        code: u16,
        payload: &Payload,
    ) -> Result<(), SessionError> {
        match code {
            // The nickname the server greets us with is authoritative.
            RPL_WELCOME => {
                if let Some(nick) = payload.recipient.as_deref() {
                    *self.nick.write() = nick.to_owned();
                }
                Ok(())
            }
            RPL_YOURHOST => {
                self.autodetect_dialect(payload);
                Ok(())
            }
            RPL_ENDOFMOTD | ERR_NOMOTD => self.begin_joins().await,
            ERR_NICKNAMEINUSE => {
                if self.is_ready() {
                    return Ok(());
                }
                let taken = payload
                    .args
                    .first()
                    .cloned()
                    .unwrap_or_else(|| self.current_nick());
                self.resolve_nick_collision(&taken).await
            }
            RPL_NAMREPLY => {
                self.accumulate_names(payload);
                Ok(())
            }
            RPL_ENDOFNAMES => {
                if let Some(raw) = payload.args.first() {
                    let channel = self.normalize(raw);
                    self.channels.lock().names_commit(&channel);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Inspect the "your host" free text for a unique dialect-name match.
    /// An explicit configured dialect, an already-detected one, or a ready
    /// session all disable detection; ambiguity keeps the default.
    fn autodetect_dialect(&self, payload: &Payload) {
        if self.config().dialect.is_some() || self.is_ready() {
            return;
        }
        if self.dialect.read().is_some() {
            return;
        }
        let Some(text) = payload.trailing.as_deref() else {
            return;
        };
        match self.registry().detect(text) {
            Detection::Unique(name) => {
                info!(dialect = %name, "server software detected");
                *self.dialect.write() = Some(name);
            }
            Detection::Ambiguous(candidates) => {
                warn!(
                    candidates = ?candidates,
                    "ambiguous server software detection; keeping default dialect"
                );
            }
            Detection::None => {}
        }
    }

    /// End of MOTD (or no MOTD): issue every configured JOIN and arm the
    /// readiness grace timer. Runs once; both numerics can arrive.
    async fn begin_joins(self: &Arc<Self>) -> Result<(), SessionError> {
        let channels: Vec<(String, Option<String>)> = self
            .config()
            .channels
            .iter()
            .map(|entry| (self.normalize(entry.name()), entry.key().map(str::to_owned)))
            .collect();
        {
            let mut readiness = self.readiness.lock();
            if readiness.joins_issued {
                return Ok(());
            }
            readiness.joins_issued = true;
            readiness.pending = channels.iter().map(|(name, _)| name.clone()).collect();
        }
        *self.state.write() = SessionState::Joining;
        info!(count = channels.len(), "registration complete; joining channels");
        for (name, key) in &channels {
            self.join_channel(name, key.as_deref()).await?;
        }

        self.arm_ready_timer();
        if channels.is_empty() {
            self.try_claim_ready("no channels configured");
        }
        Ok(())
    }

    /// Arm the readiness grace timer; it races the join-confirmation path
    /// for the one-shot ready claim.
    pub(crate) fn arm_ready_timer(self: &Arc<Self>) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(READY_GRACE).await;
            session.try_claim_ready("grace period elapsed");
        });
    }

    /// Nickname collision before readiness: GHOST the conflicting nick via
    /// services when we can, else fall back to the configured strategy.
    async fn resolve_nick_collision(&self, taken: &str) -> Result<(), SessionError> {
        let can_ghost =
            self.config().nickserv_password.is_some() && !self.config().suppress_ghost;
        if can_ghost && !self.ghost_attempted.swap(true, Ordering::SeqCst) {
            let password = self.config().nickserv_password.clone().unwrap_or_default();
            info!(nick = %taken, "nickname in use; ghosting via NickServ");
            self.privmsg("NickServ", &format!("GHOST {} {}", taken, password))
                .await?;
            self.command(Verb::Nick, &[Arg::one(taken)]).await?;
            *self.nick.write() = taken.to_owned();
            return Ok(());
        }
        match self.nick_strategy.next_nick(taken) {
            Some(next) => {
                info!(taken = %taken, next = %next, "nickname in use; retrying");
                self.command(Verb::Nick, &[Arg::one(next.as_str())]).await?;
                *self.nick.write() = next;
                Ok(())
            }
            None => {
                warn!(nick = %taken, "nickname collision unresolved; registration stalled");
                Ok(())
            }
        }
    }

    /// Fold one NAMES reply into the channel's scratch roster. Entries keep
    /// every leading sigil the dialect knows as a privilege prefix.
    fn accumulate_names(&self, payload: &Payload) {
        let Some(raw_channel) = payload.args.last() else {
            return;
        };
        let channel = self.normalize(raw_channel);
        let Some(listing) = payload.trailing.as_deref() else {
            return;
        };
        let dialect = self.dialect_name();
        let view = self.registry().view(dialect.as_deref());
        let mut channels = self.channels.lock();
        for entry in listing.split_ascii_whitespace() {
            let mut privileges = PrivilegeSet::new();
            let mut rest = entry;
            while let Some(c) = rest.chars().next() {
                match view.get(Category::UserPrefix, c) {
                    Some(name) => {
                        privileges.insert(name.to_owned());
                        rest = &rest[c.len_utf8()..];
                    }
                    None => break,
                }
            }
            if rest.is_empty() {
                continue;
            }
            channels.names_accumulate(&channel, rest, privileges);
        }
    }
}
