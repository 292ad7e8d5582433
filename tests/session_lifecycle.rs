//! Session lifecycle against a scripted server: registration, channel
//! joins, readiness, roster maintenance, and teardown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use canopy::{DaemonRegistry, Session, SessionConfig, SessionError};
use common::{wait_for, FakeServer, Peer};
use tokio::task::JoinHandle;
use tokio::time::timeout;

async fn start(
    config: SessionConfig,
) -> (Arc<Session>, Peer, JoinHandle<Result<(), SessionError>>) {
    common::init_tracing();
    let (server, addr) = FakeServer::bind().await;
    let mut config = config;
    config.port = addr.port();
    let session = Session::new(config, Arc::new(DaemonRegistry::builtin()));
    let runner = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.run().await })
    };
    let peer = server.accept().await;
    (session, peer, runner)
}

#[tokio::test]
async fn handshake_join_and_ready() {
    let config = SessionConfig::new("127.0.0.1", "bot").channel("Room");
    let (session, mut peer, runner) = start(config).await;

    let user = peer.expect("USER").await;
    assert_eq!(user, "USER bot 0 * :bot");
    let nick = peer.expect("NICK").await;
    assert_eq!(nick, "NICK bot");

    peer.welcome("bot").await;

    // The configured channel is normalized before the JOIN goes out.
    let join = peer.expect("JOIN").await;
    assert_eq!(join, "JOIN #room");
    assert!(!session.is_ready());

    peer.send(":bot!bot@localhost JOIN :#room").await;
    wait_for("session ready", || session.is_ready()).await;
    assert_eq!(session.joined_channels(), vec!["#room".to_string()]);

    // We are our channel's only member, unvoiced.
    let roster = session.channel_members("#room").expect("roster");
    assert!(roster["bot"].is_empty());

    // Server closes the link; the read loop observes EOF and run returns.
    drop(peer);
    let result = timeout(Duration::from_secs(5), runner)
        .await
        .expect("run did not finish")
        .expect("run panicked");
    assert!(result.is_ok());
}

#[tokio::test]
async fn names_two_phase_rebuild() {
    let config = SessionConfig::new("127.0.0.1", "bot").channel("room");
    let (session, mut peer, _runner) = start(config).await;

    peer.expect("NICK").await;
    peer.welcome("bot").await;
    peer.expect("JOIN").await;
    peer.send(":bot!bot@localhost JOIN :#room").await;
    wait_for("ready", || session.is_ready()).await;

    peer.send(":test.server 353 bot = #room :Alice @Bob").await;
    peer.send(":test.server 366 bot #room :End of /NAMES list.")
        .await;

    wait_for("roster rebuilt", || {
        session
            .channel_members("#room")
            .is_some_and(|r| r.contains_key("Bob"))
    })
    .await;

    let roster = session.channel_members("#room").unwrap();
    assert_eq!(roster.len(), 2);
    assert!(roster["Alice"].is_empty());
    assert!(roster["Bob"].contains("operator"));
    // The pre-NAMES member list (just us) was replaced wholesale.
    assert!(!roster.contains_key("bot"));
}

#[tokio::test]
async fn nick_rename_carries_privileges() {
    let config = SessionConfig::new("127.0.0.1", "bot").channel("room");
    let (session, mut peer, _runner) = start(config).await;

    peer.expect("NICK").await;
    peer.welcome("bot").await;
    peer.expect("JOIN").await;
    peer.send(":bot!bot@localhost JOIN :#room").await;
    peer.send(":test.server 353 bot = #room :@bot Alice").await;
    peer.send(":test.server 366 bot #room :End of /NAMES list.")
        .await;
    wait_for("roster", || {
        session
            .channel_members("#room")
            .is_some_and(|r| r.contains_key("Alice"))
    })
    .await;

    // Our own rename updates the session nick and the roster key.
    peer.send(":bot!bot@localhost NICK :bot2").await;
    wait_for("self rename", || session.current_nick() == "bot2").await;
    let roster = session.channel_members("#room").unwrap();
    assert!(roster["bot2"].contains("operator"));
    assert!(!roster.contains_key("bot"));

    // Peer renames carry privileges too.
    peer.send(":Alice!a@h NICK :Alicia").await;
    wait_for("peer rename", || {
        session
            .channel_members("#room")
            .is_some_and(|r| r.contains_key("Alicia"))
    })
    .await;
    assert!(!session.channel_members("#room").unwrap().contains_key("Alice"));
}

#[tokio::test]
async fn kick_rejoins_with_stored_key() {
    let mut config = SessionConfig::new("127.0.0.1", "bot").channel_with_key("room", "sesame");
    config.rejoin_on_kick = true;
    let (session, mut peer, _runner) = start(config).await;

    peer.expect("NICK").await;
    peer.welcome("bot").await;
    let join = peer.expect("JOIN").await;
    assert_eq!(join, "JOIN #room sesame");
    peer.send(":bot!bot@localhost JOIN :#room").await;
    wait_for("ready", || session.is_ready()).await;

    peer.send(":op!op@h KICK #room bot :off you go").await;
    // The stored key is replayed on the automatic rejoin.
    let rejoin = peer.expect("JOIN").await;
    assert_eq!(rejoin, "JOIN #room sesame");

    peer.send(":bot!bot@localhost JOIN :#room").await;
    wait_for("rejoined", || {
        session.joined_channels() == vec!["#room".to_string()]
    })
    .await;
}

#[tokio::test]
async fn kick_of_peer_only_trims_roster() {
    let config = SessionConfig::new("127.0.0.1", "bot").channel("room");
    let (session, mut peer, _runner) = start(config).await;

    peer.expect("NICK").await;
    peer.welcome("bot").await;
    peer.expect("JOIN").await;
    peer.send(":bot!bot@localhost JOIN :#room").await;
    peer.send(":Alice!a@h JOIN :#room").await;
    wait_for("peer joined", || {
        session
            .channel_members("#room")
            .is_some_and(|r| r.contains_key("Alice"))
    })
    .await;

    peer.send(":op!op@h KICK #room Alice :bye").await;
    wait_for("peer kicked", || {
        session
            .channel_members("#room")
            .is_some_and(|r| !r.contains_key("Alice"))
    })
    .await;
    assert_eq!(session.joined_channels(), vec!["#room".to_string()]);
}

#[tokio::test]
async fn nick_collision_falls_back_to_underscore() {
    let config = SessionConfig::new("127.0.0.1", "bot");
    let (session, mut peer, _runner) = start(config).await;

    let first = peer.expect("NICK").await;
    assert_eq!(first, "NICK bot");
    peer.send(":test.server 433 * bot :Nickname is already in use.")
        .await;

    let retry = peer.expect("NICK").await;
    assert_eq!(retry, "NICK bot_");
    peer.welcome("bot_").await;

    // No channels configured: readiness follows straight from end of MOTD.
    wait_for("ready", || session.is_ready()).await;
    assert_eq!(session.current_nick(), "bot_");
}

#[tokio::test]
async fn dialect_autodetected_from_welcome() {
    let config = SessionConfig::new("127.0.0.1", "bot");
    let (session, mut peer, _runner) = start(config).await;

    peer.expect("NICK").await;
    peer.send(":test.server 001 bot :Welcome to the test network")
        .await;
    peer.send(":test.server 002 bot :Your host is test.server, running version UnrealIRCd-6.1.2")
        .await;
    peer.send(":test.server 376 bot :End of /MOTD command.")
        .await;

    wait_for("ready", || session.is_ready()).await;
    assert_eq!(session.dialect_name().as_deref(), Some("Unreal"));
}

#[tokio::test]
async fn nick_collision_ghosts_when_services_password_configured() {
    let mut config = SessionConfig::new("127.0.0.1", "bot");
    config.nickserv_password = Some("hunter2".into());
    let (_session, mut peer, _runner) = start(config).await;

    peer.expect("NICK").await;
    peer.send(":test.server 433 * bot :Nickname is already in use.")
        .await;

    // Ghost the squatter via services and re-request our nick.
    let ghost = peer.expect("PRIVMSG NickServ").await;
    assert_eq!(ghost, "PRIVMSG NickServ :GHOST bot hunter2");
    let retry = peer.expect("NICK").await;
    assert_eq!(retry, "NICK bot");

    // Ghosting is tried once; a second collision falls back to the strategy.
    peer.send(":test.server 433 * bot :Nickname is already in use.")
        .await;
    let fallback = peer.expect("NICK").await;
    assert_eq!(fallback, "NICK bot_");
}

#[tokio::test]
async fn privilege_mode_triggers_names_refresh() {
    let config = SessionConfig::new("127.0.0.1", "bot").channel("room");
    let (session, mut peer, _runner) = start(config).await;

    peer.expect("NICK").await;
    peer.welcome("bot").await;
    peer.expect("JOIN").await;
    peer.send(":bot!bot@localhost JOIN :#room").await;
    wait_for("ready", || session.is_ready()).await;

    // A privilege change is not parsed incrementally; the authoritative
    // NAMES listing is re-requested instead.
    peer.send(":op!op@h MODE #room +o Alice").await;
    let names = peer.expect("NAMES").await;
    assert_eq!(names, "NAMES #room");

    // Property modes with a parameter do not trigger a refresh.
    peer.send(":op!op@h MODE #room +k sesame").await;
    assert!(
        peer.recv_within(Duration::from_millis(300)).await.is_none(),
        "property mode should not re-request NAMES"
    );
}

#[tokio::test]
async fn quit_closes_the_link() {
    let config = SessionConfig::new("127.0.0.1", "bot");
    let (session, mut peer, runner) = start(config).await;

    peer.expect("NICK").await;
    peer.welcome("bot").await;
    wait_for("ready", || session.is_ready()).await;

    session.quit(Some("bye for now")).await.expect("quit");
    let quit = peer.expect("QUIT").await;
    assert_eq!(quit, "QUIT :bye for now");

    drop(peer);
    let result = timeout(Duration::from_secs(5), runner)
        .await
        .expect("run did not finish")
        .expect("run panicked");
    assert!(result.is_ok());

    // The session is inert now; sends fail synchronously.
    assert!(matches!(
        session.privmsg("#room", "hi").await,
        Err(SessionError::NotConnected)
    ));
}

#[tokio::test]
async fn quit_of_peer_leaves_every_roster() {
    let config = SessionConfig::new("127.0.0.1", "bot")
        .channel("alpha")
        .channel("beta");
    let (session, mut peer, _runner) = start(config).await;

    peer.expect("NICK").await;
    peer.welcome("bot").await;
    peer.send(":bot!bot@localhost JOIN :#alpha").await;
    peer.send(":bot!bot@localhost JOIN :#beta").await;
    peer.send(":Alice!a@h JOIN :#alpha").await;
    peer.send(":Alice!a@h JOIN :#beta").await;
    wait_for("alice everywhere", || {
        ["#alpha", "#beta"].iter().all(|c| {
            session
                .channel_members(c)
                .is_some_and(|r| r.contains_key("Alice"))
        })
    })
    .await;

    peer.send(":Alice!a@h QUIT :gone").await;
    wait_for("alice gone", || {
        ["#alpha", "#beta"].iter().all(|c| {
            session
                .channel_members(c)
                .is_some_and(|r| !r.contains_key("Alice"))
        })
    })
    .await;
}

#[tokio::test]
async fn pings_are_answered() {
    let config = SessionConfig::new("127.0.0.1", "bot");
    let (_session, mut peer, _runner) = start(config).await;

    peer.expect("NICK").await;
    peer.send("PING :test.server").await;
    let pong = peer.expect("PONG").await;
    assert_eq!(pong, "PONG :test.server");
}
