//! Built-in dialect descriptor data.
//!
//! The base profile carries the RFC 1459/2812 numeric table and mode
//! letters; the daemon-specific profiles layer on their extensions. Entries
//! that genuinely diverge across daemons (Unreal's `+f` flood protection vs.
//! Charybdis' `+f` forward target, for instance) are what exercise the
//! registry's conflict rule.

use super::{Category, Dialect};

/// All built-in profiles, in registration order (base profile first so its
/// values win ties in the fallback).
pub fn builtin_profiles() -> Vec<Dialect> {
    vec![rfc1459(), unreal(), bahamut(), charybdis()]
}

fn rfc1459() -> Dialect {
    Dialect::builder("RFC1459")
        .codes(
            Category::UserMode,
            [
                ('i', "invisible"),
                ('s', "server_notices"),
                ('w', "wallops"),
                ('o', "operator"),
            ],
        )
        .codes(Category::Privilege, [('o', "operator"), ('v', "voice")])
        .codes(Category::UserPrefix, [('@', "operator"), ('+', "voice")])
        .codes(Category::ChannelPrefix, [('#', "network"), ('&', "local")])
        .codes(
            Category::ChannelMode,
            [
                ('o', "operator"),
                ('v', "voice"),
                ('b', "ban"),
                ('i', "invite_only"),
                ('k', "key"),
                ('l', "limit"),
                ('m', "moderated"),
                ('n', "no_outside_messages"),
                ('p', "private"),
                ('s', "secret"),
                ('t', "topic_lock"),
            ],
        )
        .replies([
            (1, "welcome"),
            (2, "your_host"),
            (3, "created"),
            (4, "my_info"),
            (5, "isupport"),
            (200, "trace_link"),
            (201, "trace_connecting"),
            (202, "trace_handshake"),
            (203, "trace_unknown"),
            (204, "trace_operator"),
            (205, "trace_user"),
            (206, "trace_server"),
            (208, "trace_newtype"),
            (211, "stats_link_info"),
            (212, "stats_commands"),
            (219, "end_of_stats"),
            (221, "user_mode_is"),
            (242, "stats_uptime"),
            (243, "stats_oline"),
            (251, "luser_client"),
            (252, "luser_op"),
            (253, "luser_unknown"),
            (254, "luser_channels"),
            (255, "luser_me"),
            (256, "admin_me"),
            (257, "admin_loc1"),
            (258, "admin_loc2"),
            (259, "admin_email"),
            (261, "trace_log"),
            (301, "away"),
            (302, "userhost"),
            (303, "ison"),
            (305, "un_away"),
            (306, "now_away"),
            (311, "whois_user"),
            (312, "whois_server"),
            (313, "whois_operator"),
            (314, "whowas_user"),
            (315, "end_of_who"),
            (317, "whois_idle"),
            (318, "end_of_whois"),
            (319, "whois_channels"),
            (321, "list_start"),
            (322, "list"),
            (323, "list_end"),
            (324, "channel_mode_is"),
            (331, "no_topic"),
            (332, "topic"),
            (341, "inviting"),
            (351, "version"),
            (352, "who_reply"),
            (353, "name_reply"),
            (364, "links"),
            (365, "end_of_links"),
            (366, "end_of_names"),
            (367, "ban_list"),
            (368, "end_of_ban_list"),
            (369, "end_of_whowas"),
            (371, "info"),
            (372, "motd"),
            (374, "end_of_info"),
            (375, "motd_start"),
            (376, "end_of_motd"),
            (381, "youre_oper"),
            (382, "rehashing"),
            (391, "time"),
            (401, "no_such_nick"),
            (402, "no_such_server"),
            (403, "no_such_channel"),
            (404, "cannot_send_to_channel"),
            (405, "too_many_channels"),
            (406, "was_no_such_nick"),
            (407, "too_many_targets"),
            (409, "no_origin"),
            (411, "no_recipient"),
            (412, "no_text_to_send"),
            (421, "unknown_command"),
            (422, "no_motd"),
            (431, "no_nickname_given"),
            (432, "erroneous_nickname"),
            (433, "nickname_in_use"),
            (436, "nick_collision"),
            (441, "user_not_in_channel"),
            (442, "not_on_channel"),
            (443, "user_on_channel"),
            (451, "not_registered"),
            (461, "need_more_params"),
            (462, "already_registered"),
            (464, "password_mismatch"),
            (465, "youre_banned"),
            (467, "key_set"),
            (471, "channel_is_full"),
            (472, "unknown_mode"),
            (473, "invite_only_channel"),
            (474, "banned_from_channel"),
            (475, "bad_channel_key"),
            (481, "no_privileges"),
            (482, "channel_op_privileges_needed"),
            (483, "cant_kill_server"),
            (491, "no_oper_host"),
            (501, "user_mode_unknown_flag"),
            (502, "users_dont_match"),
        ])
        .build()
}

fn unreal() -> Dialect {
    Dialect::builder("Unreal")
        .codes(
            Category::UserMode,
            [
                ('x', "masked_host"),
                ('B', "bot"),
                ('S', "service"),
                ('d', "deaf"),
                ('R', "registered_only"),
                ('T', "no_ctcp"),
            ],
        )
        .codes(
            Category::Privilege,
            [
                ('q', "owner"),
                ('a', "admin"),
                ('o', "operator"),
                ('h', "half_operator"),
                ('v', "voice"),
            ],
        )
        .codes(
            Category::UserPrefix,
            [
                ('~', "owner"),
                ('&', "admin"),
                ('@', "operator"),
                ('%', "half_operator"),
                ('+', "voice"),
            ],
        )
        .codes(Category::ChannelPrefix, [('#', "network"), ('&', "local")])
        .codes(
            Category::ChannelMode,
            [
                ('c', "no_colors"),
                ('f', "flood_protection"),
                ('z', "secure_only"),
                ('N', "no_nick_changes"),
                ('S', "strip_colors"),
                ('T', "no_notices"),
            ],
        )
        .codes(
            Category::ServerMode,
            [
                ('c', "connects"),
                ('k', "kills"),
                ('e', "errors"),
                ('o', "oper_up"),
            ],
        )
        .replies([(307, "whois_registered_nick"), (378, "whois_host")])
        .build()
}

fn bahamut() -> Dialect {
    Dialect::builder("Bahamut")
        .codes(
            Category::UserMode,
            [('d', "deaf"), ('R', "registered_only"), ('x', "squelch")],
        )
        .codes(Category::Privilege, [('o', "operator"), ('v', "voice")])
        .codes(Category::UserPrefix, [('@', "operator"), ('+', "voice")])
        .codes(Category::ChannelPrefix, [('#', "network"), ('&', "local")])
        .codes(
            Category::ChannelMode,
            [('c', "no_colors"), ('j', "join_throttle"), ('M', "modreg")],
        )
        .replies([(307, "whois_registered_nick")])
        .build()
}

fn charybdis() -> Dialect {
    Dialect::builder("Charybdis")
        .codes(
            Category::UserMode,
            [
                ('d', "deaf"),
                ('g', "caller_id"),
                ('Q', "no_forwarding"),
                ('x', "masked_host"),
            ],
        )
        .codes(Category::Privilege, [('o', "operator"), ('v', "voice")])
        .codes(Category::UserPrefix, [('@', "operator"), ('+', "voice")])
        .codes(Category::ChannelPrefix, [('#', "network"), ('&', "local")])
        .codes(
            Category::ChannelMode,
            [
                ('f', "forward"),
                ('j', "join_throttle"),
                ('q', "quiet"),
                ('r', "registered_only"),
                ('g', "free_invite"),
            ],
        )
        .replies([(478, "ban_list_full")])
        .build()
}
