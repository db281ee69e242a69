//! Conversation window: channel history → role-tagged turns → model request.

use dbot_core::{ChannelMessage, UserId};
use prompt::{ChatMessage, MessageRole};
use storage::Session;

use crate::commands::RoleplayCommand;

/// `user` for the session owner, `assistant` for everyone else (the bot and its persona included).
pub fn role_of(message: &ChannelMessage, owner: UserId) -> MessageRole {
    if message.author.id == owner {
        MessageRole::User
    } else {
        MessageRole::Assistant
    }
}

/// Tags each message with its role, keeping the input order. Prefix commands typed in the
/// channel are not conversation and are skipped.
pub fn classify<'a>(
    history: &'a [ChannelMessage],
    owner: UserId,
    command_prefix: Option<&'a str>,
) -> impl Iterator<Item = ChatMessage> + 'a {
    history
        .iter()
        .filter(move |m| {
            !command_prefix.is_some_and(|prefix| RoleplayCommand::is_prefixed(prefix, &m.content))
        })
        .map(move |m| ChatMessage::new(role_of(m, owner), m.content.clone()))
}

/// Request for one relay: scenario system turn plus the collapsed window of `newest_first`.
pub fn build_request(
    session: &Session,
    newest_first: &[ChannelMessage],
    command_prefix: Option<&str>,
) -> Vec<ChatMessage> {
    prompt::build_roleplay_prompt(
        &session.scenario,
        classify(newest_first, session.user_id, command_prefix),
    )
}

/// Cuts `reply` to at most `max_chars` characters (not bytes).
pub fn truncate_reply(reply: &str, max_chars: usize) -> String {
    match reply.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => reply[..byte_idx].to_string(),
        None => reply.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbot_core::{ChannelId, GuildId, MessageId, User};

    const OWNER: u64 = 1;
    const BOT: u64 = 99;

    fn msg(id: u64, author: u64, content: &str) -> ChannelMessage {
        ChannelMessage {
            id: MessageId(id),
            channel_id: ChannelId(500),
            guild_id: Some(GuildId(10)),
            author: User::new(author, format!("user{author}")),
            content: content.to_string(),
            webhook_id: None,
        }
    }

    fn session() -> Session {
        Session::new(
            UserId(OWNER),
            GuildId(10),
            ChannelId(500),
            "a space station",
            "YOUR_IMAGE_URL",
            "HAL",
        )
    }

    #[test]
    fn test_role_of_owner_and_others() {
        assert_eq!(role_of(&msg(1, OWNER, "hi"), UserId(OWNER)), MessageRole::User);
        assert_eq!(role_of(&msg(2, BOT, "hi"), UserId(OWNER)), MessageRole::Assistant);
        assert_eq!(role_of(&msg(3, 7, "hi"), UserId(OWNER)), MessageRole::Assistant);
    }

    #[test]
    fn test_build_request_collapses_history() {
        // Chronological: user a, user b, assistant c, assistant d, user e. History is newest first.
        let history = vec![
            msg(5, OWNER, "e"),
            msg(4, BOT, "d"),
            msg(3, BOT, "c"),
            msg(2, OWNER, "b"),
            msg(1, OWNER, "a"),
        ];

        let request = build_request(&session(), &history, None);

        assert_eq!(request[0].role, MessageRole::System);
        assert!(request[0].content.contains("a space station"));
        assert_eq!(
            &request[1..],
            &[
                ChatMessage::user("b"),
                ChatMessage::assistant("d"),
                ChatMessage::user("e"),
            ]
        );
    }

    #[test]
    fn test_build_request_drops_welcome_message() {
        let history = vec![msg(2, OWNER, "I wake up."), msg(1, BOT, "<@1>, welcome!")];
        let request = build_request(&session(), &history, None);
        assert_eq!(request.len(), 2);
        assert_eq!(request[1], ChatMessage::user("I wake up."));
    }

    #[test]
    fn test_build_request_skips_prefix_commands() {
        let history = vec![
            msg(4, OWNER, "!roleplay-stop maybe"),
            msg(3, OWNER, "I look around."),
            msg(2, BOT, "The hatch hisses open."),
            msg(1, OWNER, "!roleplay-edit The hatch stays shut."),
            msg(0, OWNER, "I board the station."),
        ];

        let request = build_request(&session(), &history, Some("!"));
        assert_eq!(
            &request[1..],
            &[
                ChatMessage::user("I board the station."),
                ChatMessage::assistant("The hatch hisses open."),
                ChatMessage::user("I look around."),
            ]
        );

        let unfiltered = build_request(&session(), &history, None);
        assert_eq!(
            unfiltered.last(),
            Some(&ChatMessage::user("!roleplay-stop maybe"))
        );
    }

    #[test]
    fn test_truncate_reply() {
        let long = "x".repeat(2500);
        assert_eq!(truncate_reply(&long, 1900).chars().count(), 1900);
        assert_eq!(truncate_reply("short", 1900), "short");
        let exact = "y".repeat(1900);
        assert_eq!(truncate_reply(&exact, 1900), exact);
        let wide = "é".repeat(2000);
        assert_eq!(truncate_reply(&wide, 1900).chars().count(), 1900);
    }
}
