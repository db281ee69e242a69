//! DiscordHttp against a mock Discord API.

use std::io::Write;

use dbot_core::{
    ChannelId, CommandContext, CommandOptionKind, CommandSpec, GuildId, MessageId, Platform,
    ReplyTarget, User, UserId, Webhook, WebhookId,
};
use dbot_discord::DiscordHttp;
use mockito::{Matcher, Server};
use serde_json::json;

const TOKEN: &str = "test-token";

fn client(server: &Server) -> DiscordHttp {
    let bot = User {
        id: UserId(99),
        name: "storybot".into(),
        global_name: None,
        bot: true,
    };
    DiscordHttp::with_identity(TOKEN, &server.url(), bot, 42)
}

fn message_json(id: u64, author: u64) -> serde_json::Value {
    json!({
        "id": id.to_string(),
        "channel_id": "500",
        "author": {"id": author.to_string(), "username": format!("user{author}")},
        "content": format!("message {id}")
    })
}

fn hook() -> Webhook {
    Webhook {
        id: WebhookId(700),
        channel_id: ChannelId(500),
        name: Some("Keeper".into()),
        owner_id: Some(UserId(99)),
        token: Some("hooktoken".into()),
    }
}

#[tokio::test]
async fn test_connect_resolves_identity() {
    let mut server = Server::new_async().await;
    let me = server
        .mock("GET", "/users/@me")
        .match_header("authorization", "Bot test-token")
        .with_status(200)
        .with_body(r#"{"id":"99","username":"storybot","global_name":"Story Bot","bot":true}"#)
        .create_async()
        .await;
    let app = server
        .mock("GET", "/oauth2/applications/@me")
        .with_status(200)
        .with_body(r#"{"id":"42","name":"story"}"#)
        .create_async()
        .await;

    let http = DiscordHttp::connect(TOKEN, &server.url()).await.unwrap();

    me.assert_async().await;
    app.assert_async().await;
    assert_eq!(http.bot_user().id, UserId(99));
    assert_eq!(http.bot_user().display_name(), "Story Bot");
    assert_eq!(http.application_id(), 42);
}

#[tokio::test]
async fn test_channel_exists_maps_not_found() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/channels/1")
        .with_status(200)
        .with_body(r#"{"id":"1","type":0,"name":"roleplay-alice"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/channels/2")
        .with_status(404)
        .with_body(r#"{"message":"Unknown Channel","code":10003}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/channels/3")
        .with_status(500)
        .with_body("oops")
        .create_async()
        .await;
    let http = client(&server);

    assert!(http.channel_exists(ChannelId(1)).await.unwrap());
    assert!(!http.channel_exists(ChannelId(2)).await.unwrap());
    let err = http.channel_exists(ChannelId(3)).await.unwrap_err();
    assert!(matches!(err, dbot_core::PlatformError::Api { status: 500, .. }));
}

#[tokio::test]
async fn test_find_category_by_name_and_type() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/guilds/10/channels")
        .with_status(200)
        .with_body(
            json!([
                {"id": "1", "type": 0, "name": "Roleplay"},
                {"id": "2", "type": 4, "name": "General"},
                {"id": "3", "type": 4, "name": "Roleplay"}
            ])
            .to_string(),
        )
        .create_async()
        .await;
    let http = client(&server);

    assert_eq!(
        http.find_category(GuildId(10), "Roleplay").await.unwrap(),
        Some(ChannelId(3))
    );
    assert_eq!(http.find_category(GuildId(10), "Missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_message_history_pages_backwards() {
    let mut server = Server::new_async().await;
    let first_page: Vec<_> = (0..100).map(|i| message_json(1000 - i, 1)).collect();
    let second_page: Vec<_> = (0..20).map(|i| message_json(900 - i, 2)).collect();

    let first = server
        .mock("GET", "/channels/500/messages")
        .match_query(Matcher::UrlEncoded("limit".into(), "100".into()))
        .with_status(200)
        .with_body(json!(first_page).to_string())
        .create_async()
        .await;
    let second = server
        .mock("GET", "/channels/500/messages")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".into(), "50".into()),
            Matcher::UrlEncoded("before".into(), "901".into()),
        ]))
        .with_status(200)
        .with_body(json!(second_page).to_string())
        .create_async()
        .await;
    let http = client(&server);

    let history = http.message_history(ChannelId(500), 150).await.unwrap();

    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(history.len(), 120);
    assert_eq!(history[0].id, MessageId(1000));
    assert_eq!(history[119].id, MessageId(881));
    assert_eq!(history[100].author.id, UserId(2));
}

#[tokio::test]
async fn test_execute_webhook_waits_for_message() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/webhooks/700/hooktoken")
        .match_query(Matcher::UrlEncoded("wait".into(), "true".into()))
        .match_body(Matcher::PartialJson(json!({
            "content": "The lamp flickers.",
            "username": "Keeper",
            "avatar_url": "https://example.com/k.png"
        })))
        .with_status(200)
        .with_body(
            json!({
                "id": "1234",
                "channel_id": "500",
                "webhook_id": "700",
                "author": {"id": "700", "username": "Keeper", "bot": true},
                "content": "The lamp flickers."
            })
            .to_string(),
        )
        .create_async()
        .await;
    let http = client(&server);

    let id = http
        .execute_webhook(
            &hook(),
            "The lamp flickers.",
            "Keeper",
            Some("https://example.com/k.png"),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(id, MessageId(1234));
}

#[tokio::test]
async fn test_execute_webhook_without_token_fails() {
    let server = Server::new_async().await;
    let http = client(&server);
    let mut tokenless = hook();
    tokenless.token = None;

    let err = http
        .execute_webhook(&tokenless, "x", "Keeper", None)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
}

fn interaction_ctx() -> CommandContext {
    CommandContext {
        user: User::new(1, "alice"),
        guild_id: Some(GuildId(10)),
        channel_id: ChannelId(20),
        reply: ReplyTarget::Interaction {
            id: "9000".into(),
            token: "itoken".into(),
        },
    }
}

fn deferred_ctx(ephemeral: bool) -> CommandContext {
    CommandContext {
        reply: ReplyTarget::Deferred {
            token: "itoken".into(),
            ephemeral,
        },
        ..interaction_ctx()
    }
}

#[tokio::test]
async fn test_acknowledge_defers_interaction() {
    let mut server = Server::new_async().await;
    let callback = server
        .mock("POST", "/interactions/9000/itoken/callback")
        .match_body(Matcher::Json(json!({"type": 5, "data": {"flags": 64}})))
        .with_status(204)
        .create_async()
        .await;
    let http = client(&server);

    let target = http.acknowledge(&interaction_ctx(), true).await.unwrap();

    callback.assert_async().await;
    assert_eq!(
        target,
        ReplyTarget::Deferred {
            token: "itoken".into(),
            ephemeral: true
        }
    );
}

#[tokio::test]
async fn test_acknowledge_leaves_channel_target_alone() {
    let server = Server::new_async().await;
    let http = client(&server);
    let ctx = CommandContext {
        reply: ReplyTarget::Channel(ChannelId(20)),
        ..interaction_ctx()
    };

    let target = http.acknowledge(&ctx, false).await.unwrap();
    assert_eq!(target, ReplyTarget::Channel(ChannelId(20)));
}

#[tokio::test]
async fn test_respond_to_deferred_edits_original() {
    let mut server = Server::new_async().await;
    let original = server
        .mock("PATCH", "/webhooks/42/itoken/messages/@original")
        .match_body(Matcher::Json(json!({"content": "Roleplay deleted!"})))
        .with_status(200)
        .with_body(r#"{"id":"1"}"#)
        .create_async()
        .await;
    let http = client(&server);

    http.respond(&deferred_ctx(false), "Roleplay deleted!", false)
        .await
        .unwrap();

    original.assert_async().await;
}

#[tokio::test]
async fn test_respond_with_other_visibility_sends_followup() {
    let mut server = Server::new_async().await;
    let followup = server
        .mock("POST", "/webhooks/42/itoken")
        .match_body(Matcher::PartialJson(json!({"content": "done", "flags": 64})))
        .with_status(200)
        .with_body(r#"{"id":"1"}"#)
        .create_async()
        .await;
    let placeholder = server
        .mock("DELETE", "/webhooks/42/itoken/messages/@original")
        .with_status(204)
        .create_async()
        .await;
    let http = client(&server);

    http.respond(&deferred_ctx(false), "done", true).await.unwrap();

    followup.assert_async().await;
    placeholder.assert_async().await;
}

#[tokio::test]
async fn test_respond_in_channel_posts_message() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/channels/20/messages")
        .match_body(Matcher::PartialJson(json!({"content": "Roleplay deleted!"})))
        .with_status(200)
        .with_body(message_json(55, 99).to_string())
        .create_async()
        .await;
    let http = client(&server);
    let ctx = CommandContext {
        user: User::new(1, "alice"),
        guild_id: Some(GuildId(10)),
        channel_id: ChannelId(20),
        reply: ReplyTarget::Channel(ChannelId(20)),
    };

    http.respond(&ctx, "Roleplay deleted!", false).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_direct_file_refused() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/users/@me/channels")
        .match_body(Matcher::PartialJson(json!({"recipient_id": "1"})))
        .with_status(200)
        .with_body(r#"{"id":"800","type":1}"#)
        .create_async()
        .await;
    let upload = server
        .mock("POST", "/channels/800/messages")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data".into()),
        )
        .match_body(Matcher::Regex("1_roleplay_history.json".into()))
        .with_status(403)
        .with_body(r#"{"message":"Cannot send messages to this user","code":50007}"#)
        .create_async()
        .await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("1_roleplay_history.json");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"[]")
        .unwrap();
    let http = client(&server);

    let err = http
        .send_direct_file(UserId(1), "Here is your exported roleplay chat history.", &path)
        .await
        .unwrap_err();

    upload.assert_async().await;
    assert!(err.is_forbidden());
}

#[tokio::test]
async fn test_rate_limit_retries_then_gives_up() {
    let mut server = Server::new_async().await;
    let limited = server
        .mock("POST", "/channels/500/typing")
        .with_status(429)
        .with_body(r#"{"message":"You are being rate limited.","retry_after":0.01,"global":false}"#)
        .expect(4)
        .create_async()
        .await;
    let http = client(&server);

    let err = http.trigger_typing(ChannelId(500)).await.unwrap_err();

    limited.assert_async().await;
    assert!(matches!(err, dbot_core::PlatformError::Api { status: 429, .. }));
}

#[tokio::test]
async fn test_register_commands() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/applications/42/commands")
        .match_body(Matcher::Regex(r#""name":"roleplay-stop""#.into()))
        .with_status(200)
        .with_body(r#"[{"id":"1","name":"roleplay-stop"}]"#)
        .create_async()
        .await;
    let http = client(&server);
    let specs = vec![CommandSpec::new("roleplay-stop", "Stop").option(
        "export",
        "Export?",
        CommandOptionKind::Boolean,
        false,
    )];

    assert_eq!(http.register_commands(&specs).await.unwrap(), 1);
    mock.assert_async().await;
}
