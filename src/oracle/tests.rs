//! End-to-end dispatcher scenarios with in-memory pipeline stages.
//!
//! Run with: cargo test oracle

use std::path::Path;
use std::time::{Duration, Instant};

use super::catalog::{self, Catalog, Language, MenuCommand};
use super::dispatcher::{Content, Dispatcher, Incoming, Outcome, Sender};
use super::rate_limit::RateLimiter;
use super::telegram::TextFormat;
use super::telegram::fakes::{RecordingTransport, Sent};
use super::voice::VoiceRenderer;
use super::voice::fakes::{FakeTranscoder, FakeTts};

type TestDispatcher = Dispatcher<RecordingTransport, FakeTts, FakeTranscoder>;

#[derive(Default)]
struct Setup {
    tts_fail: bool,
    transcode_fail: bool,
    transport: RecordingTransport,
}

impl Setup {
    fn build(self, dir: &Path) -> TestDispatcher {
        let renderer = VoiceRenderer::new(
            FakeTts {
                fail: self.tts_fail,
                ..Default::default()
            },
            FakeTranscoder {
                fail: self.transcode_fail,
                ..Default::default()
            },
            dir.join("voices"),
        );
        Dispatcher::new(
            Catalog::builtin(),
            RateLimiter::new(Duration::from_secs(10), 6),
            renderer,
            self.transport,
        )
    }
}

fn dispatcher(dir: &Path) -> TestDispatcher {
    Setup::default().build(dir)
}

fn text(user_id: i64, locale: &str, body: &str) -> Incoming {
    Incoming {
        chat_id: user_id,
        sender: Sender {
            user_id,
            display_name: format!("user{user_id}"),
            locale: Some(locale.to_string()),
        },
        content: Content::Text(body.to_string()),
    }
}

fn with_content(user_id: i64, locale: &str, content: Content) -> Incoming {
    Incoming {
        content,
        ..text(user_id, locale, "")
    }
}

fn voices_dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir.join("voices"))
        .map(|mut d| d.next().is_none())
        .unwrap_or(true)
}

// =============================================================================
// QUESTIONS
// =============================================================================

mod questions {
    use super::*;

    #[tokio::test]
    async fn test_new_user_gets_voice_then_text() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());
        let now = Instant::now();

        let outcome = d.handle_at(text(1, "en", "Will it rain today?"), now).await;

        let Outcome::Answered(answer) = outcome else {
            panic!("expected an answer, got {outcome:?}");
        };
        assert!(Catalog::builtin().responses(Language::English).contains(&answer));

        let sent = d.transport().sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], Sent::Voice { chat_id: 1, bytes } if bytes > 0));
        assert_eq!(
            sent[1],
            Sent::Text {
                chat_id: 1,
                text: format!("🎱 {answer}"),
                format: TextFormat::Plain,
                keyboard: None,
            }
        );
        assert_eq!(d.limiter().last_seen(1), Some(now));
        assert!(voices_dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_russian_locale_gets_russian_answer() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());

        let outcome = d.handle(text(3, "ru-RU", "Сегодня пойдет дождь?")).await;
        let Outcome::Answered(answer) = outcome else {
            panic!("expected an answer, got {outcome:?}");
        };
        assert!(Catalog::builtin().responses(Language::Russian).contains(&answer));
    }

    #[tokio::test]
    async fn test_unknown_locale_falls_back_to_english() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());

        let outcome = d.handle(text(4, "de", "Wird es regnen?")).await;
        let Outcome::Answered(answer) = outcome else {
            panic!("expected an answer, got {outcome:?}");
        };
        assert!(Catalog::builtin().responses(Language::English).contains(&answer));
    }

    #[tokio::test]
    async fn test_question_mark_anywhere_counts() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());

        let outcome = d.handle(text(5, "en", "is it? maybe")).await;
        assert!(matches!(outcome, Outcome::Answered(_)));
    }
}

// =============================================================================
// RATE LIMITING
// =============================================================================

mod rate_limiting {
    use super::*;

    #[tokio::test]
    async fn test_immediate_repeat_is_rejected_without_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());
        let now = Instant::now();

        assert!(matches!(
            d.handle_at(text(1, "en", "Will it rain today?"), now).await,
            Outcome::Answered(_)
        ));
        let before = d.transport().sent().len();

        let outcome = d.handle_at(text(1, "en", "And tomorrow?"), now).await;
        assert_eq!(outcome, Outcome::RateLimited);

        let sent = d.transport().sent();
        assert_eq!(sent.len(), before + 1);
        assert_eq!(
            sent.last().unwrap(),
            &Sent::Text {
                chat_id: 1,
                text: catalog::please_wait(Language::English).to_string(),
                format: TextFormat::Plain,
                keyboard: None,
            }
        );
        assert_eq!(d.limiter().last_seen(1), Some(now));
    }

    #[tokio::test]
    async fn test_allowed_again_after_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());
        let t0 = Instant::now();

        d.handle_at(text(1, "en", "First?"), t0).await;
        assert_eq!(
            d.handle_at(text(1, "en", "Second?"), t0 + Duration::from_secs(9)).await,
            Outcome::RateLimited
        );
        assert!(matches!(
            d.handle_at(text(1, "en", "Third?"), t0 + Duration::from_secs(10)).await,
            Outcome::Answered(_)
        ));
    }

    #[tokio::test]
    async fn test_malformed_question_does_not_consume_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());
        let now = Instant::now();

        let outcome = d.handle_at(text(2, "ru", "Пойдет дождь"), now).await;
        assert_eq!(outcome, Outcome::NotAQuestion);
        assert_eq!(d.limiter().last_seen(2), None);
        assert_eq!(
            d.transport().texts(),
            vec![catalog::not_a_question(Language::Russian).to_string()]
        );

        // A real question right after is still accepted
        assert!(matches!(
            d.handle_at(text(2, "ru", "Пойдет дождь?"), now).await,
            Outcome::Answered(_)
        ));
    }

    #[tokio::test]
    async fn test_other_users_unaffected() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());
        let now = Instant::now();

        d.handle_at(text(1, "en", "Me?"), now).await;
        assert!(matches!(
            d.handle_at(text(2, "en", "Me too?"), now).await,
            Outcome::Answered(_)
        ));
    }
}

// =============================================================================
// MENU AND ATTACHMENTS
// =============================================================================

mod menu {
    use super::*;

    #[tokio::test]
    async fn test_about_label_in_russian() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());

        let outcome = d.handle(text(2, "ru", "О Боте")).await;
        assert_eq!(outcome, Outcome::Menu(MenuCommand::About));
        assert_eq!(
            d.transport().sent(),
            vec![Sent::Text {
                chat_id: 2,
                text: MenuCommand::About.reply(Language::Russian).to_string(),
                format: TextFormat::Html,
                keyboard: None,
            }]
        );
        assert_eq!(d.limiter().len(), 0);
    }

    #[tokio::test]
    async fn test_label_of_other_language_replies_in_senders_language() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());

        d.handle(text(2, "en", "❔ Как использовать")).await;
        assert_eq!(
            d.transport().texts(),
            vec![MenuCommand::HowTo.reply(Language::English).to_string()]
        );
    }

    #[tokio::test]
    async fn test_menu_bypasses_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());
        let now = Instant::now();

        d.handle_at(text(1, "en", "Yes?"), now).await;
        let outcome = d.handle_at(text(1, "en", "ℹ️ About"), now).await;
        assert_eq!(outcome, Outcome::Menu(MenuCommand::About));
        assert_eq!(d.limiter().last_seen(1), Some(now));
    }

    #[tokio::test]
    async fn test_start_sends_keyboard() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());

        let outcome = d
            .handle(with_content(9, "ru", Content::Command(MenuCommand::Start)))
            .await;
        assert_eq!(outcome, Outcome::Menu(MenuCommand::Start));
        assert_eq!(
            d.transport().sent(),
            vec![Sent::Text {
                chat_id: 9,
                text: MenuCommand::Start.reply(Language::Russian).to_string(),
                format: TextFormat::Html,
                keyboard: Some(Language::Russian),
            }]
        );
    }

    #[tokio::test]
    async fn test_ask_label_shows_welcome() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());

        let outcome = d.handle(text(9, "en", "🔮 Ask the Magic Ball")).await;
        assert_eq!(outcome, Outcome::Menu(MenuCommand::Start));
    }

    #[tokio::test]
    async fn test_attachment_gets_only_text_reply() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());

        let outcome = d.handle(with_content(4, "ru", Content::Attachment)).await;
        assert_eq!(outcome, Outcome::OnlyText);
        assert_eq!(d.transport().texts(), vec![catalog::ONLY_TEXT.to_string()]);
        assert_eq!(d.limiter().len(), 0);
    }
}

// =============================================================================
// FAILURES
// =============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_render_failure_falls_back_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let d = Setup {
            transcode_fail: true,
            ..Default::default()
        }
        .build(dir.path());

        let outcome = d.handle(text(1, "en", "Will it work?")).await;
        let Outcome::TextOnly(answer) = outcome else {
            panic!("expected text-only fallback, got {outcome:?}");
        };
        assert_eq!(d.transport().sent().len(), 1);
        assert_eq!(d.transport().texts(), vec![format!("🎱 {answer}")]);
        assert!(voices_dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_synthesis_failure_never_transcodes() {
        let dir = tempfile::tempdir().unwrap();
        let d = Setup {
            tts_fail: true,
            ..Default::default()
        }
        .build(dir.path());

        let outcome = d.handle(text(1, "en", "Hello?")).await;
        assert!(matches!(outcome, Outcome::TextOnly(_)));
        assert!(voices_dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_voice_send_failure_still_sends_text() {
        let dir = tempfile::tempdir().unwrap();
        let d = Setup {
            transport: RecordingTransport {
                fail_voice: true,
                ..Default::default()
            },
            ..Default::default()
        }
        .build(dir.path());

        let outcome = d.handle(text(1, "en", "Hello?")).await;
        assert!(matches!(outcome, Outcome::TextOnly(_)));
        assert_eq!(d.transport().texts().len(), 1);
    }

    #[tokio::test]
    async fn test_total_failure_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let d = Setup {
            tts_fail: true,
            transport: RecordingTransport {
                fail_voice: true,
                fail_text: true,
                ..Default::default()
            },
            ..Default::default()
        }
        .build(dir.path());

        let now = Instant::now();
        assert_eq!(d.handle_at(text(1, "en", "Hello?"), now).await, Outcome::Failed);
        // The dispatcher keeps working for the next message
        assert_eq!(
            d.handle_at(text(2, "en", "no question"), now).await,
            Outcome::NotAQuestion
        );
    }

    #[tokio::test]
    async fn test_concurrent_users_render_independently() {
        let dir = tempfile::tempdir().unwrap();
        let d = std::sync::Arc::new(dispatcher(dir.path()));
        let now = Instant::now();

        let tasks: Vec<_> = (1..=8)
            .map(|user| {
                let d = d.clone();
                tokio::spawn(async move { d.handle_at(text(user, "en", "Now?"), now).await })
            })
            .collect();
        for task in tasks {
            assert!(matches!(task.await.unwrap(), Outcome::Answered(_)));
        }
        assert_eq!(d.limiter().len(), 8);
        assert!(voices_dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_rate_limited_question_never_reaches_renderer() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path());
        let now = Instant::now();

        d.handle_at(text(1, "en", "One?"), now).await;
        d.handle_at(text(1, "en", "Two?"), now).await;
        d.handle_at(text(1, "en", "Three?"), now).await;

        let voices = d
            .transport()
            .sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Voice { .. }))
            .count();
        assert_eq!(voices, 1);
    }
}
