mod config;
mod oracle;

use std::process::ExitCode;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{MediaKind, MessageKind};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use config::Config;
use oracle::{
    Catalog, Content, Ffmpeg, GoogleTts, Incoming, MenuCommand, RateLimiter, Sender, TelegramClient,
    VoiceRenderer,
};

/// Transport internals only surface at error level.
const QUIET_TARGETS: &str =
    "teloxide=error,teloxide_core=error,reqwest=error,hyper=error,hyper_util=error";

type Oracle = oracle::Dispatcher<TelegramClient, GoogleTts, Ffmpeg>;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Magic 8 Ball commands:")]
enum Command {
    #[command(description = "welcome message and menu")]
    Start,
    #[command(description = "about this bot")]
    About,
    #[command(description = "how to ask")]
    Howtouse,
}

impl From<Command> for MenuCommand {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Start => MenuCommand::Start,
            Command::About => MenuCommand::About,
            Command::Howtouse => MenuCommand::HowTo,
        }
    }
}

struct BotState {
    oracle: Oracle,
    bot_username: String,
}

fn env_filter() -> EnvFilter {
    let base = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    EnvFilter::new(format!("{base},{QUIET_TARGETS}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Secrets may live in a dotenv file next to the binary
    dotenvy::from_filename("all.env").ok();
    dotenvy::dotenv().ok();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "magic-ball.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt().with_env_filter(env_filter()).init();
            error!("Refusing to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Setup logging
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("bot.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file in {}: {e}", log_dir.display());
            return ExitCode::FAILURE;
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(env_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(env_filter()),
        )
        .init();

    info!("🚀 Starting magic-ball...");
    info!(
        "Config: {config_path}, cooldown {}s, data dir {}",
        config.cooldown.as_secs(),
        config.data_dir.display()
    );

    let bot = Bot::new(&config.telegram_bot_token);

    let tts = match GoogleTts::new(config.tts_endpoint.clone(), config.tts_timeout) {
        Ok(tts) => tts,
        Err(e) => {
            error!("Failed to build TTS client: {e}");
            return ExitCode::FAILURE;
        }
    };
    let renderer = VoiceRenderer::new(
        tts,
        Ffmpeg::new(config.ffmpeg_path.clone(), config.transcode_timeout),
        config.voice_dir(),
    );
    let oracle = Oracle::new(
        Catalog::builtin(),
        RateLimiter::new(config.cooldown, config.eviction_factor),
        renderer,
        TelegramClient::new(bot.clone()),
    );

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!("Bot user ID: {}, username: @{}", me.id, me.username());
            me.username().to_string()
        }
        Err(e) => {
            warn!("Failed to get bot info: {e}");
            String::new()
        }
    };
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register commands: {e}");
    }

    let state = Arc::new(BotState {
        oracle,
        bot_username,
    });

    // Periodic sweep on top of the limiter's own lazy eviction
    let sweeper = state.clone();
    let sweep_period = config.cooldown * config.eviction_factor;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_period);
        loop {
            interval.tick().await;
            let limiter = sweeper.oracle.limiter();
            let evicted = limiter.evict_stale(std::time::Instant::now());
            if evicted > 0 {
                debug!("Evicted {} idle users, {} still tracked", evicted, limiter.len());
            }
        }
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Stopped");
    ExitCode::SUCCESS
}

async fn handle_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(incoming) = to_incoming(&msg, &state.bot_username) else {
        return Ok(());
    };

    let user_id = incoming.sender.user_id;
    let outcome = state.oracle.handle(incoming).await;
    debug!("Message {} from {} → {:?}", msg.id, user_id, outcome);

    // Failures are handled inside the oracle; never stop the dispatcher
    Ok(())
}

fn to_incoming(msg: &Message, bot_username: &str) -> Option<Incoming> {
    let user = msg.from.as_ref()?;

    let content = match msg.text() {
        Some(text) if text.starts_with('/') => {
            // Deep-link payloads ("/start ref42") are not arguments of ours
            let head = text.split_whitespace().next().unwrap_or(text);
            match Command::parse(head, bot_username) {
                Ok(cmd) => Content::Command(cmd.into()),
                // Unknown commands (or ones addressed to another bot) are dropped
                // rather than answered as questions
                Err(_) => {
                    debug!("Ignoring unknown command {:?}", text);
                    return None;
                }
            }
        }
        Some(text) => Content::Text(text.to_string()),
        None if is_user_content(msg) => Content::Attachment,
        None => return None,
    };

    Some(Incoming {
        chat_id: msg.chat.id.0,
        sender: Sender {
            user_id: user.id.0 as i64,
            display_name: user.first_name.clone(),
            locale: user.language_code.clone(),
        },
        content,
    })
}

/// Anything a user sent without text: media, location, contact, poll, dice.
/// Service messages (joins, pins, migrations) are not.
fn is_user_content(msg: &Message) -> bool {
    match &msg.kind {
        MessageKind::Common(common) => !matches!(common.media_kind, MediaKind::Migration(_)),
        MessageKind::Dice(_) => true,
        _ => false,
    }
}
