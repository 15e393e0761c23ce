//! Canned answers, menu labels and the static reply texts.
//!
//! Everything here is immutable. A [`Catalog`] is built once at startup
//! and shared by reference with the dispatcher.

/// Reply language, derived from the sender's locale hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// Primary language.
    Russian,
    /// Fallback for every locale that isn't Russian.
    English,
}

impl Language {
    /// Map a Telegram `language_code` to a reply language.
    ///
    /// Total: unknown or missing hints fall back to English.
    pub fn from_locale(hint: Option<&str>) -> Self {
        match hint {
            Some(code) if code.trim().to_lowercase().starts_with("ru") => Self::Russian,
            _ => Self::English,
        }
    }

    /// ISO 639-1 code, as understood by the speech engine.
    pub fn code(self) -> &'static str {
        match self {
            Self::Russian => "ru",
            Self::English => "en",
        }
    }

    /// Labels shown on the quick-reply keyboard, in display order.
    pub fn menu_labels(self) -> [&'static str; 3] {
        match self {
            Self::Russian => [RU_ASK, RU_ABOUT, RU_HOW],
            Self::English => [EN_ASK, EN_ABOUT, EN_HOW],
        }
    }
}

const RU_ASK: &str = "🔮 Спросить Шар Судьбы";
const RU_ABOUT: &str = "ℹ️ О Боте";
const RU_HOW: &str = "❔ Как использовать";
const EN_ASK: &str = "🔮 Ask the Magic Ball";
const EN_ABOUT: &str = "ℹ️ About";
const EN_HOW: &str = "❔ How It Works";

/// A fixed handler reachable from the keyboard or a slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    Start,
    About,
    HowTo,
}

impl MenuCommand {
    /// Match a message against the keyboard labels of both languages.
    ///
    /// The bare label without its leading glyph is accepted too, since
    /// some clients strip emoji when users type the label by hand.
    pub fn from_label(text: &str) -> Option<Self> {
        let text = text.trim();
        let table = [
            (RU_ASK, Self::Start),
            (EN_ASK, Self::Start),
            (RU_ABOUT, Self::About),
            (EN_ABOUT, Self::About),
            (RU_HOW, Self::HowTo),
            (EN_HOW, Self::HowTo),
        ];
        table.iter().find_map(|(label, cmd)| {
            let bare = label.split_once(' ').map(|(_, rest)| rest).unwrap_or(label);
            (text == *label || text == bare).then_some(*cmd)
        })
    }

    /// Static reply body (HTML).
    pub fn reply(self, lang: Language) -> &'static str {
        match (self, lang) {
            (Self::Start, Language::Russian) => {
                "🎱 Добро пожаловать в <b>Magic 8 Ball by MJFW</b>!\n\
                 Задай вопрос с ответом «да» или «нет», и я предскажу твою судьбу."
            }
            (Self::Start, Language::English) => {
                "🎱 Welcome to <b>Magic 8 Ball by MJFW</b>!\n\
                 Ask me a yes-or-no question, and I will reveal your fate."
            }
            (Self::About, Language::Russian) => {
                "🔮 Этот бот имитирует классический шар судьбы — Magic 8 Ball.\n\
                 Создан с заботой: <b>Ivan Mudriakov / MJFW</b>"
            }
            (Self::About, Language::English) => {
                "🔮 This bot simulates the classic fortune-telling toy — Magic 8 Ball.\n\
                 Created with care by <b>Ivan Mudriakov / MJFW</b>"
            }
            (Self::HowTo, Language::Russian) => {
                "❔ Просто задай вопрос, который требует ответа «да» или «нет».\n\
                 Например: <b>Сегодня пойдет дождь?</b>"
            }
            (Self::HowTo, Language::English) => {
                "❔ Just ask a yes-or-no question.\n\
                 Example: <b>Will it rain today?</b>"
            }
        }
    }

    /// Only the welcome reply carries the menu keyboard.
    pub fn shows_keyboard(self) -> bool {
        matches!(self, Self::Start)
    }
}

/// Reply to a message without a question mark (HTML).
pub fn not_a_question(lang: Language) -> &'static str {
    match lang {
        Language::Russian => "❓ Пожалуйста, задай вопрос с вопросительным знаком.",
        Language::English => "❓ Please ask a <b>yes or no</b> question ending with a question mark.",
    }
}

/// Reply to a question that arrived inside the cooldown window.
pub fn please_wait(lang: Language) -> &'static str {
    match lang {
        Language::Russian => "⏱ Подожди немного перед следующим вопросом.",
        Language::English => "⏱ Please wait a bit before asking again.",
    }
}

/// Reply to photos, stickers, voice notes and other attachments.
pub const ONLY_TEXT: &str = "❌ Only text questions are supported.";

/// Prefix of the text answer that follows the voice clip.
pub const ANSWER_PREFIX: &str = "🎱 ";

const RESPONSES_RU: [&str; 20] = [
    "😊 Без сомнений.",
    "✨ Определённо да.",
    "👍 Несомненно.",
    "✅ Да – абсолютно.",
    "👍 Можешь на это положиться.",
    "😊 Как я вижу — да.",
    "✅ Скорее всего.",
    "✨ Перспективы хорошие.",
    "😊 Да.",
    "🔮 Знаки говорят — да.",
    "🤔 Ответ туманен, попробуй снова.",
    "🕰️ Спроси позже.",
    "🤐 Лучше не говорить сейчас.",
    "🌀 Сейчас не могу предсказать.",
    "🔄 Сконцентрируйся и спроси снова.",
    "🚫 Не рассчитывай на это.",
    "🙅 Мой ответ — нет.",
    "😞 По моим данным — нет.",
    "❌ Перспективы не очень.",
    "😐 Очень сомнительно.",
];

const RESPONSES_EN: [&str; 20] = [
    "😊 It is certain.",
    "✨ It is decidedly so.",
    "👍 Without a doubt.",
    "✅ Yes – definitely.",
    "👍 You may rely on it.",
    "😊 As I see it, yes.",
    "✅ Most likely.",
    "✨ Outlook good.",
    "😊 Yes.",
    "🔮 Signs point to yes.",
    "🤔 Reply hazy, try again.",
    "🕰️ Ask again later.",
    "🤐 Better not tell you now.",
    "🌀 Cannot predict now.",
    "🔄 Concentrate and ask again.",
    "🚫 Don’t count on it.",
    "🙅 My reply is no.",
    "😞 My sources say no.",
    "❌ Outlook not so good.",
    "😐 Very doubtful.",
];

/// Language-partitioned set of canned answers.
#[derive(Debug, Clone)]
pub struct Catalog {
    russian: Vec<&'static str>,
    english: Vec<&'static str>,
}

impl Catalog {
    /// Build a catalog from explicit answer lists.
    ///
    /// Panics if either list is empty: the selector has nothing to pick from,
    /// which is a construction bug rather than a runtime condition.
    pub fn new(russian: Vec<&'static str>, english: Vec<&'static str>) -> Self {
        assert!(!russian.is_empty(), "Russian catalog must not be empty");
        assert!(!english.is_empty(), "English catalog must not be empty");
        Self { russian, english }
    }

    /// The twenty classic Magic 8 Ball answers in both languages.
    pub fn builtin() -> Self {
        Self::new(RESPONSES_RU.to_vec(), RESPONSES_EN.to_vec())
    }

    pub fn responses(&self, lang: Language) -> &[&'static str] {
        match lang {
            Language::Russian => &self.russian,
            Language::English => &self.english,
        }
    }
}
