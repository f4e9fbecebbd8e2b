//! Menu screens and their transitions.
//!
//! Screens are identified by the callback data of the button that opens
//! them, so no per-user state is kept between updates.

use crate::adapters::{InlineButton, InlineKeyboard};

/// Callback prefix for genre buttons
const CATEGORY_PREFIX: &str = "cat_";

/// Genre buttons shown on the categories screen
pub const CATEGORIES: &[(&str, &str)] = &[
    ("🎭 Action", "action"),
    ("❤️ Romance", "romance"),
    ("🔪 Horror", "horror"),
    ("🤣 Comedy", "comedy"),
    ("🌟 Adventure", "adventure"),
    ("🎭 Drama", "drama"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Main,
    Movies,
    Anime,
    Categories,
    Search,
    Request,
    Help,
}

/// What a button press leads to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Show(Screen),
    /// Run a tag search, e.g. `#horror`
    SearchTag(String),
}

impl Screen {
    /// Callback data that opens this screen
    pub fn callback_data(self) -> &'static str {
        match self {
            Screen::Main => "main_menu",
            Screen::Movies => "movies",
            Screen::Anime => "anime",
            Screen::Categories => "categories",
            Screen::Search => "search",
            Screen::Request => "request",
            Screen::Help => "help",
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Screen::Main => "🎬 Main Menu\nSelect an option:",
            Screen::Movies => "🎬 Movies Section\nChoose category:",
            Screen::Anime => "📺 Anime Section\nChoose category:",
            Screen::Categories => "📁 Categories\nSelect genre:",
            Screen::Search => {
                "🔍 Search\nSend /search followed by a title or a tag.\n\
                 Examples: /search naruto, /search #horror"
            }
            Screen::Request => {
                "📩 Request Content\nSend the file to this chat with a caption like:\n\
                 #movie Title\nQuality: 1080p"
            }
            Screen::Help => {
                "❓ How to Download\nFind a title with /search, then tap ⬇️ Download \
                 to open it in the archive channel."
            }
        }
    }

    pub fn keyboard(self) -> InlineKeyboard {
        let back = InlineButton::callback("↩️ Back", Screen::Main.callback_data());

        let buttons = match self {
            Screen::Main => vec![
                InlineButton::callback("🎬 Movies", Screen::Movies.callback_data()),
                InlineButton::callback("📺 Anime Series", Screen::Anime.callback_data()),
                InlineButton::callback("🔍 Search", Screen::Search.callback_data()),
                InlineButton::callback("📁 Categories", Screen::Categories.callback_data()),
                InlineButton::callback("📩 Request Content", Screen::Request.callback_data()),
                InlineButton::callback("❓ How to Download", Screen::Help.callback_data()),
            ],
            Screen::Movies => vec![
                InlineButton::callback("🎬 All Movies", "tag_movie"),
                InlineButton::callback("🎭 Genres", Screen::Categories.callback_data()),
                back,
            ],
            Screen::Anime => vec![
                InlineButton::callback("📺 Ongoing Series", "tag_ongoing"),
                InlineButton::callback("✅ Completed Series", "tag_completed"),
                InlineButton::callback("📺 All Anime", "tag_anime"),
                InlineButton::callback("🎭 Anime Genres", Screen::Categories.callback_data()),
                back,
            ],
            Screen::Categories => CATEGORIES
                .iter()
                .map(|(label, genre)| {
                    InlineButton::callback(*label, format!("{}{}", CATEGORY_PREFIX, genre))
                })
                .chain(std::iter::once(back))
                .collect(),
            Screen::Search | Screen::Request | Screen::Help => vec![back],
        };

        InlineKeyboard::single_column(buttons)
    }

    fn from_callback_data(data: &str) -> Option<Self> {
        [
            Screen::Main,
            Screen::Movies,
            Screen::Anime,
            Screen::Categories,
            Screen::Search,
            Screen::Request,
            Screen::Help,
        ]
        .into_iter()
        .find(|screen| screen.callback_data() == data)
    }
}

/// Map a button's callback data to the next step
///
/// Unknown data yields `None` and the press is only acknowledged.
pub fn transition(data: &str) -> Option<Transition> {
    if let Some(screen) = Screen::from_callback_data(data) {
        return Some(Transition::Show(screen));
    }

    let tag = data
        .strip_prefix(CATEGORY_PREFIX)
        .or_else(|| data.strip_prefix("tag_"))?;

    let valid = !tag.is_empty() && tag.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then(|| Transition::SearchTag(format!("#{}", tag.to_lowercase())))
}
