//! Random congratulation sentences for successful submissions

use fastrand::Rng;

/// Language of the congratulation sentence
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lang {
    #[default]
    English,
    French,
}

impl Lang {
    /// `fr` (or `fr_FR`, `fr:en`...) selects French, anything else English
    pub fn from_language_tag(tag: &str) -> Self {
        if tag.trim().to_ascii_lowercase().starts_with("fr") {
            Lang::French
        } else {
            Lang::English
        }
    }
}

const EN_BEGIN: &[&str] = &["Congrats", "Nice job", "Well done", "Spot on", "Bravo", "Good"];
const EN_END: &[&str] = &[
    "Your exercise is OK",
    "Right answer",
    "Looks good to me",
    "Your answer is correct",
    "Correct answer",
];
const FR_BEGIN: &[&str] = &["Joli", "Bravo", "Bon boulot", "Bien joué", "Super", "Génial", "Bien"];
const FR_END: &[&str] = &[
    "Belle implémentation",
    "Bonne réponse",
    "C'est juste",
    "C'est bon pour moi",
    "Cette réponse est correcte",
    "C'est correct",
];
const DECORATIONS: &[&str] = &["", "", "", "", "", "🚀", "🎉", "🙌", "🏆", "🥇", "🎯", "💯"];

/// A congratulation sentence in the language named by `$LANGUAGE`
pub fn congrats_from_env() -> String {
    let tag = std::env::var("LANGUAGE").unwrap_or_default();
    congrats(Lang::from_language_tag(&tag))
}

pub fn congrats(lang: Lang) -> String {
    congrats_with(lang, &mut Rng::new())
}

/// Same as [`congrats`] with a caller-provided random source
pub fn congrats_with(lang: Lang, rng: &mut Rng) -> String {
    // French typography puts a space before the exclamation marks
    let (begin, end, sep) = match lang {
        Lang::English => (EN_BEGIN, EN_END, ""),
        Lang::French => (FR_BEGIN, FR_END, " "),
    };
    let first = rng.choice(begin.iter().copied()).unwrap_or("Bravo");
    let second = rng.choice(end.iter().copied()).unwrap_or("");
    let first_bangs = "!".repeat(rng.usize(1..=5));
    let second_bangs = "!".repeat(rng.usize(1..=5));
    let decoration = rng.choice(DECORATIONS.iter().copied()).unwrap_or("");

    format!("{first}{sep}{first_bangs} {second}{sep}{second_bangs} {decoration}")
        .trim()
        .to_string()
}
