//! Coarse language hints from character ranges.
//!
//! This is a heuristic, not a classifier. Text is checked against a fixed
//! list of rules in priority order and the first rule that matches any
//! character wins:
//!
//! 1. Spanish/Portuguese-family Latin diacritics → [`LanguageTag::Spanish`]
//! 2. Hiragana or Katakana → [`LanguageTag::Japanese`]
//! 3. CJK Unified Ideographs → [`LanguageTag::Chinese`]
//! 4. Cyrillic → [`LanguageTag::Russian`]
//!
//! Anything else is [`LanguageTag::English`], which doubles as the
//! "unclassified Latin" tag. Kana is checked before ideographs because
//! Japanese text routinely mixes both.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse language tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LanguageTag {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "ru")]
    Russian,
}

impl LanguageTag {
    /// Short language code.
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Spanish => "es",
            Self::Japanese => "ja",
            Self::Chinese => "zh",
            Self::Russian => "ru",
        }
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

const SPANISH_MARKS: &[char] = &[
    'á', 'é', 'í', 'ó', 'ú', 'ñ', 'ü', 'ç', 'ã', 'õ', 'Á', 'É', 'Í', 'Ó', 'Ú', 'Ñ', 'Ü', 'Ç', 'Ã',
    'Õ', '¿', '¡',
];

fn is_spanish_mark(c: char) -> bool {
    SPANISH_MARKS.contains(&c)
}

fn is_kana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}')
}

fn is_cjk_ideograph(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}')
}

fn is_cyrillic(c: char) -> bool {
    matches!(c, '\u{0400}'..='\u{04FF}')
}

/// Rules in priority order.
const RULES: &[(fn(char) -> bool, LanguageTag)] = &[
    (is_spanish_mark, LanguageTag::Spanish),
    (is_kana, LanguageTag::Japanese),
    (is_cjk_ideograph, LanguageTag::Chinese),
    (is_cyrillic, LanguageTag::Russian),
];

/// Guess a language tag for `text`. Never fails.
pub fn detect(text: &str) -> LanguageTag {
    RULES
        .iter()
        .find(|(matches, _)| text.chars().any(matches))
        .map_or(LanguageTag::English, |(_, tag)| *tag)
}
