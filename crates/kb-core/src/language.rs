//! Character-class language detection for queries.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Coarse language category of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "multi")]
    Multilingual,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Chinese => "zh",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::Multilingual => "multi",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

pub const DEFAULT_CJK_THRESHOLD: f32 = 0.3;

const SPANISH_CHARS: &[char] = &['ñ', 'á', 'é', 'í', 'ó', 'ú', 'ü', '¿', '¡'];
const FRENCH_CHARS: &[char] = &['à', 'â', 'ä', 'é', 'è', 'ê', 'ë', 'ï', 'î', 'ô', 'ù', 'û', 'ü', 'ÿ', 'ç'];

/// True for code points in the CJK unified ideograph blocks (base, ext A-E).
pub fn is_cjk_ideograph(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2B73F
            | 0x2B740..=0x2B81F
            | 0x2B820..=0x2CEAF
    )
}

/// Stateless detector; `threshold` is the CJK ratio at which text counts as Chinese.
#[derive(Debug, Clone, Copy)]
pub struct LanguageDetector {
    threshold: f32,
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self { threshold: DEFAULT_CJK_THRESHOLD }
    }
}

impl LanguageDetector {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn detect(&self, text: &str) -> Language {
        let text = text.trim();
        if text.is_empty() {
            return Language::English;
        }

        let mut total = 0usize;
        let mut cjk = 0usize;
        let mut spanish = 0usize;
        let mut french = 0usize;
        for c in text.chars() {
            total += 1;
            if is_cjk_ideograph(c) {
                cjk += 1;
            }
            if SPANISH_CHARS.contains(&c) {
                spanish += 1;
            }
            if FRENCH_CHARS.contains(&c) {
                french += 1;
            }
        }
        let cjk_ratio = cjk as f32 / total as f32;

        if cjk_ratio >= self.threshold {
            debug!(cjk_ratio, "detected Chinese");
            return Language::Chinese;
        }
        if spanish > 0 && spanish >= french {
            debug!(spanish, "detected Spanish");
            return Language::Spanish;
        }
        if french > 0 {
            debug!(french, "detected French");
            return Language::French;
        }

        let indicators = [cjk_ratio > 0.05, spanish > 0, french > 0]
            .into_iter()
            .filter(|hit| *hit)
            .count();
        if indicators >= 2 {
            debug!("detected multilingual content");
            return Language::Multilingual;
        }
        Language::English
    }

    pub fn detect_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Language> {
        texts.iter().map(|t| self.detect(t.as_ref())).collect()
    }

    pub fn is_chinese(&self, text: &str) -> bool {
        self.detect(text) == Language::Chinese
    }

    pub fn is_english(&self, text: &str) -> bool {
        self.detect(text) == Language::English
    }
}

/// Detect with the default threshold.
pub fn detect(text: &str) -> Language {
    LanguageDetector::default().detect(text)
}
