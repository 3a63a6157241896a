mod kana;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::warn;

use crate::settings::{Palette, Settings};
use crate::util::percent_encode;

pub use kana::{is_hiragana, is_katakana};

pub const DEFAULT_LOOKUP_LIMIT: usize = 10;

static SENSE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\d+\)").expect("sense marker pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Particle,
    Adverb,
    Adjective,
    Prefix,
    Other,
}

impl PartOfSpeech {
    /// Maps the major category of an IPADic feature string (`名詞,一般,...`).
    pub fn from_ipadic(feature: &str) -> Self {
        let major = feature.split(',').next().unwrap_or("").trim();
        match major {
            "名詞" => PartOfSpeech::Noun,
            "動詞" => PartOfSpeech::Verb,
            "助詞" => PartOfSpeech::Particle,
            "副詞" => PartOfSpeech::Adverb,
            "形容詞" => PartOfSpeech::Adjective,
            "接頭詞" => PartOfSpeech::Prefix,
            _ => PartOfSpeech::Other,
        }
    }

    pub fn color_role(self) -> ColorRole {
        match self {
            PartOfSpeech::Noun => ColorRole::Noun,
            PartOfSpeech::Verb => ColorRole::Verb,
            PartOfSpeech::Particle => ColorRole::Particle,
            PartOfSpeech::Adverb => ColorRole::Adverb,
            PartOfSpeech::Adjective => ColorRole::Adjective,
            PartOfSpeech::Prefix => ColorRole::Prefix,
            PartOfSpeech::Other => ColorRole::Regular,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorRole {
    Noun,
    Verb,
    Particle,
    Adverb,
    Adjective,
    Prefix,
    Regular,
}

/// One morpheme as produced by a [`Tokenizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub surface: String,
    pub reading: String,
    pub lemma: String,
    pub part_of_speech: PartOfSpeech,
}

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub reading: String,
    pub translation: String,
}

pub trait Dictionary: Send + Sync {
    fn search(&self, term: &str, limit: usize) -> Result<Vec<DictionaryEntry>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Element {
    pub text: String,
    pub transliteration: String,
    pub dictionary_form: String,
    pub part_of_speech: PartOfSpeech,
}

impl From<Token> for Element {
    fn from(token: Token) -> Self {
        Self {
            text: token.surface,
            transliteration: token.reading,
            dictionary_form: token.lemma,
            part_of_speech: token.part_of_speech,
        }
    }
}

impl Element {
    /// Display identity. Not unique: repeated words share it.
    pub fn id(&self) -> &str {
        &self.text
    }

    /// Pure kana needs no reading aid, and neither does a word already
    /// written as it is read.
    pub fn has_furigana(&self) -> bool {
        !self.text.is_empty()
            && self.text != self.transliteration
            && !is_katakana(&self.text)
            && !is_hiragana(&self.text)
    }

    /// Katakana loanwords are looked up as written; everything else by lemma
    /// so inflected forms find their headword.
    pub fn lookup_key(&self) -> &str {
        if is_katakana(&self.text) {
            &self.text
        } else {
            &self.dictionary_form
        }
    }

    pub fn color_role(&self) -> ColorRole {
        self.part_of_speech.color_role()
    }

    pub fn nihongo_url(&self) -> String {
        format!("nihongo://search/{}", percent_encode(&self.dictionary_form))
    }
}

/// Rewrites numbered senses like `(1) cat (2) feline` into a bulleted list.
pub fn translation_text(entry: &DictionaryEntry) -> String {
    SENSE_MARKER
        .replace_all(&entry.translation, "\n •")
        .into_owned()
}

/// Text as shown in the inspector: OCR line breaks become spaces.
pub fn inspector_text(text: &str) -> String {
    text.replace('\n', " ")
}

#[derive(Debug, Clone, Serialize)]
pub struct Annotation {
    pub element: Element,
    pub furigana: Option<String>,
    pub translation: Option<String>,
    pub color: String,
}

/// Tokenizer and dictionary, built once at startup.
///
/// A tokenizer that failed to build leaves the annotator usable: every text
/// then tokenizes to nothing and is shown without annotations.
pub struct Annotator {
    tokenizer: Option<Box<dyn Tokenizer>>,
    dictionary: Option<Box<dyn Dictionary>>,
    lookup_limit: usize,
    palette: Palette,
}

impl Annotator {
    pub fn new(
        tokenizer: Result<Box<dyn Tokenizer>>,
        dictionary: Option<Box<dyn Dictionary>>,
    ) -> Self {
        let tokenizer = match tokenizer {
            Ok(tokenizer) => Some(tokenizer),
            Err(err) => {
                warn!("tokenizer unavailable, annotations disabled: {:#}", err);
                None
            }
        };
        Self {
            tokenizer,
            dictionary,
            lookup_limit: DEFAULT_LOOKUP_LIMIT,
            palette: Palette::default(),
        }
    }

    pub fn with_lookup_limit(mut self, limit: usize) -> Self {
        self.lookup_limit = limit.max(1);
        self
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Applies the configured lookup limit and palette.
    pub fn with_settings(self, settings: &Settings) -> Self {
        self.with_lookup_limit(settings.dictionary_limit)
            .with_palette(settings.palette.clone())
    }

    pub fn is_available(&self) -> bool {
        self.tokenizer.is_some()
    }

    pub fn tokenize(&self, text: &str) -> Vec<Element> {
        let Some(tokenizer) = self.tokenizer.as_ref() else {
            return Vec::new();
        };
        tokenizer
            .tokenize(text)
            .into_iter()
            .map(Element::from)
            .collect()
    }

    pub fn dictionary_lookup(&self, element: &Element) -> Option<DictionaryEntry> {
        let dictionary = self.dictionary.as_ref()?;
        let key = element.lookup_key();
        let entries = match dictionary.search(key, self.lookup_limit) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("dictionary lookup failed for {}: {:#}", key, err);
                return None;
            }
        };
        if let Some(idx) = entries
            .iter()
            .position(|entry| entry.reading == element.transliteration)
        {
            return entries.into_iter().nth(idx);
        }
        entries.into_iter().next()
    }

    pub fn translation(&self, element: &Element) -> Option<String> {
        self.dictionary_lookup(element)
            .map(|entry| translation_text(&entry))
    }

    pub fn color(&self, element: &Element) -> &str {
        self.palette.color(element.color_role())
    }

    pub fn annotate(&self, text: &str) -> Vec<Annotation> {
        self.tokenize(&inspector_text(text))
            .into_iter()
            .map(|element| Annotation {
                furigana: element
                    .has_furigana()
                    .then(|| element.transliteration.clone()),
                translation: self.translation(&element),
                color: self.color(&element).to_string(),
                element,
            })
            .collect()
    }
}
