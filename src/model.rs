use serde::{Deserialize, Serialize};

use crate::wikitext::clean::CategorySink;

/// One language × part-of-speech record extracted from a page.
///
/// Entries for the same language start as value copies of a shared base
/// record and diverge from there; nothing is shared between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word: String,
    pub lang: String,
    pub lang_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pos: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub senses: Vec<Sense>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sounds: Vec<Sound>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translations: Vec<Translation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forms: Vec<Form>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linkages: Vec<Linkage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spellings: Vec<Spelling>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_tags: Vec<String>,
}

impl WordEntry {
    pub fn new(word: &str, lang: &str, lang_code: &str) -> Self {
        Self {
            word: word.to_string(),
            lang: lang.to_string(),
            lang_code: lang_code.to_string(),
            ..Default::default()
        }
    }
}

impl CategorySink for WordEntry {
    fn add_category(&mut self, category: String) {
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
    }
}

/// One dictionary meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sense {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub glosses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_glosses: Vec<String>,
    /// Hierarchical index as authored ("2", "2.1", "1a").
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sense_index: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Example>,
}

/// A usage example attached to a sense.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub translation: String,
}

/// An alternative written form listed with the pronunciation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spelling {
    pub alternative: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    pub same_pronunciation: bool,
}

/// One pronunciation fact. Normally exactly one of the phonetic fields is set;
/// `audio` may be attached later to a record created from a transcription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sound {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ipa: String,
    /// Transcription in the edition's own phonetic system (e.g. Pinyin).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub native_pron: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub roman: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub syllabic: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub homophone: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub audio: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ogg_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mp3_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub wav_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flac_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub lang: String,
    pub lang_code: String,
    pub word: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub roman: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alt: String,
    /// Gloss text of the translation box the record came from.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sense: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sense_index: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub form: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ipa: String,
    /// Page the form was read from when it is not the entry's own page.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Linkage {
    pub word: String,
    /// Relation name such as "synonyms" or "antonyms".
    pub linkage: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sense_index: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_tags: Vec<String>,
}

/// Appends `tag` unless it is already present, keeping first-seen order.
pub(crate) fn push_unique(tags: &mut Vec<String>, tag: impl Into<String>) {
    let tag = tag.into();
    if !tag.is_empty() && !tags.contains(&tag) {
        tags.push(tag);
    }
}
