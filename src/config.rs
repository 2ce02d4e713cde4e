//! Run configuration and per-edition lookup tables.
//!
//! Every static table the extractors consult (POS names, section titles,
//! language names, tag translations, template names) lives in a YAML profile
//! under `schema/`. The built-in profiles are compiled into the binary and
//! parsed once; `--schema` swaps in a profile file at runtime.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const BUILTIN_SCHEMAS: &[(&str, &str)] = &[
    ("de", include_str!("../schema/de.yaml")),
    ("es", include_str!("../schema/es.yaml")),
    ("nl", include_str!("../schema/nl.yaml")),
    ("pl", include_str!("../schema/pl.yaml")),
    ("zh", include_str!("../schema/zh.yaml")),
];

static BUILTIN_PROFILES: OnceCell<BTreeMap<String, EditionProfile>> = OnceCell::new();

// === Run configuration ===

/// Caller-selectable switches for one extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Dictionary edition the dump comes from ("de", "zh", ...).
    pub edition: String,
    /// Only language sections whose code is listed here are extracted.
    pub capture_language_codes: Option<Vec<String>>,
    pub capture_pronunciation: bool,
    pub capture_translations: bool,
    pub capture_linkages: bool,
    pub capture_inflections: bool,
    pub capture_examples: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            edition: String::new(),
            capture_language_codes: None,
            capture_pronunciation: true,
            capture_translations: true,
            capture_linkages: true,
            capture_inflections: true,
            capture_examples: true,
        }
    }
}

impl ExtractorConfig {
    pub fn for_edition(edition: &str) -> Self {
        Self {
            edition: edition.to_string(),
            ..Default::default()
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    pub fn captures_language(&self, lang_code: &str) -> bool {
        match &self.capture_language_codes {
            Some(codes) => codes.iter().any(|code| code == lang_code),
            None => true,
        }
    }
}

// === Heading recognition ===

/// How a language section announces its language.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LanguageHeading {
    /// `== Haus ({{Sprache|Deutsch}}) ==`: the language name is argument 1.
    TemplateArgument { template: String },
    /// `== {{=nld=}} ==`: the code is the template name stripped of `trim`.
    TemplateNameCode { trim: String },
    /// `== słownik ({{język polski}}) ==`: the name follows a fixed prefix.
    TemplateNamePrefix { prefix: String },
    /// `==漢語==`: the heading text is the language name.
    HeadingText,
}

/// How a part-of-speech section announces its part of speech.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PosHeading {
    TemplateArgument { template: String },
    TemplateName,
    HeadingText,
    /// No POS headings; an italic line inside the glosses section names it.
    GlossLine,
}

/// Where subsections met before any POS heading are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanSections {
    #[default]
    Skip,
    /// Into the language's base record, so later POS entries inherit them.
    Base,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKind {
    Glosses,
    Pronunciation,
    Translations,
    Forms,
    Examples,
    Linkage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateRole {
    GlossQualifier,
    Audio,
    Homophones,
    PronunciationVariants,
    TranslationEntry,
    TranslationNeeded,
    TranslationSense,
    TranslationSubpage,
    MultiTranslation,
    FormGrid,
    PrincipalParts,
    ConjugationGrid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SectionTitles {
    pub glosses: Vec<String>,
    pub pronunciation: Vec<String>,
    pub translations: Vec<String>,
    pub forms: Vec<String>,
    pub examples: Vec<String>,
    /// Section title → relation name.
    pub linkages: BTreeMap<String, String>,
}

// === Per-extractor rules ===

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlossRules {
    /// Bracket pairs that may enclose a leading sense index, e.g. "[]".
    pub index_brackets: Vec<String>,
    pub qualifier_templates: Vec<String>,
    /// List prefix marking a sense-modifier line; empty disables modifiers.
    pub modifier_prefix: String,
    /// Accept an unbracketed leading index such as "1" or "2.3".
    pub bare_index: bool,
    pub preposition_arg: Option<String>,
    pub case_arg: Option<String>,
}

impl Default for GlossRules {
    fn default() -> Self {
        Self {
            index_brackets: vec!["[]".to_string()],
            qualifier_templates: Vec::new(),
            modifier_prefix: String::new(),
            bare_index: false,
            preposition_arg: None,
            case_arg: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VariantArgs {
    pub region: String,
    pub ipa: Vec<String>,
    pub audio: String,
    pub roman: String,
    pub syllabic: String,
    /// Region value meaning "no region".
    pub none_value: String,
    /// Alternative spelling with the same pronunciation.
    pub spelling: String,
    /// Variant spelling pronounced differently.
    pub variant_spelling: String,
    /// Suffix turning a spelling key into its note key (`gnota`).
    pub note_suffix: String,
}

impl VariantArgs {
    /// Classifies a spelling key as `(same_pronunciation, is_note)`.
    pub fn spelling_field(&self, field: &str) -> Option<(bool, bool)> {
        for (prefix, same) in [(&self.spelling, true), (&self.variant_spelling, false)] {
            if prefix.is_empty() {
                continue;
            }
            if field == prefix.as_str() {
                return Some((same, false));
            }
            if !self.note_suffix.is_empty()
                && field.strip_prefix(prefix.as_str()) == Some(self.note_suffix.as_str())
            {
                return Some((same, true));
            }
        }
        None
    }
}

impl Default for VariantArgs {
    fn default() -> Self {
        Self {
            region: "pron".to_string(),
            ipa: vec!["fone".to_string(), "fono".to_string()],
            audio: "audio".to_string(),
            roman: "tl".to_string(),
            syllabic: "ts".to_string(),
            none_value: "no".to_string(),
            spelling: "g".to_string(),
            variant_spelling: "v".to_string(),
            note_suffix: "nota".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PronunciationRules {
    pub audio_prefix: String,
    /// Item prefixes that mark a pure tag line.
    pub tag_prefixes: Vec<String>,
    pub homophone_markers: Vec<String>,
    pub homophone_tag: String,
    pub homophone_templates: Vec<String>,
    pub audio_templates: Vec<String>,
    pub audio_arg: usize,
    /// Language whose trailing audio only attaches to a sibling transcription.
    pub strict_audio_language: Option<String>,
    /// Language whose transcriptions go to `native_pron` instead of `ipa`.
    pub native_language: Option<String>,
    pub tag_split_pattern: String,
    pub tag_strip_chars: String,
    pub strip_suffixes: Vec<String>,
    /// Boilerplate removed from the end of an item's rendered text.
    pub drop_suffixes: Vec<String>,
    pub variant_templates: Vec<String>,
    pub variant_args: VariantArgs,
    #[serde(skip)]
    tag_split: Option<Regex>,
}

impl Default for PronunciationRules {
    fn default() -> Self {
        Self {
            audio_prefix: "File:".to_string(),
            tag_prefixes: Vec::new(),
            homophone_markers: Vec::new(),
            homophone_tag: "homophone".to_string(),
            homophone_templates: Vec::new(),
            audio_templates: Vec::new(),
            audio_arg: 2,
            strict_audio_language: None,
            native_language: None,
            tag_split_pattern: ", ".to_string(),
            tag_strip_chars: "() \n".to_string(),
            strip_suffixes: Vec::new(),
            drop_suffixes: Vec::new(),
            variant_templates: Vec::new(),
            variant_args: VariantArgs::default(),
            tag_split: None,
        }
    }
}

impl PronunciationRules {
    /// Splits a tag phrase into individual tags.
    pub fn split_tags(&self, text: &str) -> Vec<String> {
        let mut text = text.trim();
        for suffix in &self.strip_suffixes {
            text = text.strip_suffix(suffix.as_str()).unwrap_or(text);
        }
        let text = text.trim_matches(|c: char| self.tag_strip_chars.contains(c));
        let parts: Vec<&str> = match &self.tag_split {
            Some(pattern) => pattern.split(text).collect(),
            None => text.split(self.tag_split_pattern.as_str()).collect(),
        };
        parts
            .into_iter()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslationRules {
    pub entry_templates: Vec<String>,
    pub needed_templates: Vec<String>,
    pub sense_templates: Vec<String>,
    pub subpage_templates: Vec<String>,
    /// Subpage templates whose first argument names the target section.
    pub section_subpage_templates: Vec<String>,
    pub subpage_suffix: String,
    pub multi_templates: Vec<String>,
    pub multi_data_arg: String,
    pub gender_class: String,
    pub roman_class_prefix: String,
    /// Gender abbreviation → canonical tags.
    pub genders: BTreeMap<String, Vec<String>>,
}

impl Default for TranslationRules {
    fn default() -> Self {
        Self {
            entry_templates: Vec::new(),
            needed_templates: Vec::new(),
            sense_templates: Vec::new(),
            subpage_templates: Vec::new(),
            section_subpage_templates: Vec::new(),
            subpage_suffix: String::new(),
            multi_templates: Vec::new(),
            multi_data_arg: "data".to_string(),
            gender_class: "gender".to_string(),
            roman_class_prefix: "tr ".to_string(),
            genders: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeaderPrefix {
    pub prefix: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalPart {
    pub arg: usize,
    #[serde(default)]
    pub ipa_arg: Option<usize>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalParts {
    pub template: String,
    pub forms: Vec<PrincipalPart>,
    /// Appended to the page title to find the conjugation subpage.
    pub subpage_suffix: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InflectionRules {
    pub grid_templates: Vec<String>,
    pub ignored_row_headers: Vec<String>,
    pub conjugation_templates: Vec<String>,
    /// CSS class that marks a data cell as a header cell.
    pub header_class: String,
    pub header_prefixes: Vec<HeaderPrefix>,
    pub principal_parts: Option<PrincipalParts>,
}

// === Edition profile ===

#[derive(Debug, Clone, Deserialize)]
pub struct EditionProfile {
    pub edition: String,
    #[serde(default = "default_template_namespace")]
    pub template_namespace: String,
    #[serde(default)]
    pub category_namespaces: Vec<String>,
    #[serde(default)]
    pub file_namespaces: Vec<String>,
    /// Heading level given to a line holding only a section-title template.
    #[serde(default)]
    pub section_template_level: Option<u8>,
    pub language_heading: LanguageHeading,
    pub pos_heading: PosHeading,
    #[serde(default)]
    pub sections_before_pos: OrphanSections,
    /// Lists directly under a POS heading are gloss lists.
    #[serde(default)]
    pub glosses_in_pos_section: bool,
    #[serde(default)]
    pub pos: BTreeMap<String, String>,
    #[serde(default)]
    pub form_pos: BTreeSet<String>,
    #[serde(default)]
    pub ignore_pos: BTreeSet<String>,
    #[serde(default)]
    pub sections: SectionTitles,
    /// Language display name → language code.
    #[serde(default)]
    pub languages: BTreeMap<String, String>,
    #[serde(default)]
    pub unknown_language_code: Option<String>,
    /// Raw tag → canonical tags.
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub gloss: GlossRules,
    #[serde(default)]
    pub pronunciation: PronunciationRules,
    #[serde(default)]
    pub translation: TranslationRules,
    #[serde(default)]
    pub inflection: InflectionRules,

    #[serde(skip)]
    section_table: BTreeMap<String, SectionKind>,
    #[serde(skip)]
    template_table: BTreeMap<String, TemplateRole>,
}

fn default_template_namespace() -> String {
    "Template".to_string()
}

impl EditionProfile {
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let profile: EditionProfile = serde_yaml::from_str(contents)?;
        profile.finish()
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Builds the dispatch tables and compiles patterns.
    fn finish(mut self) -> Result<Self> {
        let mut sections = BTreeMap::new();
        let titled = [
            (&self.sections.glosses, SectionKind::Glosses),
            (&self.sections.pronunciation, SectionKind::Pronunciation),
            (&self.sections.translations, SectionKind::Translations),
            (&self.sections.forms, SectionKind::Forms),
            (&self.sections.examples, SectionKind::Examples),
        ];
        for (titles, kind) in titled {
            for title in titles {
                sections.entry(title.clone()).or_insert_with(|| kind.clone());
            }
        }
        for (title, relation) in &self.sections.linkages {
            sections
                .entry(title.clone())
                .or_insert_with(|| SectionKind::Linkage(relation.clone()));
        }
        self.section_table = sections;

        let mut templates = BTreeMap::new();
        let mut register = |names: &[String], role: TemplateRole| {
            for name in names {
                templates.entry(name.to_lowercase()).or_insert(role);
            }
        };
        register(&self.gloss.qualifier_templates, TemplateRole::GlossQualifier);
        register(&self.pronunciation.audio_templates, TemplateRole::Audio);
        register(&self.pronunciation.homophone_templates, TemplateRole::Homophones);
        register(
            &self.pronunciation.variant_templates,
            TemplateRole::PronunciationVariants,
        );
        register(&self.translation.entry_templates, TemplateRole::TranslationEntry);
        register(&self.translation.needed_templates, TemplateRole::TranslationNeeded);
        register(&self.translation.sense_templates, TemplateRole::TranslationSense);
        register(&self.translation.subpage_templates, TemplateRole::TranslationSubpage);
        register(&self.translation.multi_templates, TemplateRole::MultiTranslation);
        register(&self.inflection.grid_templates, TemplateRole::FormGrid);
        register(
            &self.inflection.conjugation_templates,
            TemplateRole::ConjugationGrid,
        );
        if let Some(parts) = &self.inflection.principal_parts {
            register(std::slice::from_ref(&parts.template), TemplateRole::PrincipalParts);
        }
        self.template_table = templates;

        let pattern = self.pronunciation.tag_split_pattern.clone();
        let compiled = Regex::new(&pattern).map_err(|source| Error::PatternFailed {
            pattern: pattern.clone(),
            source,
        })?;
        self.pronunciation.tag_split = Some(compiled);
        Ok(self)
    }

    pub fn section_kind(&self, title: &str) -> Option<&SectionKind> {
        self.section_table.get(title.trim())
    }

    pub fn template_role(&self, name: &str) -> Option<TemplateRole> {
        self.template_table.get(&name.trim().to_lowercase()).copied()
    }

    pub fn is_category_namespace(&self, namespace: &str) -> bool {
        namespace.eq_ignore_ascii_case("category")
            || self
                .category_namespaces
                .iter()
                .any(|ns| ns.eq_ignore_ascii_case(namespace))
    }

    pub fn is_file_namespace(&self, namespace: &str) -> bool {
        namespace.eq_ignore_ascii_case("file")
            || namespace.eq_ignore_ascii_case("image")
            || self
                .file_namespaces
                .iter()
                .any(|ns| ns.eq_ignore_ascii_case(namespace))
    }
}

/// Returns the compiled-in profile for `edition`, parsing all built-ins on
/// first use.
pub fn builtin_profile(edition: &str) -> Result<&'static EditionProfile> {
    let profiles = BUILTIN_PROFILES.get_or_try_init(|| {
        BUILTIN_SCHEMAS
            .iter()
            .map(|(code, yaml)| Ok((code.to_string(), EditionProfile::from_yaml_str(yaml)?)))
            .collect::<Result<BTreeMap<_, _>>>()
    })?;
    profiles
        .get(edition)
        .ok_or_else(|| Error::UnknownEdition(edition.to_string()))
}

pub fn builtin_editions() -> impl Iterator<Item = &'static str> {
    BUILTIN_SCHEMAS.iter().map(|(code, _)| *code)
}
