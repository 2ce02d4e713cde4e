//! Structured lexical data from Wiktionary wikitext.
//!
//! `parse_page` walks one page's section tree (language, part of speech,
//! subsections) and returns one `WordEntry` per language × part of speech.
//! Per-edition conventions live in YAML profiles under `schema/`.

pub mod audio;
pub mod config;
pub mod context;
pub mod error;
pub mod extractor;
pub mod langcodes;
pub mod model;
pub mod parallel;
pub mod store;
pub mod tags;
pub mod wikitext;

pub use config::{builtin_profile, EditionProfile, ExtractorConfig};
pub use context::Context;
pub use error::{Error, Result};
pub use extractor::parse_page;
pub use model::{Example, Form, Linkage, Sense, Sound, Spelling, Translation, WordEntry};
pub use store::{Page, PageStore};
