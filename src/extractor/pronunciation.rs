//! Pronunciation sections.
//!
//! Each list item is classified from its rendered text as an audio file, a
//! tag line, a homophone group or a "tags: transcription" pair. Tags thread
//! down the list nesting by value. An audio-only item does not create a
//! record of its own: it is attached to the nearest earlier transcription
//! that still lacks audio and whose tag context matches.

use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use regex::Regex;

use crate::audio::{audio_sound, set_audio};
use crate::config::TemplateRole;
use crate::context::Context;
use crate::model::{push_unique, Sound, Spelling, WordEntry};
use crate::tags::translate_raw_tags;
use crate::wikitext::{Node, NodeKind, ParamKey, WikiNode};

lazy_static! {
    static ref VARIANT_KEY: Regex = Regex::new(r"^(\d*)([a-z]+)(\d*)$").unwrap();
}

/// What one list item contributed.
enum ItemData {
    Audio(String),
    Sound(Sound),
    Tags(Vec<String>),
    Homophones,
}

pub fn extract_pronunciation(ctx: &Context<'_>, entry: &mut WordEntry, nodes: &[Node]) {
    let start = entry.sounds.len();
    let mut walker = Walker { ctx, entry, start };
    for node in nodes.iter().filter_map(Node::as_element) {
        match node.kind {
            NodeKind::Heading(_) => {}
            NodeKind::Template => walker.section_template(node),
            _ => walker.walk(node, &[]),
        }
    }
    walker.finish();
}

/// Handles a pronunciation template met outside a pronunciation list, such
/// as a `pron-graf` box at the top of a language section.
pub fn extract_pronunciation_template(ctx: &Context<'_>, entry: &mut WordEntry, node: &WikiNode) {
    let start = entry.sounds.len();
    let mut walker = Walker { ctx, entry, start };
    walker.section_template(node);
    walker.finish();
}

struct Walker<'w, 'c, 'a> {
    ctx: &'c Context<'a>,
    entry: &'w mut WordEntry,
    /// First sound added by this section; audio never attaches above it.
    start: usize,
}

impl Walker<'_, '_, '_> {
    fn finish(self) {
        let profile = self.ctx.profile();
        for sound in &mut self.entry.sounds[self.start..] {
            translate_raw_tags(profile, &mut sound.tags, &mut sound.raw_tags);
        }
    }

    fn section_template(&mut self, node: &WikiNode) {
        let profile = self.ctx.profile();
        match profile.template_role(&node.template_name()) {
            Some(TemplateRole::PronunciationVariants) => self.variants(node),
            Some(TemplateRole::Audio) => {
                let filename = node.template_arg_text(profile.pronunciation.audio_arg);
                let sound = audio_sound(&filename);
                if !sound.audio.is_empty() {
                    self.entry.sounds.push(sound);
                }
            }
            Some(TemplateRole::Homophones) => self.homophones([node], &[]),
            _ => {
                let expanded = self.ctx.expand_node(node);
                for child in expanded.children.iter().filter_map(Node::as_element) {
                    self.walk(child, &[]);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // List walk
    // ─────────────────────────────────────────────────────────────

    fn walk(&mut self, node: &WikiNode, tags: &[String]) {
        if node.kind != NodeKind::ListItem {
            for child in node.children.iter().filter_map(Node::as_element) {
                self.walk(child, tags);
            }
            return;
        }

        let used: Vec<Node> = node.invert_find_child(NodeKind::List).cloned().collect();
        let rest: Vec<&WikiNode> = node.find_child(NodeKind::List).collect();
        match self.classify(&used, tags) {
            ItemData::Audio(filename) => self.attach_audio(&filename, tags),
            ItemData::Sound(sound) => {
                let inherited = match sound.raw_tags.split_last() {
                    Some((_, prefix)) => prefix.to_vec(),
                    None => Vec::new(),
                };
                self.entry.sounds.push(sound);
                for list in rest {
                    self.walk(list, &inherited);
                }
            }
            ItemData::Tags(new_tags) => {
                for list in rest {
                    self.walk(list, &new_tags);
                }
            }
            ItemData::Homophones => {
                self.homophones(used.iter().filter_map(Node::as_element), tags);
                for list in rest {
                    self.walk(list, tags);
                }
            }
        }
    }

    fn classify(&self, used: &[Node], tags: &[String]) -> ItemData {
        let profile = self.ctx.profile();
        let rules = &profile.pronunciation;
        let text_nodes: Vec<Node> = used
            .iter()
            .filter(|node| self.audio_template(node).is_none())
            .cloned()
            .collect();
        let mut text = self.ctx.clean(&text_nodes);
        for suffix in &rules.drop_suffixes {
            if let Some(stripped) = text.strip_suffix(suffix.as_str()) {
                text = stripped.trim_end().to_string();
            }
        }

        if !rules.audio_prefix.is_empty() {
            if let Some(filename) = text.strip_prefix(rules.audio_prefix.as_str()) {
                return ItemData::Audio(filename.trim().to_string());
            }
        }
        if rules.tag_prefixes.iter().any(|prefix| text.starts_with(prefix.as_str())) {
            return ItemData::Tags(combine_tags(tags, &rules.split_tags(&text)));
        }
        if rules.homophone_markers.iter().any(|marker| text.starts_with(marker.as_str())) {
            return ItemData::Homophones;
        }

        let (tag_text, transcription) = match text.find(|c: char| c == ':' || c == '：') {
            Some(colon) => {
                let width = text[colon..].chars().next().map_or(1, char::len_utf8);
                (&text[..colon], Some(text[colon + width..].trim()))
            }
            None => (text.as_str(), None),
        };
        let new_tags = combine_tags(tags, &rules.split_tags(tag_text));
        match transcription {
            Some(transcription) if !transcription.is_empty() => {
                let mut sound = Sound {
                    raw_tags: new_tags,
                    ..Default::default()
                };
                if rules.native_language.as_deref() == Some(self.entry.lang_code.as_str()) {
                    sound.native_pron = transcription.to_string();
                } else {
                    sound.ipa = transcription.to_string();
                }
                ItemData::Sound(sound)
            }
            _ => match used.iter().find_map(|node| self.audio_template(node)) {
                Some(filename) => ItemData::Audio(filename),
                None => ItemData::Tags(new_tags),
            },
        }
    }

    /// File name carried by an audio template node.
    fn audio_template(&self, node: &Node) -> Option<String> {
        let Node::Element(element) = node else {
            return None;
        };
        let profile = self.ctx.profile();
        if element.kind != NodeKind::Template
            || profile.template_role(&element.template_name()) != Some(TemplateRole::Audio)
        {
            return None;
        }
        Some(element.template_arg_text(profile.pronunciation.audio_arg))
    }

    fn attach_audio(&mut self, filename: &str, tags: &[String]) {
        let rules = &self.ctx.profile().pronunciation;
        let strict = rules.strict_audio_language.as_deref() == Some(self.entry.lang_code.as_str());
        let target = self.entry.sounds[self.start..]
            .iter_mut()
            .rev()
            .find(|sound| {
                sound.audio.is_empty()
                    && sound.homophone.is_empty()
                    && (!strict || sound.raw_tags.split_last().map_or(tags.is_empty(), |(_, prefix)| prefix == tags))
            });
        match target {
            Some(sound) => set_audio(sound, filename),
            None => self.ctx.debug("pronunciation/attach_audio", format!("no record for audio {filename}")),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Homophones
    // ─────────────────────────────────────────────────────────────

    fn homophones<'n>(&mut self, nodes: impl IntoIterator<Item = &'n WikiNode>, tags: &[String]) {
        let profile = self.ctx.profile();
        let tags = combine_tags(tags, std::slice::from_ref(&profile.pronunciation.homophone_tag));
        for node in nodes {
            let expanded;
            let scope = match node.kind {
                NodeKind::Table => node,
                NodeKind::Template
                    if profile.template_role(&node.template_name()) == Some(TemplateRole::Homophones) =>
                {
                    match self.ctx.expand_template(node) {
                        Some(root) => {
                            expanded = root;
                            &expanded
                        }
                        None => continue,
                    }
                }
                _ => continue,
            };
            for span in scope.find_html_recursively("span", Some("lang")) {
                let homophone = self.ctx.clean_element(span);
                if !homophone.is_empty() {
                    self.entry.sounds.push(Sound {
                        homophone,
                        raw_tags: tags.clone(),
                        ..Default::default()
                    });
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Variant-argument templates
    // ─────────────────────────────────────────────────────────────

    /// `{{pron-graf|pron=Reino Unido|fone=ˈɒ.pə.zɪt|2pron=EE.UU.|2fone=...}}`:
    /// a leading number selects the variant, a trailing one the value slot.
    fn variants(&mut self, node: &WikiNode) {
        let args = &self.ctx.profile().pronunciation.variant_args;
        let mut variants: BTreeMap<usize, Variant> = BTreeMap::new();
        let mut spellings: BTreeMap<(bool, usize, usize), Spelling> = BTreeMap::new();
        for (key, value) in node.template_parameters() {
            let ParamKey::Named(name) = key else {
                continue;
            };
            let Some(caps) = VARIANT_KEY.captures(&name) else {
                continue;
            };
            let number = caps[1].parse::<usize>().unwrap_or(1);
            let field = &caps[2];
            let slot = caps[3].parse::<usize>().unwrap_or(1);
            let value = self.ctx.clean(&value);
            if value.is_empty() {
                continue;
            }
            if let Some((same, is_note)) = args.spelling_field(field) {
                let spelling = spellings.entry((!same, number, slot)).or_insert_with(|| Spelling {
                    same_pronunciation: same,
                    ..Default::default()
                });
                if is_note {
                    spelling.note = value;
                } else {
                    spelling.alternative = value;
                }
                continue;
            }
            let variant = variants.entry(number).or_default();
            if field == args.region {
                variant.region = value;
            } else if let Some(rank) = args.ipa.iter().position(|ipa| ipa == field) {
                variant.ipas.insert((slot, rank), value);
            } else if field == args.audio {
                variant.audios.insert(slot, value);
            } else if field == args.roman {
                variant.romans.insert(slot, value);
            } else if field == args.syllabic {
                variant.syllabics.insert(slot, value);
            }
        }

        for variant in variants.into_values() {
            let mut raw_tags = Vec::new();
            if variant.region != args.none_value {
                push_unique(&mut raw_tags, variant.region.clone());
            }
            let tagged = |mut sound: Sound| {
                sound.raw_tags = raw_tags.clone();
                sound
            };
            for ipa in variant.ipas.into_values() {
                self.entry.sounds.push(tagged(Sound {
                    ipa,
                    ..Default::default()
                }));
            }
            for filename in variant.audios.values() {
                self.entry.sounds.push(tagged(audio_sound(filename)));
            }
            let slots: BTreeSet<usize> = variant
                .romans
                .keys()
                .chain(variant.syllabics.keys())
                .copied()
                .collect();
            for slot in slots {
                self.entry.sounds.push(tagged(Sound {
                    roman: variant.romans.get(&slot).cloned().unwrap_or_default(),
                    syllabic: variant.syllabics.get(&slot).cloned().unwrap_or_default(),
                    ..Default::default()
                }));
            }
        }

        for spelling in spellings.into_values() {
            if !spelling.alternative.is_empty() {
                self.entry.spellings.push(spelling);
            }
        }
    }
}

#[derive(Default)]
struct Variant {
    region: String,
    ipas: BTreeMap<(usize, usize), String>,
    audios: BTreeMap<usize, String>,
    romans: BTreeMap<usize, String>,
    syllabics: BTreeMap<usize, String>,
}

/// Order-preserving union.
fn combine_tags(old: &[String], new: &[String]) -> Vec<String> {
    let mut combined = old.to_vec();
    for tag in new {
        push_unique(&mut combined, tag.clone());
    }
    combined
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests for pronunciation extraction
// ─────────────────────────────────────────────────────────────────────────────
