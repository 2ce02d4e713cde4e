//! Section router.
//!
//! Walks a page's heading tree: language sections, then part-of-speech
//! sections, then known subsections, each dispatched to its extractor.
//! Every POS entry starts as a value copy of its language's base record.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::config::{EditionProfile, LanguageHeading, OrphanSections, PosHeading, SectionKind, TemplateRole};
use crate::context::Context;
use crate::extractor::example::extract_examples;
use crate::extractor::gloss::extract_glosses;
use crate::extractor::inflection::{extract_inflection_template, extract_inflections};
use crate::extractor::linkage::extract_linkages;
use crate::extractor::pronunciation::{extract_pronunciation, extract_pronunciation_template};
use crate::extractor::translation::extract_translations;
use crate::langcodes::{code_to_name, name_to_code};
use crate::model::{push_unique, WordEntry};
use crate::tags::{is_known_tag, translate_raw_tags};
use crate::wikitext::{Node, NodeKind, WikiNode};

lazy_static! {
    static ref SECTION_TEMPLATE_LINE: Regex = Regex::new(r"(?m)^\{\{([^{}|\n]+)\}\}[ \t]*$").unwrap();
    static ref TRAILING_NUMBER: Regex = Regex::new(r"\s*\d+$").unwrap();
}

/// Extracts every entry on a page, in document order.
pub fn parse_page(ctx: &mut Context<'_>, title: &str, text: &str) -> Vec<WordEntry> {
    ctx.start_page(title);
    let text = rewrite_section_templates(ctx.profile(), text);
    let root = ctx.parse(&text);
    let mut entries = Vec::new();
    for heading in root.find_headings() {
        extract_language(ctx, &mut entries, heading);
    }
    entries
}

/// Turns a line holding only a known section template (`{{Bedeutungen}}`)
/// into a heading of the edition's section level.
fn rewrite_section_templates<'t>(profile: &EditionProfile, text: &'t str) -> Cow<'t, str> {
    let Some(level) = profile.section_template_level else {
        return Cow::Borrowed(text);
    };
    let marks = "=".repeat(usize::from(level));
    SECTION_TEMPLATE_LINE.replace_all(text, |caps: &Captures| {
        let name = caps[1].trim();
        match profile.section_kind(name) {
            Some(_) => format!("{marks}{name}{marks}"),
            None => caps[0].to_string(),
        }
    })
}

fn title_templates(heading: &WikiNode) -> impl Iterator<Item = &WikiNode> {
    heading
        .args
        .iter()
        .flatten()
        .filter_map(Node::as_element)
        .filter(|node| node.kind == NodeKind::Template)
}

fn heading_text(ctx: &Context<'_>, heading: &WikiNode) -> String {
    heading
        .args
        .first()
        .map(|title| ctx.clean(title).trim().to_string())
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Language sections
// ─────────────────────────────────────────────────────────────────────────────

/// Per-language walk state.
struct LanguageState {
    base: WordEntry,
    /// Index into the page's entries of the POS entry being filled.
    current: Option<usize>,
}

/// Language name and code declared by a heading, or `None` when the heading
/// declares no language. An unresolvable declaration yields an empty code.
fn language_of(ctx: &Context<'_>, heading: &WikiNode) -> Option<(String, String)> {
    let profile = ctx.profile();
    match &profile.language_heading {
        LanguageHeading::TemplateArgument { template } => {
            let node = title_templates(heading).find(|node| node.template_name() == *template)?;
            let value = node.template_arg_text(1);
            let code = name_to_code(profile, &value);
            if !code.is_empty() {
                return Some((value, code));
            }
            let name = code_to_name(profile, &value);
            if !name.is_empty() {
                return Some((name, value));
            }
            Some((value, String::new()))
        }
        LanguageHeading::TemplateNameCode { trim } => {
            let node = title_templates(heading).next()?;
            let code = node
                .template_name()
                .trim_matches(|c: char| trim.contains(c))
                .to_string();
            Some((code_to_name(profile, &code), code))
        }
        LanguageHeading::TemplateNamePrefix { prefix } => {
            let name = title_templates(heading)
                .find_map(|node| node.template_name().strip_prefix(prefix.as_str()).map(str::to_string))?;
            let code = name_to_code(profile, &name);
            Some((name, code))
        }
        LanguageHeading::HeadingText => {
            let name = heading_text(ctx, heading);
            if name.is_empty() {
                return None;
            }
            let code = name_to_code(profile, &name);
            Some((name, code))
        }
    }
}

fn extract_language(ctx: &mut Context<'_>, entries: &mut Vec<WordEntry>, heading: &WikiNode) {
    let Some((lang, lang_code)) = language_of(ctx, heading) else {
        ctx.warn("router/language", format!("no language declared in {}", heading.to_wikitext().trim()));
        return;
    };
    if lang_code.is_empty() {
        ctx.warn("router/language", format!("unknown language {lang}"));
    }
    if !ctx.config().captures_language(&lang_code) {
        ctx.debug("router/language", format!("skipped language {lang}"));
        return;
    }
    ctx.start_section(&lang);
    let mut state = LanguageState {
        base: WordEntry::new(ctx.title(), &lang, &lang_code),
        current: None,
    };
    walk_section(ctx, entries, &mut state, &heading.children, false);
}

fn walk_section(
    ctx: &mut Context<'_>,
    entries: &mut Vec<WordEntry>,
    state: &mut LanguageState,
    nodes: &[Node],
    in_pos: bool,
) {
    for child in nodes {
        match child {
            Node::Element(node) if node.is_heading() => extract_heading(ctx, entries, state, node, in_pos),
            Node::Element(_) => extract_stray(ctx, entries, state, child, in_pos),
            Node::Text(_) => {}
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Headings below the language
// ─────────────────────────────────────────────────────────────────────────────

enum PosMatch {
    Pos(String),
    /// Form-of or ignored part of speech.
    Skip,
}

fn classify_pos(ctx: &Context<'_>, name: &str) -> PosMatch {
    let profile = ctx.profile();
    if profile.form_pos.contains(name) || profile.ignore_pos.contains(name) {
        return PosMatch::Skip;
    }
    match profile.pos.get(name) {
        Some(pos) => PosMatch::Pos(pos.clone()),
        None => {
            ctx.warn("router/pos", format!("unknown part of speech {name}"));
            PosMatch::Pos(String::new())
        }
    }
}

fn is_pos_name(profile: &EditionProfile, name: &str) -> bool {
    profile.pos.contains_key(name) || profile.form_pos.contains(name) || profile.ignore_pos.contains(name)
}

fn pos_of(ctx: &Context<'_>, heading: &WikiNode) -> Option<PosMatch> {
    let profile = ctx.profile();
    match &profile.pos_heading {
        PosHeading::TemplateArgument { template } => {
            let node = title_templates(heading).find(|node| node.template_name() == *template)?;
            Some(classify_pos(ctx, &node.template_arg_text(1)))
        }
        PosHeading::TemplateName => {
            let name = title_templates(heading)
                .map(|node| node.template_name())
                .find(|name| is_pos_name(profile, name))?;
            Some(classify_pos(ctx, &name))
        }
        PosHeading::HeadingText => {
            let text = heading_text(ctx, heading);
            let name = TRAILING_NUMBER.replace(&text, "");
            is_pos_name(profile, &name).then(|| classify_pos(ctx, &name))
        }
        PosHeading::GlossLine => None,
    }
}

/// Section kind of a heading, by cleaned title or by the name of a title
/// template (`==== {{Übersetzungen}} ====`).
fn section_of(ctx: &Context<'_>, heading: &WikiNode) -> Option<(String, SectionKind)> {
    let profile = ctx.profile();
    let text = heading_text(ctx, heading);
    if let Some(kind) = profile.section_kind(&text) {
        return Some((text, kind.clone()));
    }
    title_templates(heading)
        .map(|node| node.template_name())
        .find_map(|name| profile.section_kind(&name).map(|kind| (name.clone(), kind.clone())))
}

fn extract_heading(
    ctx: &mut Context<'_>,
    entries: &mut Vec<WordEntry>,
    state: &mut LanguageState,
    heading: &WikiNode,
    in_pos: bool,
) {
    let profile = ctx.profile();
    match pos_of(ctx, heading) {
        Some(PosMatch::Skip) => {
            ctx.debug("router/pos", "skipped form-of part of speech");
            state.current = None;
            return;
        }
        Some(PosMatch::Pos(pos)) => {
            let title = heading_text(ctx, heading);
            ctx.start_section(&title);
            let mut entry = state.base.clone();
            entry.pos = pos;
            heading_tags(ctx, heading, &mut entry);
            entries.push(entry);
            state.current = Some(entries.len() - 1);
            walk_section(ctx, entries, state, &heading.children, true);
            return;
        }
        None => {}
    }

    if let Some((title, kind)) = section_of(ctx, heading) {
        ctx.start_section(&title);
        if kind == SectionKind::Glosses && profile.pos_heading == PosHeading::GlossLine {
            extract_gloss_lines(ctx, entries, state, heading);
        } else {
            let target = match state.current {
                Some(index) => entries.get_mut(index),
                None if profile.sections_before_pos == OrphanSections::Base => Some(&mut state.base),
                None => {
                    ctx.warn("router/section", format!("{title} before any part of speech"));
                    None
                }
            };
            if let Some(target) = target {
                dispatch_section(ctx, target, &kind, &heading.children);
            }
        }
        for sub in heading.find_headings() {
            extract_heading(ctx, entries, state, sub, in_pos);
        }
        return;
    }

    ctx.debug("router/heading", format!("container heading {}", heading_text(ctx, heading)));
    if !in_pos && profile.sections_before_pos == OrphanSections::Base {
        let saved = state.base.clone();
        state.current = None;
        walk_section(ctx, entries, state, &heading.children, in_pos);
        state.base = saved;
        state.current = None;
    } else {
        walk_section(ctx, entries, state, &heading.children, in_pos);
    }
}

/// Templates in a POS heading title that name a known tag (`{{n}}`).
fn heading_tags(ctx: &Context<'_>, heading: &WikiNode, entry: &mut WordEntry) {
    let profile = ctx.profile();
    for name in title_templates(heading).map(|node| node.template_name()) {
        if is_known_tag(profile, &name) {
            push_unique(&mut entry.raw_tags, name);
        }
    }
    translate_raw_tags(profile, &mut entry.tags, &mut entry.raw_tags);
}

fn dispatch_section(ctx: &mut Context<'_>, entry: &mut WordEntry, kind: &SectionKind, nodes: &[Node]) {
    let config = ctx.config();
    match kind {
        SectionKind::Glosses => extract_glosses(ctx, entry, nodes),
        SectionKind::Pronunciation if config.capture_pronunciation => extract_pronunciation(ctx, entry, nodes),
        SectionKind::Translations if config.capture_translations => extract_translations(ctx, entry, nodes),
        SectionKind::Forms if config.capture_inflections => extract_inflections(ctx, entry, nodes),
        SectionKind::Examples if config.capture_examples => extract_examples(ctx, entry, nodes),
        SectionKind::Linkage(relation) if config.capture_linkages => extract_linkages(ctx, entry, nodes, relation),
        _ => ctx.debug("router/section", "capture disabled"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Glosses section that names the part of speech
// ─────────────────────────────────────────────────────────────────────────────

/// `''rzeczownik, rodzaj męskorzeczowy''` starts a new POS entry; the lists
/// after it are its glosses.
fn extract_gloss_lines(ctx: &Context<'_>, entries: &mut Vec<WordEntry>, state: &mut LanguageState, heading: &WikiNode) {
    let profile = ctx.profile();
    for child in &heading.children {
        let Node::Element(node) = child else {
            continue;
        };
        match node.kind {
            NodeKind::Italic => {
                let line = ctx.clean_element(node);
                match gloss_line_pos(profile, &line) {
                    Some((pos, raw_tags)) => {
                        let mut entry = state.base.clone();
                        entry.pos = pos;
                        for tag in raw_tags {
                            push_unique(&mut entry.raw_tags, tag);
                        }
                        translate_raw_tags(profile, &mut entry.tags, &mut entry.raw_tags);
                        entries.push(entry);
                        state.current = Some(entries.len() - 1);
                    }
                    None => {
                        let first = line.split(',').next().unwrap_or_default().trim();
                        if !profile.form_pos.iter().any(|name| first.starts_with(name.as_str())) {
                            ctx.warn("router/gloss_line", format!("unknown part of speech line {line}"));
                        }
                        state.current = None;
                    }
                }
            }
            NodeKind::List => match state.current.and_then(|index| entries.get_mut(index)) {
                Some(entry) => extract_glosses(ctx, entry, std::slice::from_ref(child)),
                None => ctx.debug("router/gloss_line", "glosses without a part of speech"),
            },
            _ => {}
        }
    }
}

/// POS and the remaining raw tags of a gloss line. The POS is the longest
/// POS name equal to the first comma term or followed there by a space.
fn gloss_line_pos(profile: &EditionProfile, line: &str) -> Option<(String, Vec<String>)> {
    let mut terms = line.split(',').map(str::trim).filter(|term| !term.is_empty());
    let first = terms.next()?;
    let (name, pos) = profile
        .pos
        .iter()
        .filter(|(name, _)| first == name.as_str() || first.starts_with(&format!("{name} ")))
        .max_by_key(|(name, _)| name.len())?;

    let mut raw_tags = Vec::new();
    let rest = first[name.len()..].trim();
    if !rest.is_empty() {
        if rest.split_whitespace().all(|token| is_known_tag(profile, token)) {
            raw_tags.extend(rest.split_whitespace().map(str::to_string));
        } else {
            raw_tags.push(rest.to_string());
        }
    }
    raw_tags.extend(terms.map(str::to_string));
    Some((pos.clone(), raw_tags))
}

// ─────────────────────────────────────────────────────────────────────────────
// Content outside known subsections
// ─────────────────────────────────────────────────────────────────────────────

fn extract_stray(
    ctx: &mut Context<'_>,
    entries: &mut Vec<WordEntry>,
    state: &mut LanguageState,
    child: &Node,
    in_pos: bool,
) {
    let Node::Element(node) = child else {
        return;
    };
    let profile = ctx.profile();
    let config = ctx.config();
    match node.kind {
        NodeKind::Template => match profile.template_role(&node.template_name()) {
            Some(TemplateRole::PronunciationVariants | TemplateRole::Audio) => {
                if config.capture_pronunciation {
                    let target = match state.current {
                        Some(index) => &mut entries[index],
                        None => &mut state.base,
                    };
                    extract_pronunciation_template(ctx, target, node);
                }
            }
            Some(TemplateRole::FormGrid | TemplateRole::PrincipalParts | TemplateRole::ConjugationGrid) => {
                match state.current.and_then(|index| entries.get_mut(index)) {
                    Some(entry) if config.capture_inflections => {
                        extract_inflection_template(ctx, entry, node);
                    }
                    Some(_) => {}
                    None => ctx.warn("router/inflection", format!("{} outside a part of speech", node.template_name())),
                }
            }
            _ => ctx.warn("router/template", format!("unexpected template {}", node.template_name())),
        },
        NodeKind::Link => {
            let target = match state.current {
                Some(index) => &mut entries[index],
                None => &mut state.base,
            };
            ctx.clean_into(target, std::slice::from_ref(child));
        }
        NodeKind::List if in_pos && profile.glosses_in_pos_section => {
            if let Some(entry) = state.current.and_then(|index| entries.get_mut(index)) {
                extract_glosses(ctx, entry, std::slice::from_ref(child));
            }
        }
        _ => {}
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests for page routing
// ─────────────────────────────────────────────────────────────────────────────
