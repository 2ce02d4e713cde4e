//! Translation sections.
//!
//! Two line shapes coexist. A plain line reads "Language: word (tag), word";
//! a template line carries one entry template per target word
//! (`{{t+|en|dictionary}}`) with qualifier templates and links around it.
//! A translation is only committed once it has a word.

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::{EditionProfile, SectionKind, TemplateRole};
use crate::context::Context;
use crate::langcodes::{code_to_name, name_to_code};
use crate::model::{push_unique, Translation, WordEntry};
use crate::tags::{is_known_tag, translate_raw_tags};
use crate::wikitext::node::to_wikitext;
use crate::wikitext::{Node, NodeKind, WikiNode};

lazy_static! {
    static ref SENSE_INDEX: Regex =
        Regex::new(r"^\d+(?:\.\d+)*[a-z]?(?:\s*[-–,]\s*\d+(?:\.\d+)*[a-z]?)*$").unwrap();
    static ref BRACKET_INDEX: Regex =
        Regex::new(r"\[(\d+(?:\.\d+)*[a-z]?(?:\s*[-–,]\s*\d+(?:\.\d+)*[a-z]?)*)\]").unwrap();
}

pub fn extract_translations(ctx: &mut Context<'_>, entry: &mut WordEntry, nodes: &[Node]) {
    let start = entry.translations.len();
    let mut sense = String::new();
    extract_translation_nodes(ctx, entry, nodes, &mut sense);
    let profile = ctx.profile();
    for translation in &mut entry.translations[start..] {
        translate_raw_tags(profile, &mut translation.tags, &mut translation.raw_tags);
    }
}

fn extract_translation_nodes(ctx: &mut Context<'_>, entry: &mut WordEntry, nodes: &[Node], sense: &mut String) {
    for node in nodes.iter().filter_map(Node::as_element) {
        match node.kind {
            NodeKind::Template => translation_template(ctx, entry, node, sense),
            NodeKind::List => {
                for item in node.find_child_recursively(NodeKind::ListItem) {
                    extract_list_item(ctx, entry, item, sense);
                }
            }
            _ => {}
        }
    }
}

fn translation_template(ctx: &mut Context<'_>, entry: &mut WordEntry, node: &WikiNode, sense: &mut String) {
    let profile = ctx.profile();
    match profile.template_role(&node.template_name()) {
        Some(TemplateRole::TranslationSense) => {
            if let Some(arg) = node.template_arg(1) {
                *sense = ctx.clean(&arg);
            }
        }
        Some(TemplateRole::TranslationSubpage) => extract_subpage(ctx, entry, node),
        Some(TemplateRole::MultiTranslation) => {
            if let Some(data) = node.template_arg(profile.translation.multi_data_arg.as_str()) {
                let root = ctx.parse(&to_wikitext(&data));
                let mut inner = sense.clone();
                extract_translation_nodes(ctx, entry, &root.children, &mut inner);
            }
        }
        _ => ctx.debug("translation/template", format!("skipped template {}", node.template_name())),
    }
}

fn extract_list_item(ctx: &Context<'_>, entry: &mut WordEntry, item: &WikiNode, sense: &str) {
    let profile = ctx.profile();
    let has_entry_template = item.children.iter().any(|child| {
        matches!(child, Node::Element(node)
            if node.kind == NodeKind::Template
                && profile.template_role(&node.template_name()) == Some(TemplateRole::TranslationEntry))
    });
    if has_entry_template {
        extract_template_line(ctx, entry, item, sense);
    } else {
        extract_text_line(ctx, entry, item, sense);
    }
}

/// Byte offset and width of the first ASCII or full-width colon.
fn find_colon(text: &str) -> Option<(usize, usize)> {
    text.char_indices()
        .find(|(_, c)| *c == ':' || *c == '：')
        .map(|(index, c)| (index, c.len_utf8()))
}

fn language_code(ctx: &Context<'_>, lang: &str) -> String {
    let profile = ctx.profile();
    let code = name_to_code(profile, lang);
    if !code.is_empty() {
        return code;
    }
    ctx.warn("translation/language", format!("unknown language {lang}"));
    profile.unknown_language_code.clone().unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// "Language: word (tag), word" lines
// ─────────────────────────────────────────────────────────────────────────────

fn extract_text_line(ctx: &Context<'_>, entry: &mut WordEntry, item: &WikiNode, sense: &str) {
    let profile = ctx.profile();
    let used: Vec<Node> = item.invert_find_child(NodeKind::List).cloned().collect();
    let text = ctx.clean(&used);
    let Some((colon, width)) = find_colon(&text) else {
        ctx.debug("translation/text_line", format!("no language label in {text}"));
        return;
    };
    let lang = text[..colon].trim();
    let words = text[colon + width..].trim();
    if lang.is_empty() || words.is_empty() {
        return;
    }
    let lang_code = language_code(ctx, lang);

    let mut sense_index = String::new();
    for segment in split_outside_parens(words) {
        let mut translation = Translation {
            lang: lang.to_string(),
            lang_code: lang_code.clone(),
            sense: sense.to_string(),
            ..Default::default()
        };
        let mut word = String::new();
        let mut groups = Vec::new();
        let mut group = String::new();
        let mut depth = 0usize;
        for c in segment.chars() {
            match c {
                '(' | '（' => {
                    if depth > 0 {
                        group.push(c);
                    }
                    depth += 1;
                }
                ')' | '）' if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        groups.push(std::mem::take(&mut group));
                    } else {
                        group.push(c);
                    }
                }
                _ if depth > 0 => group.push(c),
                _ => word.push(c),
            }
        }
        let latin_word = word.chars().all(|c| !c.is_alphabetic() || is_latin(c));
        for group in &groups {
            classify_parenthetical(profile, group.trim(), latin_word, &mut translation, &mut sense_index);
        }

        let mut tokens: Vec<&str> = word.split_whitespace().collect();
        let mut genders = Vec::new();
        while tokens.len() > 1 {
            let Some(tags) = tokens.last().and_then(|token| profile.translation.genders.get(*token)) else {
                break;
            };
            genders.push(tags);
            tokens.pop();
        }
        for tags in genders.into_iter().rev() {
            for tag in tags {
                push_unique(&mut translation.tags, tag.clone());
            }
        }
        translation.word = tokens.join(" ");
        translation.sense_index = sense_index.clone();
        if !translation.word.is_empty() {
            entry.translations.push(translation);
        }
    }
}

/// Parenthesized annotation: a sense index, a gender, a known tag, a
/// romanization, or else a free raw tag. Lowercase Latin text romanizes a
/// non-Latin word; next to a Latin-script word only a single token does.
fn classify_parenthetical(
    profile: &EditionProfile,
    token: &str,
    latin_word: bool,
    translation: &mut Translation,
    sense_index: &mut String,
) {
    if token.is_empty() {
        return;
    }
    if SENSE_INDEX.is_match(token) {
        *sense_index = token.to_string();
    } else if let Some(tags) = profile.translation.genders.get(token) {
        for tag in tags {
            push_unique(&mut translation.tags, tag.clone());
        }
    } else if is_known_tag(profile, token) {
        push_unique(&mut translation.raw_tags, token);
    } else if translation.roman.is_empty()
        && token.chars().any(is_lowercase_latin)
        && !(latin_word && token.contains(char::is_whitespace))
    {
        translation.roman = token.to_string();
    } else {
        push_unique(&mut translation.raw_tags, token);
    }
}

fn is_lowercase_latin(c: char) -> bool {
    c.is_ascii_lowercase() || (('\u{df}'..='\u{24f}').contains(&c) && c.is_lowercase())
}

fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic() || ('\u{c0}'..='\u{24f}').contains(&c) || ('\u{1e00}'..='\u{1eff}').contains(&c)
}

/// Splits at commas and semicolons that are not inside parentheses.
fn split_outside_parens(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in text.char_indices() {
        match c {
            '(' | '（' => depth += 1,
            ')' | '）' => depth = depth.saturating_sub(1),
            ',' | ';' | '，' | '；' if depth == 0 => {
                parts.push(text[start..index].trim());
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

// ─────────────────────────────────────────────────────────────────────────────
// Template lines
// ─────────────────────────────────────────────────────────────────────────────

fn extract_template_line(ctx: &Context<'_>, entry: &mut WordEntry, item: &WikiNode, sense: &str) {
    let profile = ctx.profile();
    let mut current = Translation {
        sense: sense.to_string(),
        ..Default::default()
    };

    let mut first = true;
    for child in item
        .filter_empty_str_child()
        .filter(|child| !child.is_kind(NodeKind::List))
    {
        let role = child
            .as_element()
            .filter(|node| node.kind == NodeKind::Template)
            .and_then(|node| profile.template_role(&node.template_name()));
        if first && role != Some(TemplateRole::TranslationEntry) {
            first = false;
            let rest = match child {
                Node::Text(text) => match find_colon(text) {
                    Some((colon, width)) => {
                        set_language(ctx, &mut current, &text[..colon]);
                        &text[colon + width..]
                    }
                    None => text.as_str(),
                },
                Node::Element(node) => {
                    let label = ctx.clean_element(node);
                    set_language(ctx, &mut current, label.trim_end_matches([':', '：']));
                    ""
                }
            };
            scan_sense_index(entry, &mut current, rest);
            continue;
        }
        first = false;

        match child {
            Node::Text(text) => scan_sense_index(entry, &mut current, text),
            Node::Element(node) if node.kind == NodeKind::Link => {
                flush(entry, &mut current);
                current.word = ctx.clean_element(node);
            }
            Node::Element(node) if node.kind == NodeKind::Template => match role {
                Some(TemplateRole::TranslationEntry) => entry_template(ctx, entry, &mut current, node),
                Some(TemplateRole::TranslationNeeded) => {}
                _ => qualifier_template(ctx, &mut current, node),
            },
            Node::Element(_) => {}
        }
    }
    flush(entry, &mut current);
}

fn set_language(ctx: &Context<'_>, current: &mut Translation, label: &str) {
    let label = label.trim();
    if label.is_empty() {
        return;
    }
    current.lang = label.to_string();
    current.lang_code = name_to_code(ctx.profile(), label);
}

/// A bracketed sense index between entries (`: [1] {{Ü|...}}; [2] ...`)
/// applies to the entries after it.
fn scan_sense_index(entry: &mut WordEntry, current: &mut Translation, text: &str) {
    if let Some(caps) = BRACKET_INDEX.captures_iter(text).last() {
        flush(entry, current);
        current.sense_index = caps[1].to_string();
    }
}

/// Commits `current` if it has a word and starts a new record in the same
/// language and sense.
fn flush(entry: &mut WordEntry, current: &mut Translation) {
    if current.word.is_empty() {
        return;
    }
    let next = Translation {
        lang: current.lang.clone(),
        lang_code: current.lang_code.clone(),
        sense: current.sense.clone(),
        sense_index: current.sense_index.clone(),
        ..Default::default()
    };
    entry.translations.push(std::mem::replace(current, next));
}

fn entry_template(ctx: &Context<'_>, entry: &mut WordEntry, current: &mut Translation, node: &WikiNode) {
    let profile = ctx.profile();
    let rules = &profile.translation;
    flush(entry, current);
    if current.lang_code.is_empty() {
        current.lang_code = node.template_arg_text(1);
    }
    if current.lang.is_empty() {
        current.lang = code_to_name(profile, &current.lang_code);
    }
    let arg = |key: &str| node.template_arg(key).map(|value| ctx.clean(&value)).unwrap_or_default();
    current.word = arg("2");
    current.roman = arg("tr");
    current.alt = arg("alt");
    current.lit = arg("lit");

    let Some(expanded) = ctx.expand_template(node) else {
        return;
    };
    for span in expanded.find_html_recursively("span", None) {
        let class = span.attr("class");
        if !rules.gender_class.is_empty() && class.contains(rules.gender_class.as_str()) {
            for abbr in span.find_html_recursively("abbr", None) {
                let title = abbr.attr("title").trim();
                if !title.is_empty() {
                    push_unique(&mut current.raw_tags, title);
                } else if let Some(tags) = rules.genders.get(&ctx.clean_element(abbr)) {
                    for tag in tags {
                        push_unique(&mut current.tags, tag.clone());
                    }
                }
            }
        } else if current.roman.is_empty()
            && !rules.roman_class_prefix.is_empty()
            && class.starts_with(rules.roman_class_prefix.as_str())
        {
            current.roman = ctx.clean_element(span);
        }
    }
}

fn qualifier_template(ctx: &Context<'_>, current: &mut Translation, node: &WikiNode) {
    let titles: Vec<String> = ctx
        .expand_template(node)
        .map(|root| {
            root.find_html_recursively("span", None)
                .into_iter()
                .map(|span| span.attr("title").trim().to_string())
                .filter(|title| !title.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if titles.is_empty() {
        let text = ctx.clean_element(node);
        push_unique(&mut current.raw_tags, text.trim_matches(|c: char| c == '(' || c == ')').trim());
    } else {
        for title in titles {
            push_unique(&mut current.raw_tags, title);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subpages
// ─────────────────────────────────────────────────────────────────────────────

/// Follows a "see translation subpage" template to the translations section
/// of another page. A missing page or section contributes nothing.
fn extract_subpage(ctx: &mut Context<'_>, entry: &mut WordEntry, node: &WikiNode) {
    let profile = ctx.profile();
    let rules = &profile.translation;
    let name = node.template_name();
    let target_section = if rules
        .section_subpage_templates
        .iter()
        .any(|template| template.eq_ignore_ascii_case(&name))
    {
        node.template_arg(1).map(|arg| ctx.clean(&arg)).filter(|section| !section.is_empty())
    } else {
        None
    };
    let mut page_title = node.template_arg_text(2);
    if page_title.is_empty() {
        page_title = ctx.title().to_string();
    }
    let subpage_title = if page_title == ctx.title() {
        format!("{page_title}{}", rules.subpage_suffix)
    } else {
        page_title
    };
    if !ctx.enter_subpage(&subpage_title) {
        return;
    }
    let Some(page) = ctx.get_page(&subpage_title) else {
        return;
    };

    let root = ctx.parse(&page.body);
    let scope = match &target_section {
        Some(section) => find_section(ctx, &root, |title| title == section),
        None => Some(&root),
    };
    let Some(scope) = scope else {
        return;
    };
    let Some(section) = find_section(ctx, scope, |title| {
        profile.section_kind(title) == Some(&SectionKind::Translations)
    }) else {
        return;
    };
    let mut sense = String::new();
    extract_translation_nodes(ctx, entry, &section.children, &mut sense);
}

fn find_section<'n>(ctx: &Context<'_>, root: &'n WikiNode, matches: impl Fn(&str) -> bool) -> Option<&'n WikiNode> {
    root.find_headings_recursively().into_iter().find(|heading| {
        let title = heading.args.first().map(|title| ctx.clean(title)).unwrap_or_default();
        matches(&title)
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests for translation extraction
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_profile, ExtractorConfig};
    use crate::store::PageStore;
    use serde_json::json;

    fn translations(store: &PageStore, edition: &str, title: &str, text: &str) -> serde_json::Value {
        let config = ExtractorConfig::for_edition(edition);
        let mut ctx = Context::new(store, builtin_profile(edition).unwrap(), &config);
        ctx.start_page(title);
        let root = ctx.parse(text);
        let mut entry = WordEntry::new(title, "", edition);
        extract_translations(&mut ctx, &mut entry, &root.children);
        serde_json::to_value(&entry.translations).unwrap()
    }

    // ─────────────────────────────────────────────────────────────
    // Plain lines
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn plain_lines_with_parenthesized_annotations() {
        let mut store = PageStore::new();
        store.add_page("Szablon:m", "m");
        let text = "* albański: (1.1) [[fjalor]] {{m}} (fyalór)\n* chiński standardowy: (1.1) [[字典]] (zìdiǎn), [[词典]] (cídiǎn); (1.2) [[词典]] (cídiǎn)";
        assert_eq!(
            translations(&store, "pl", "słownik", text),
            json!([
                {"lang": "albański", "lang_code": "sq", "word": "fjalor", "sense_index": "1.1", "tags": ["masculine"], "roman": "fyalór"},
                {"lang": "chiński standardowy", "lang_code": "unknown", "word": "字典", "sense_index": "1.1", "roman": "zìdiǎn"},
                {"lang": "chiński standardowy", "lang_code": "unknown", "word": "词典", "sense_index": "1.1", "roman": "cídiǎn"},
                {"lang": "chiński standardowy", "lang_code": "unknown", "word": "词典", "sense_index": "1.2", "roman": "cídiǎn"}
            ])
        );
    }

    #[test]
    fn phrase_after_latin_word_is_a_raw_tag() {
        let store = PageStore::new();
        let text = "* angielski: (1.1) [[dictionary]] (British usage)\n* rosyjski: (1.1) [[словарь]] (slovarʹ dlja detej)";
        assert_eq!(
            translations(&store, "pl", "słownik", text),
            json!([
                {"lang": "angielski", "lang_code": "en", "word": "dictionary", "sense_index": "1.1", "raw_tags": ["British usage"]},
                {"lang": "rosyjski", "lang_code": "ru", "word": "словарь", "sense_index": "1.1", "roman": "slovarʹ dlja detej"}
            ])
        );
    }

    #[test]
    fn known_tags_are_translated() {
        let store = PageStore::new();
        let value = translations(&store, "pl", "słownik", "* angielski: (1.1) dictionary (pot.), (1.2) lexicon");
        assert_eq!(
            value,
            json!([
                {"lang": "angielski", "lang_code": "en", "word": "dictionary", "sense_index": "1.1", "tags": ["colloquial"]},
                {"lang": "angielski", "lang_code": "en", "word": "lexicon", "sense_index": "1.2"}
            ])
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Template lines
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn entry_templates_with_gender_and_qualifier() {
        let mut store = PageStore::new();
        store.add_page(
            "Template:t+",
            r#"<span lang="{{{1}}}">[[{{{2}}}]]</span>&nbsp;<span class="gender"><abbr title="陽性">m</abbr></span> <span lang="ru" class="tr Latn">slovarʹ</span>"#,
        );
        store.add_page(
            "Template:qualifier",
            r#"<span class="ib-brac">(</span><span class="ib-content">{{{1}}}</span><span class="ib-brac">)</span>"#,
        );
        let text = "{{trans-top|書}}\n* 俄語：{{t+|ru|словарь}} {{qualifier|書面}}\n* 英語：{{t|en|dictionary}}、[[lexicon]]、{{t-needed|de}}\n{{trans-bottom}}";
        assert_eq!(
            translations(&store, "zh", "字典", text),
            json!([
                {
                    "lang": "俄語", "lang_code": "ru", "word": "словарь", "roman": "slovarʹ",
                    "sense": "書", "tags": ["masculine"], "raw_tags": ["書面"]
                },
                {"lang": "英語", "lang_code": "en", "word": "dictionary", "sense": "書"},
                {"lang": "英語", "lang_code": "en", "word": "lexicon", "sense": "書"}
            ])
        );
    }

    #[test]
    fn language_from_entry_template_code() {
        let store = PageStore::new();
        assert_eq!(
            translations(&store, "zh", "字典", "* {{t|fr|dictionnaire}}"),
            json!([{"lang": "法語", "lang_code": "fr", "word": "dictionnaire"}])
        );
    }

    #[test]
    fn multi_translation_box_with_sense_indices() {
        let mut store = PageStore::new();
        store.add_page("Vorlage:en", "Englisch");
        let text = "{{Ü-Tabelle|Ü-Liste=\n*{{en}}: [1] {{Ü|en|house}}; [2] {{Ü|en|home}}\n}}";
        assert_eq!(
            translations(&store, "de", "Haus", text),
            json!([
                {"lang": "Englisch", "lang_code": "en", "word": "house", "sense_index": "1"},
                {"lang": "Englisch", "lang_code": "en", "word": "home", "sense_index": "2"}
            ])
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Subpages
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn subpage_section_is_followed() {
        let mut store = PageStore::new();
        store.add_page(
            "字典/翻譯",
            "==漢語==\n===動詞===\n====翻譯====\n* 日語：{{t|ja|引く}}\n===名詞===\n====翻譯====\n{{trans-top|書}}\n* 英語：{{t+|en|dictionary}}\n{{trans-bottom}}",
        );
        assert_eq!(
            translations(&store, "zh", "字典", "{{see translation subpage|名詞}}"),
            json!([{"lang": "英語", "lang_code": "en", "word": "dictionary", "sense": "書"}])
        );
    }

    #[test]
    fn missing_subpage_is_silent() {
        let store = PageStore::new();
        assert_eq!(translations(&store, "zh", "字典", "{{trans-see|字典}}"), json!([]));
    }
}
