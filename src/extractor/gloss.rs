//! Sense lists.
//!
//! List nesting encodes sense numbering: `:[1]` at depth one, `::[a]` below
//! it becomes "1a". A list whose prefix starts with the edition's modifier
//! prefix (`* {{trans.}}`) is not a sense; its text tags every gloss list
//! that follows it until the next modifier line.
//!
//! Only a nested list that repeats the item's marker (`##` under `#`) holds
//! sub-senses. Other nested lists ending in `:` or `*` are usage examples of
//! the sense above them.

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::{EditionProfile, TemplateRole};
use crate::context::Context;
use crate::extractor::example::example_from_item;
use crate::model::{push_unique, Sense, WordEntry};
use crate::tags::is_known_tag;
use crate::wikitext::{Node, NodeKind, ParamKey, WikiNode};

lazy_static! {
    static ref BARE_INDEX: Regex = Regex::new(r"^(\d+(?:\.\d+)*[a-z]?)").unwrap();
}

pub fn extract_glosses(ctx: &Context<'_>, entry: &mut WordEntry, nodes: &[Node]) {
    let prefix = ctx.profile().gloss.modifier_prefix.as_str();
    let mut modifier: Vec<String> = Vec::new();
    for list in nodes
        .iter()
        .filter_map(Node::as_element)
        .filter(|node| node.kind == NodeKind::List)
    {
        if !prefix.is_empty() && list.name.starts_with(prefix) {
            for item in list.find_child(NodeKind::ListItem) {
                modifier = modifier_tags(ctx, item);
                for nested in item.find_child(NodeKind::List) {
                    extract_gloss_list(ctx, entry, nested, &modifier, "");
                }
            }
            continue;
        }
        extract_gloss_list(ctx, entry, list, &modifier, "");
    }
}

fn extract_gloss_list(
    ctx: &Context<'_>,
    entry: &mut WordEntry,
    list: &WikiNode,
    inherited: &[String],
    parent_index: &str,
) {
    for (position, item) in list.find_child(NodeKind::ListItem).enumerate() {
        extract_gloss_item(ctx, entry, item, inherited, parent_index, position + 1);
    }
}

fn extract_gloss_item(
    ctx: &Context<'_>,
    entry: &mut WordEntry,
    item: &WikiNode,
    inherited: &[String],
    parent_index: &str,
    position: usize,
) {
    let profile = ctx.profile();
    let mut sense = Sense {
        tags: inherited.to_vec(),
        ..Default::default()
    };

    let mut used = Vec::new();
    for child in &item.children {
        match child {
            Node::Element(node) if node.kind == NodeKind::List => {}
            Node::Element(node)
                if node.kind == NodeKind::Template
                    && profile.template_role(&node.template_name())
                        == Some(TemplateRole::GlossQualifier) =>
            {
                qualifier_tags(ctx, node, &mut sense.tags);
            }
            _ => used.push(child.clone()),
        }
    }

    let raw_gloss = ctx.clean(&used);
    let (index, rest) = split_sense_index(profile, &raw_gloss);
    sense.sense_index = match index {
        Some(index) if extends_index(&index, parent_index) => index,
        Some(index) => format!("{parent_index}{index}"),
        None if parent_index.is_empty() => position.to_string(),
        None => format!("{parent_index}.{position}"),
    };

    let gloss = extract_tags_from_gloss_text(profile, rest, &mut sense.tags);
    let marker = item.name.chars().last();
    let (sub_lists, example_lists): (Vec<&WikiNode>, Vec<&WikiNode>) = item
        .find_child(NodeKind::List)
        .partition(|nested| marker.is_some() && nested.name.chars().last() == marker);
    if !gloss.is_empty() {
        if gloss != raw_gloss {
            sense.raw_glosses.push(raw_gloss.clone());
        }
        sense.glosses.push(gloss);
        for list in example_lists {
            if list.name.ends_with(':') || list.name.ends_with('*') {
                extract_example_list(ctx, &mut sense, list);
            }
        }
        entry.senses.push(sense.clone());
    }

    for nested in sub_lists {
        extract_gloss_list(ctx, entry, nested, &sense.tags, &sense.sense_index);
    }
}

/// True when an authored child index already carries its parent's index as
/// a whole leading component ("2.1" or "1b" under "1", not "10").
fn extends_index(index: &str, parent_index: &str) -> bool {
    if parent_index.is_empty() {
        return true;
    }
    match index.strip_prefix(parent_index) {
        Some(rest) => {
            rest.is_empty() || rest.starts_with('.') || rest.starts_with(|c: char| c.is_alphabetic())
        }
        None => false,
    }
}

fn extract_example_list(ctx: &Context<'_>, sense: &mut Sense, list: &WikiNode) {
    for item in list.find_child(NodeKind::ListItem) {
        if let Some(example) = example_from_item(ctx, item) {
            sense.examples.push(example);
        }
    }
}

/// Splits a leading sense index such as `[2.1]` or `(1.1)` off `text`.
pub(crate) fn split_sense_index<'t>(profile: &EditionProfile, text: &'t str) -> (Option<String>, &'t str) {
    let text = text.trim_start();
    for pair in &profile.gloss.index_brackets {
        let mut chars = pair.chars();
        let (Some(open), Some(close)) = (chars.next(), chars.next()) else {
            continue;
        };
        let Some(inner_start) = text.strip_prefix(open) else {
            continue;
        };
        let Some(end) = inner_start.find(close) else {
            continue;
        };
        let inner = &inner_start[..end];
        if !inner.is_empty() && inner.chars().all(|c| c.is_alphanumeric() || c == '.') {
            return (Some(inner.to_string()), inner_start[end + close.len_utf8()..].trim());
        }
    }
    if profile.gloss.bare_index {
        if let Some(found) = BARE_INDEX.find(text) {
            let rest = text[found.end()..].trim_start();
            let rest = rest.strip_prefix(':').unwrap_or(rest);
            return (Some(found.as_str().to_string()), rest.trim());
        }
    }
    (None, text.trim())
}

/// Moves a leading "tag, tag: " prefix into `tags` when every term looks like
/// a label, and returns the remaining gloss.
pub fn extract_tags_from_gloss_text(profile: &EditionProfile, gloss: &str, tags: &mut Vec<String>) -> String {
    let Some((prefix, rest)) = gloss.split_once(':') else {
        return gloss.to_string();
    };
    let rest = rest.trim();
    if rest.is_empty() {
        return gloss.to_string();
    }
    let terms: Vec<&str> = prefix.split(", ").map(str::trim).collect();
    let all_labels = terms.iter().all(|term| {
        !term.is_empty() && (is_known_tag(profile, term) || term.chars().all(char::is_alphanumeric))
    });
    if !all_labels {
        return gloss.to_string();
    }
    for term in terms {
        push_unique(tags, term);
    }
    rest.to_string()
}

/// Tags from a qualifier template such as `{{K|trans.|Linguistik}}`, which
/// renders as "transitiv, Linguistik:".
fn qualifier_tags(ctx: &Context<'_>, node: &WikiNode, tags: &mut Vec<String>) {
    let rules = &ctx.profile().gloss;
    let mut text = ctx.clean_element(node);
    if text.is_empty() {
        let positional: Vec<String> = node
            .template_parameters()
            .into_iter()
            .filter(|(key, _)| matches!(key, ParamKey::Positional(_)))
            .map(|(_, value)| ctx.clean(&value))
            .filter(|value| !value.is_empty())
            .collect();
        text = positional.join(", ");
    }
    for tag in text.trim().trim_end_matches(':').split(", ") {
        push_unique(tags, tag.trim());
    }
    if let (Some(prep_arg), Some(case_arg)) = (&rules.preposition_arg, &rules.case_arg) {
        let prep = node.template_arg_text(prep_arg.as_str());
        let case = node.template_arg_text(case_arg.as_str());
        if !prep.is_empty() && !case.is_empty() {
            push_unique(tags, format!("{prep} + {case}"));
        }
    }
}

fn modifier_tags(ctx: &Context<'_>, item: &WikiNode) -> Vec<String> {
    let used: Vec<Node> = item.invert_find_child(NodeKind::List).cloned().collect();
    let mut tags = Vec::new();
    for tag in ctx.clean(&used).trim_end_matches(':').split(", ") {
        push_unique(&mut tags, tag.trim());
    }
    tags
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests for sense extraction
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_profile, ExtractorConfig};
    use crate::store::PageStore;
    use serde_json::json;

    fn senses(store: &PageStore, edition: &str, text: &str) -> serde_json::Value {
        let config = ExtractorConfig::for_edition(edition);
        let mut ctx = Context::new(store, builtin_profile(edition).unwrap(), &config);
        ctx.start_page("Beispiel");
        let root = ctx.parse(text);
        let mut entry = WordEntry::new("Beispiel", "Deutsch", "de");
        extract_glosses(&ctx, &mut entry, &root.children);
        serde_json::to_value(&entry.senses).unwrap()
    }

    // ─────────────────────────────────────────────────────────────
    // Indices
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn bracketed_indices() {
        let store = PageStore::new();
        assert_eq!(
            senses(&store, "de", ":[1] gloss1 \n:[2] gloss2"),
            json!([
                {"glosses": ["gloss1"], "raw_glosses": ["[1] gloss1"], "sense_index": "1"},
                {"glosses": ["gloss2"], "raw_glosses": ["[2] gloss2"], "sense_index": "2"}
            ])
        );
    }

    #[test]
    fn subglosses_prefix_parent_index() {
        let store = PageStore::new();
        assert_eq!(
            senses(&store, "de", ":[1] gloss1\n::[a] subglossA\n::[b] subglossB"),
            json!([
                {"glosses": ["gloss1"], "raw_glosses": ["[1] gloss1"], "sense_index": "1"},
                {"glosses": ["subglossA"], "raw_glosses": ["[a] subglossA"], "sense_index": "1a"},
                {"glosses": ["subglossB"], "raw_glosses": ["[b] subglossB"], "sense_index": "1b"}
            ])
        );
    }

    #[test]
    fn qualifier_only_parent_passes_tags_down() {
        let mut store = PageStore::new();
        store.add_page("Vorlage:K", "tag");
        assert_eq!(
            senses(&store, "de", ":[1] {{K|tag}}\n::[a] subglossA\n::[1b] subglossB"),
            json!([
                {"glosses": ["subglossA"], "raw_glosses": ["[a] subglossA"], "sense_index": "1a", "tags": ["tag"]},
                {"glosses": ["subglossB"], "raw_glosses": ["[1b] subglossB"], "sense_index": "1b", "tags": ["tag"]}
            ])
        );
    }

    #[test]
    fn child_index_is_compared_by_component() {
        let store = PageStore::new();
        let value = senses(&store, "de", ":[1] gloss1\n::[10] sub10\n::[1.2] sub12\n::[1c] sub1c");
        let indices: Vec<_> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|sense| sense["sense_index"].clone())
            .collect();
        assert_eq!(indices, vec![json!("1"), json!("110"), json!("1.2"), json!("1c")]);
    }

    #[test]
    fn missing_indices_are_numbered() {
        let store = PageStore::new();
        assert_eq!(
            senses(&store, "nl", "# eerste\n## sub\n# tweede"),
            json!([
                {"glosses": ["eerste"], "sense_index": "1"},
                {"glosses": ["sub"], "sense_index": "1.1"},
                {"glosses": ["tweede"], "sense_index": "2"}
            ])
        );
    }

    #[test]
    fn bare_numeric_index() {
        let store = PageStore::new();
        assert_eq!(
            senses(&store, "es", ";1: Recipiente para líquidos."),
            json!([{
                "glosses": ["Recipiente para líquidos."],
                "raw_glosses": ["1: Recipiente para líquidos."],
                "sense_index": "1"
            }])
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Examples
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn example_lines_are_not_senses() {
        let store = PageStore::new();
        assert_eq!(
            senses(&store, "zh", "# 詞典\n#: 這是一本詞典。\n# 書"),
            json!([
                {"glosses": ["詞典"], "sense_index": "1", "examples": [{"text": "這是一本詞典。"}]},
                {"glosses": ["書"], "sense_index": "2"}
            ])
        );
    }

    #[test]
    fn example_translation_and_following_subsense() {
        let store = PageStore::new();
        assert_eq!(
            senses(&store, "nl", "# eerste\n#: een voorbeeld\n#:: an example\n#* een citaat\n## sub\n# tweede"),
            json!([
                {
                    "glosses": ["eerste"],
                    "sense_index": "1",
                    "examples": [
                        {"text": "een voorbeeld", "translation": "an example"},
                        {"text": "een citaat"}
                    ]
                },
                {"glosses": ["sub"], "sense_index": "1.1"},
                {"glosses": ["tweede"], "sense_index": "2"}
            ])
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Qualifiers
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn qualifier_template_is_removed_from_gloss() {
        let mut store = PageStore::new();
        store.add_page("Vorlage:K", "{{{1}}}, {{{2}}}:");
        assert_eq!(
            senses(&store, "de", ":[1] {{K|tag1|tag2}} gloss1"),
            json!([{
                "glosses": ["gloss1"],
                "raw_glosses": ["[1] gloss1"],
                "sense_index": "1",
                "tags": ["tag1", "tag2"]
            }])
        );
    }

    #[test]
    fn qualifier_preposition_and_case() {
        let mut store = PageStore::new();
        store.add_page("Vorlage:K", "{{{1}}}, {{{ft}}}:");
        let value = senses(
            &store,
            "de",
            ":[1] {{K|intrans.|Prä=auf|Kas=Akk.|ft=(auf jemanden/etwas zählen)}} zählen",
        );
        assert_eq!(
            value[0]["tags"],
            json!(["intrans.", "(auf jemanden/etwas zählen)", "auf + Akk."])
        );
    }

    #[test]
    fn tags_from_gloss_text() {
        let profile = builtin_profile("de").unwrap();
        let cases = [
            (
                "Zoologie: männliches Tier aus der Familie der Einhufer und Kamele",
                vec!["Zoologie"],
                "männliches Tier aus der Familie der Einhufer und Kamele",
            ),
            (
                "umgangssprachlich, Kurzwort, Akronym: für das erste Fernsehprogramm der ARD",
                vec!["umgangssprachlich", "Kurzwort", "Akronym"],
                "für das erste Fernsehprogramm der ARD",
            ),
            (
                "Drama von Samuel Beckett: Menschliche Existenz in der Endphase des Verfalls",
                vec![],
                "Drama von Samuel Beckett: Menschliche Existenz in der Endphase des Verfalls",
            ),
        ];
        for (input, expected_tags, expected_gloss) in cases {
            let mut tags = Vec::new();
            let gloss = extract_tags_from_gloss_text(profile, input, &mut tags);
            assert_eq!(tags, expected_tags, "{input}");
            assert_eq!(gloss, expected_gloss);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Sense modifiers
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn sense_modifier_scopes_following_glosses() {
        let mut store = PageStore::new();
        store.add_page("Vorlage:trans.", "transitiv");
        store.add_page("Vorlage:intrans.", "intransitiv");
        let text = "
* {{trans.}}
:[1] etwas [[oft]] [[haben]], zu haben [[pflegen]]
:[2] ''Stadt/Dorf:''
::[2.1] ''aktiv:'' [[bewohnen]], [[wohnen]]
::[2.2] ''passiv:'' bewohnt werden, zum [[Wohnsitz]] dienen
* {{intrans.}}
:[3] ''sich befinden:'' [[wohnen]]
:[4] sich [[aufhalten]], [[heimisch]] sein, zu Hause sein
:[5] sich eifrig mit etwas [[beschäftigen]]
";
        let value = senses(&store, "de", text);
        let tags: Vec<_> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|sense| sense["tags"].clone())
            .collect();
        assert_eq!(tags.len(), 7);
        assert_eq!(tags[0], json!(["transitiv"]));
        assert_eq!(tags[1], json!(["transitiv"]));
        assert_eq!(tags[2], json!(["transitiv", "aktiv"]));
        assert_eq!(tags[3], json!(["transitiv", "passiv"]));
        for tag in &tags[4..] {
            assert_eq!(tag, &json!(["intransitiv"]));
        }
        assert_eq!(value[2]["sense_index"], "2.1");
        assert_eq!(value[2]["glosses"], json!(["bewohnen, wohnen"]));
        assert_eq!(value[4]["glosses"], json!(["sich befinden: wohnen"]));
    }
}
