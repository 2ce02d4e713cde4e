//! Usage examples.
//!
//! A dedicated examples section (`{{Beispiele}}`) lists one example per
//! line, each starting with the index of the sense it illustrates. A line
//! nested under an example is its translation.

use crate::context::Context;
use crate::extractor::gloss::split_sense_index;
use crate::model::{Example, WordEntry};
use crate::wikitext::{Node, NodeKind, WikiNode};

pub fn extract_examples(ctx: &Context<'_>, entry: &mut WordEntry, nodes: &[Node]) {
    for list in nodes
        .iter()
        .filter_map(Node::as_element)
        .filter(|node| node.kind == NodeKind::List)
    {
        for item in list.find_child(NodeKind::ListItem) {
            let Some(example) = example_from_item(ctx, item) else {
                continue;
            };
            let (index, text) = split_sense_index(ctx.profile(), &example.text);
            let Some(index) = index else {
                ctx.debug("example", format!("no sense index on {:?}", example.text));
                continue;
            };
            if text.is_empty() {
                continue;
            }
            let text = text.to_string();
            match entry.senses.iter_mut().find(|sense| sense.sense_index == index) {
                Some(sense) => sense.examples.push(Example { text, ..example }),
                None => ctx.warn("example", format!("no sense [{index}] for example")),
            }
        }
    }
}

/// One example line; nested lines below it are joined as the translation.
pub(crate) fn example_from_item(ctx: &Context<'_>, item: &WikiNode) -> Option<Example> {
    let used: Vec<Node> = item.invert_find_child(NodeKind::List).cloned().collect();
    let text = ctx.clean(&used);
    if text.is_empty() {
        return None;
    }
    let translation: Vec<String> = item
        .find_child(NodeKind::List)
        .flat_map(|nested| nested.find_child(NodeKind::ListItem))
        .map(|line| {
            let used: Vec<Node> = line.invert_find_child(NodeKind::List).cloned().collect();
            ctx.clean(&used)
        })
        .filter(|line| !line.is_empty())
        .collect();
    Some(Example {
        text,
        translation: translation.join(" "),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests for example extraction
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_profile, ExtractorConfig};
    use crate::model::Sense;
    use crate::store::PageStore;
    use serde_json::json;

    fn with_examples(text: &str) -> serde_json::Value {
        let store = PageStore::new();
        let config = ExtractorConfig::for_edition("de");
        let mut ctx = Context::new(&store, builtin_profile("de").unwrap(), &config);
        ctx.start_page("Beispiel");
        let root = ctx.parse(text);
        let mut entry = WordEntry::new("Beispiel", "Deutsch", "de");
        for index in ["1", "2"] {
            entry.senses.push(Sense {
                glosses: vec![format!("gloss{index}")],
                sense_index: index.to_string(),
                ..Default::default()
            });
        }
        extract_examples(&ctx, &mut entry, &root.children);
        serde_json::to_value(&entry.senses).unwrap()
    }

    #[test]
    fn examples_attach_by_sense_index() {
        assert_eq!(
            with_examples(":[1] Das ist ein ''Beispiel''.\n:[2] Zweites.\n:[1] Noch eins."),
            json!([
                {
                    "glosses": ["gloss1"],
                    "sense_index": "1",
                    "examples": [{"text": "Das ist ein Beispiel."}, {"text": "Noch eins."}]
                },
                {"glosses": ["gloss2"], "sense_index": "2", "examples": [{"text": "Zweites."}]}
            ])
        );
    }

    #[test]
    fn nested_line_is_translation() {
        let value = with_examples(":[2] This is an example.\n::Das ist ein Beispiel.");
        assert_eq!(
            value[1]["examples"],
            json!([{"text": "This is an example.", "translation": "Das ist ein Beispiel."}])
        );
    }

    #[test]
    fn unindexed_and_unmatched_examples_are_dropped() {
        let value = with_examples(":Ohne Index.\n:[7] Kein Sinn dazu.\n:[1]");
        assert!(value[0].get("examples").is_none());
        assert!(value[1].get("examples").is_none());
    }
}
