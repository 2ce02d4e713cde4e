//! Linkage sections (synonyms, antonyms, derived terms, ...).

use crate::config::EditionProfile;
use crate::context::Context;
use crate::extractor::gloss::split_sense_index;
use crate::model::{Linkage, WordEntry};
use crate::wikitext::node::to_wikitext;
use crate::wikitext::{Node, NodeKind, WikiNode};

/// Every linked word of a list item becomes one `Linkage` carrying the
/// item's leading sense index. Items without links are split on commas.
pub fn extract_linkages(ctx: &Context<'_>, entry: &mut WordEntry, nodes: &[Node], relation: &str) {
    for list in nodes
        .iter()
        .filter_map(Node::as_element)
        .filter(|node| node.kind == NodeKind::List)
    {
        for item in list.find_child_recursively(NodeKind::ListItem) {
            extract_linkage_item(ctx, entry, item, relation);
        }
    }
}

fn extract_linkage_item(ctx: &Context<'_>, entry: &mut WordEntry, item: &WikiNode, relation: &str) {
    let profile = ctx.profile();
    let used: Vec<Node> = item.invert_find_child(NodeKind::List).cloned().collect();
    let text = ctx.clean(&used);
    let (index, rest) = split_sense_index(profile, text.trim());
    let sense_index = index.unwrap_or_default();

    let mut words: Vec<String> = item
        .find_child(NodeKind::Link)
        .filter(|link| is_word_link(profile, link))
        .map(|link| ctx.clean_element(link).trim().to_string())
        .collect();
    if words.is_empty() {
        words = rest.split([',', ';', '，', '、']).map(|word| word.trim().to_string()).collect();
    }

    for word in words {
        if word.is_empty() || word == ctx.title() {
            continue;
        }
        let duplicate = entry
            .linkages
            .iter()
            .any(|linkage| linkage.word == word && linkage.linkage == relation && linkage.sense_index == sense_index);
        if duplicate {
            continue;
        }
        entry.linkages.push(Linkage {
            word,
            linkage: relation.to_string(),
            sense_index: sense_index.clone(),
            ..Default::default()
        });
    }
}

fn is_word_link(profile: &EditionProfile, link: &WikiNode) -> bool {
    let target = link.args.first().map(|target| to_wikitext(target)).unwrap_or_default();
    match target.trim().split_once(':') {
        Some((namespace, _)) => {
            let namespace = namespace.trim();
            !profile.is_category_namespace(namespace) && !profile.is_file_namespace(namespace)
        }
        None => true,
    }
}
