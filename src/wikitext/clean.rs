//! Renders node trees to display text.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

use super::node::{to_wikitext, Node, NodeKind, WikiNode};
use crate::context::Context;

lazy_static! {
    static ref ENTITY: Regex = Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap();
    static ref SPACES: Regex = Regex::new(r"[ \t\u{a0}\u{2009}]+").unwrap();
}

/// Receives `[[Category:...]]` links met while cleaning.
pub trait CategorySink {
    fn add_category(&mut self, category: String);
}

/// Renders `nodes` to plain text: templates are expanded (unknown ones
/// render as nothing), links show their label, and category links go to
/// `sink`.
pub fn clean_node(ctx: &Context<'_>, sink: Option<&mut dyn CategorySink>, nodes: &[Node]) -> String {
    let mut renderer = Renderer {
        ctx,
        sink,
        out: String::new(),
    };
    renderer.render_nodes(nodes);
    clean_value(&renderer.out)
}

pub fn clean_element(ctx: &Context<'_>, sink: Option<&mut dyn CategorySink>, node: &WikiNode) -> String {
    let mut renderer = Renderer {
        ctx,
        sink,
        out: String::new(),
    };
    renderer.render_element(node);
    clean_value(&renderer.out)
}

struct Renderer<'c, 'a, 's> {
    ctx: &'c Context<'a>,
    sink: Option<&'s mut dyn CategorySink>,
    out: String,
}

impl Renderer<'_, '_, '_> {
    fn render_nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Element(element) => self.render_element(element),
            }
        }
    }

    fn newline(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn render_element(&mut self, node: &WikiNode) {
        match node.kind {
            NodeKind::Root
            | NodeKind::Italic
            | NodeKind::Bold
            | NodeKind::TableCaption
            | NodeKind::TableHeaderCell
            | NodeKind::TableCell => self.render_nodes(&node.children),
            NodeKind::Heading(_) => {
                for arg in &node.args {
                    self.render_nodes(arg);
                }
                self.newline();
                self.render_nodes(&node.children);
            }
            NodeKind::Template => {
                if let Some(expanded) = self.ctx.expand_template(node) {
                    self.render_nodes(&expanded.children);
                }
            }
            NodeKind::Link => self.render_link(node),
            NodeKind::List | NodeKind::Table => {
                for child in &node.children {
                    if let Node::Element(element) = child {
                        self.newline();
                        self.render_element(element);
                    }
                }
                self.newline();
            }
            NodeKind::ListItem => {
                for child in &node.children {
                    match child {
                        Node::Element(list) if list.kind == NodeKind::List => {
                            self.render_element(list);
                        }
                        Node::Element(element) => self.render_element(element),
                        Node::Text(text) => self.out.push_str(text),
                    }
                }
            }
            NodeKind::TableRow => {
                for cell in node.children.iter().filter_map(Node::as_element) {
                    if !self.out.ends_with('\n') && !self.out.is_empty() {
                        self.out.push(' ');
                    }
                    self.render_element(cell);
                }
            }
            NodeKind::Html => match node.name.as_str() {
                "br" => self.out.push('\n'),
                "ref" => {}
                _ => self.render_nodes(&node.children),
            },
        }
    }

    fn render_link(&mut self, node: &WikiNode) {
        let Some(target_nodes) = node.args.first() else {
            return;
        };
        let target = to_wikitext(target_nodes);
        let target = target.trim();
        let profile = self.ctx.profile();

        if let Some(plain) = target.strip_prefix(':') {
            match node.args.last() {
                Some(label) if node.args.len() > 1 => self.render_nodes(label),
                _ => self.out.push_str(plain),
            }
            return;
        }
        if let Some((namespace, name)) = target.split_once(':') {
            let namespace = namespace.trim();
            if profile.is_category_namespace(namespace) {
                if let Some(sink) = self.sink.as_deref_mut() {
                    sink.add_category(name.trim().to_string());
                }
                return;
            }
            if profile.is_file_namespace(namespace) {
                if node.args.len() == 1 {
                    self.out.push_str(target);
                }
                return;
            }
        }
        match node.args.last() {
            Some(label) if node.args.len() > 1 => self.render_nodes(label),
            _ => {
                let shown = match target.split_once('#') {
                    Some((page, _)) if !page.is_empty() => page,
                    _ => target,
                };
                self.out.push_str(shown);
            }
        }
    }
}

/// Normalizes rendered text: entities decoded, `-{ }-` conversion markers
/// removed, whitespace collapsed per line, blank lines dropped, NFC.
pub fn clean_value(text: &str) -> String {
    let decoded = ENTITY.replace_all(text, |caps: &Captures| decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string()));
    let unmarked = decoded.replace("-{", "").replace("}-", "");
    let lines: Vec<String> = unmarked
        .lines()
        .map(|line| SPACES.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    lines.join("\n").nfc().collect()
}

fn decode_entity(entity: &str) -> Option<String> {
    if let Some(number) = entity.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let decoded = match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" | "thinsp" | "ensp" | "emsp" => " ",
        "ndash" => "–",
        "mdash" => "—",
        "hellip" => "…",
        "middot" => "·",
        _ => return None,
    };
    Some(decoded.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_profile, ExtractorConfig};
    use crate::model::WordEntry;
    use crate::store::PageStore;

    fn with_context(store: &PageStore, edition: &str, check: impl FnOnce(&mut Context<'_>)) {
        let config = ExtractorConfig::for_edition(edition);
        let mut ctx = Context::new(store, builtin_profile(edition).unwrap(), &config);
        ctx.start_page("Beispiel");
        check(&mut ctx);
    }

    #[test]
    fn links_show_label_and_record_categories() {
        let store = PageStore::new();
        with_context(&store, "de", |ctx| {
            let root = ctx.parse("[[Haus|Häuser]] und [[Hof#Deutsch]][[Kategorie:Substantiv]]");
            let mut entry = WordEntry::new("Beispiel", "Deutsch", "de");
            assert_eq!(ctx.clean_into(&mut entry, &root.children), "Häuser und Hof");
            assert_eq!(entry.categories, vec!["Substantiv"]);
        });
    }

    #[test]
    fn templates_expand_or_vanish() {
        let mut store = PageStore::new();
        store.add_page("Vorlage:K", "{{{1}}}:");
        with_context(&store, "de", |ctx| {
            let root = ctx.parse("{{K|refl.}} {{unbekannt|x}} sich");
            assert_eq!(ctx.clean(&root.children), "refl.: sich");
        });
    }

    #[test]
    fn markup_and_entities() {
        let store = PageStore::new();
        with_context(&store, "zh", |ctx| {
            let root = ctx.parse("''-{大矢}-''&nbsp;&amp;<ref>note</ref> a<br>b");
            assert_eq!(ctx.clean(&root.children), "大矢 & a\nb");
        });
    }

    #[test]
    fn file_links() {
        let store = PageStore::new();
        with_context(&store, "zh", |ctx| {
            let root = ctx.parse("[[File:Zh-dajia.ogg]][[File:Pic.png|thumb|caption]]");
            assert_eq!(ctx.clean(&root.children), "File:Zh-dajia.ogg");
        });
    }

    #[test]
    fn output_is_nfc() {
        assert_eq!(clean_value("e\u{301}  x "), "\u{e9} x");
    }
}
