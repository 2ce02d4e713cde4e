use std::collections::BTreeSet;
use std::fmt::Display;

use tracing::{debug, warn};

use crate::config::{EditionProfile, ExtractorConfig};
use crate::store::{Page, PageStore};
use crate::wikitext::clean::{clean_element, clean_node, CategorySink};
use crate::wikitext::expand::Expander;
use crate::wikitext::node::{Node, WikiNode};
use crate::wikitext::parser;

/// Per-page extraction state.
///
/// One `Context` serves one worker: it is reset by `start_page` and never
/// shared between threads. The store, profile and config it borrows are
/// read-only.
pub struct Context<'a> {
    store: &'a PageStore,
    profile: &'a EditionProfile,
    config: &'a ExtractorConfig,
    title: String,
    section: String,
    visited: BTreeSet<String>,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a PageStore, profile: &'a EditionProfile, config: &'a ExtractorConfig) -> Self {
        Self {
            store,
            profile,
            config,
            title: String::new(),
            section: String::new(),
            visited: BTreeSet::new(),
        }
    }

    pub fn start_page(&mut self, title: &str) {
        self.title = title.to_string();
        self.section.clear();
        self.visited.clear();
    }

    pub fn start_section(&mut self, section: &str) {
        self.section = section.to_string();
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn profile(&self) -> &'a EditionProfile {
        self.profile
    }

    pub fn config(&self) -> &'a ExtractorConfig {
        self.config
    }

    pub fn get_page(&self, title: &str) -> Option<&'a Page> {
        self.store.get_page(title)
    }

    /// Marks a subpage as being extracted. Returns false when it is the
    /// current page or was already entered while extracting this page.
    pub fn enter_subpage(&mut self, title: &str) -> bool {
        title != self.title && self.visited.insert(title.to_string())
    }

    pub fn expander(&self) -> Expander<'_> {
        Expander::new(self.store, &self.profile.template_namespace, &self.title)
    }

    pub fn parse(&self, text: &str) -> WikiNode {
        parser::parse(text)
    }

    pub fn parse_expanded(&self, text: &str) -> WikiNode {
        parser::parse(&self.expander().expand_all(text))
    }

    /// Expands a template call and parses the result, or `None` when the
    /// template is not in the store.
    pub fn expand_template(&self, node: &WikiNode) -> Option<WikiNode> {
        let expander = self.expander();
        if !expander.template_exists(&node.template_name()) {
            return None;
        }
        Some(parser::parse(&expander.expand_all(&node.to_wikitext())))
    }

    /// Re-parses a node with all known templates expanded.
    pub fn expand_node(&self, node: &WikiNode) -> WikiNode {
        self.parse_expanded(&node.to_wikitext())
    }

    pub fn clean(&self, nodes: &[Node]) -> String {
        clean_node(self, None, nodes)
    }

    pub fn clean_element(&self, node: &WikiNode) -> String {
        clean_element(self, None, node)
    }

    /// Cleans `nodes`, recording any category links on `sink`.
    pub fn clean_into(&self, sink: &mut dyn CategorySink, nodes: &[Node]) -> String {
        clean_node(self, Some(sink), nodes)
    }

    pub fn warn(&self, site: &str, message: impl Display) {
        warn!(title = %self.title, section = %self.section, site, "{message}");
    }

    pub fn debug(&self, site: &str, message: impl Display) {
        debug!(title = %self.title, section = %self.section, site, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_profile;

    #[test]
    fn subpages_are_entered_once() {
        let store = PageStore::new();
        let config = ExtractorConfig::for_edition("nl");
        let mut ctx = Context::new(&store, builtin_profile("nl").unwrap(), &config);
        ctx.start_page("lopen");
        assert!(!ctx.enter_subpage("lopen"));
        assert!(ctx.enter_subpage("lopen/vervoeging"));
        assert!(!ctx.enter_subpage("lopen/vervoeging"));
        ctx.start_page("lopen");
        assert!(ctx.enter_subpage("lopen/vervoeging"));
    }

    #[test]
    fn expand_template_needs_a_stored_page() {
        let mut store = PageStore::new();
        store.add_page("Template:m", "<abbr title=\"masculine\">m</abbr>");
        let config = ExtractorConfig::for_edition("zh");
        let mut ctx = Context::new(&store, builtin_profile("zh").unwrap(), &config);
        ctx.start_page("字典");
        let root = ctx.parse("{{m}}{{f}}");
        let templates: Vec<_> = root.children.iter().filter_map(Node::as_element).collect();
        let expanded = ctx.expand_template(templates[0]).unwrap();
        assert_eq!(expanded.find_html("abbr")[0].attr("title"), "masculine");
        assert!(ctx.expand_template(templates[1]).is_none());
    }
}
