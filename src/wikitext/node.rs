use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    /// Section heading; the level is the number of `=` signs.
    Heading(u8),
    Template,
    Link,
    List,
    ListItem,
    Table,
    TableCaption,
    TableRow,
    TableHeaderCell,
    TableCell,
    Italic,
    Bold,
    /// Any HTML element that is not part of a table; `name` holds the tag.
    Html,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Element(WikiNode),
}

impl Node {
    pub fn as_element(&self) -> Option<&WikiNode> {
        match self {
            Node::Element(node) => Some(node),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(text) => Some(text),
            Node::Element(_) => None,
        }
    }

    pub fn is_kind(&self, kind: NodeKind) -> bool {
        matches!(self, Node::Element(node) if node.kind == kind)
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Node::Text(text) if text.trim().is_empty())
    }
}

/// Key of a template argument: `{{t|zh|字典|tr=zìdiǎn}}` has positional keys
/// 1 and 2 and the named key "tr".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParamKey {
    Positional(usize),
    Named(String),
}

impl From<usize> for ParamKey {
    fn from(index: usize) -> Self {
        ParamKey::Positional(index)
    }
}

impl From<&str> for ParamKey {
    fn from(name: &str) -> Self {
        match name.parse::<usize>() {
            Ok(index) => ParamKey::Positional(index),
            Err(_) => ParamKey::Named(name.to_string()),
        }
    }
}

/// An element of the parsed page.
///
/// Headings keep their title in `args[0]` and their section body (including
/// nested headings) in `children`. Templates and links keep everything
/// between the delimiters in `args`, split at top-level pipes; for templates
/// `args[0]` is the name. Lists and list items carry their prefix
/// (`"#"`, `"#:"`, ...) in `name`; HTML elements carry their tag there.
#[derive(Debug, Clone, PartialEq)]
pub struct WikiNode {
    pub kind: NodeKind,
    pub name: String,
    pub args: Vec<Vec<Node>>,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

impl WikiNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            name: String::new(),
            args: Vec::new(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn named(kind: NodeKind, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::new(kind)
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self.kind, NodeKind::Heading(_))
    }

    pub fn heading_level(&self) -> Option<u8> {
        match self.kind {
            NodeKind::Heading(level) => Some(level),
            _ => None,
        }
    }

    pub fn attr(&self, name: &str) -> &str {
        self.attrs.get(name).map(String::as_str).unwrap_or("")
    }

    // ─────────────────────────────────────────────────────────────
    // Templates
    // ─────────────────────────────────────────────────────────────

    /// Name of a template call, trimmed, with any `Template:` style prefix
    /// left in place.
    pub fn template_name(&self) -> String {
        match self.args.first() {
            Some(name) if self.kind == NodeKind::Template => plain_text(name).trim().to_string(),
            _ => String::new(),
        }
    }

    /// Arguments keyed by position (1-based) or name. An argument is named
    /// when its leading text contains `=`. Values are trimmed.
    pub fn template_parameters(&self) -> BTreeMap<ParamKey, Vec<Node>> {
        let mut params = BTreeMap::new();
        if self.kind != NodeKind::Template {
            return params;
        }
        let mut position = 0;
        for arg in self.args.iter().skip(1) {
            let named = match arg.first() {
                Some(Node::Text(text)) => text
                    .find('=')
                    .map(|eq| (text[..eq].trim().to_string(), text[eq + 1..].to_string())),
                _ => None,
            };
            match named {
                Some((name, rest)) => {
                    let mut value = Vec::with_capacity(arg.len());
                    if !rest.is_empty() {
                        value.push(Node::Text(rest));
                    }
                    value.extend(arg.iter().skip(1).cloned());
                    params.insert(ParamKey::from(name.as_str()), trim_nodes(value));
                }
                None => {
                    position += 1;
                    params.insert(ParamKey::Positional(position), trim_nodes(arg.clone()));
                }
            }
        }
        params
    }

    pub fn template_arg(&self, key: impl Into<ParamKey>) -> Option<Vec<Node>> {
        self.template_parameters().remove(&key.into())
    }

    /// Argument as plain wikitext, for arguments that hold codes or names.
    pub fn template_arg_text(&self, key: impl Into<ParamKey>) -> String {
        self.template_arg(key)
            .map(|nodes| to_wikitext(&nodes).trim().to_string())
            .unwrap_or_default()
    }

    // ─────────────────────────────────────────────────────────────
    // Child lookup
    // ─────────────────────────────────────────────────────────────

    pub fn find_child(&self, kind: NodeKind) -> impl Iterator<Item = &WikiNode> {
        self.children
            .iter()
            .filter_map(Node::as_element)
            .filter(move |node| node.kind == kind)
    }

    pub fn find_child_any<'s>(
        &'s self,
        kinds: &'s [NodeKind],
    ) -> impl Iterator<Item = &'s WikiNode> {
        self.children
            .iter()
            .filter_map(Node::as_element)
            .filter(move |node| kinds.contains(&node.kind))
    }

    pub fn find_headings(&self) -> impl Iterator<Item = &WikiNode> {
        self.children
            .iter()
            .filter_map(Node::as_element)
            .filter(|node| node.is_heading())
    }

    /// Children that are not elements of `kind`.
    pub fn invert_find_child(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(move |node| !node.is_kind(kind))
    }

    pub fn contains_child(&self, kind: NodeKind) -> bool {
        self.children.iter().any(|node| node.is_kind(kind))
    }

    /// Elements of `kind` in a heading's title or in its body before the
    /// first nested heading.
    pub fn find_content(&self, kind: NodeKind) -> Vec<&WikiNode> {
        let title = self.args.iter().flatten();
        let body = self
            .children
            .iter()
            .take_while(|node| !matches!(node, Node::Element(child) if child.is_heading()));
        title
            .chain(body)
            .filter_map(Node::as_element)
            .filter(|node| node.kind == kind)
            .collect()
    }

    /// Every descendant of `kind`, in document order, searching arguments
    /// as well as children.
    pub fn find_child_recursively(&self, kind: NodeKind) -> Vec<&WikiNode> {
        let mut found = Vec::new();
        self.collect_descendants(&mut |node: &WikiNode| node.kind == kind, &mut found);
        found
    }

    pub fn find_headings_recursively(&self) -> Vec<&WikiNode> {
        let mut found = Vec::new();
        self.collect_descendants(&mut |node: &WikiNode| node.is_heading(), &mut found);
        found
    }

    fn collect_descendants<'s>(
        &'s self,
        matches: &mut dyn FnMut(&WikiNode) -> bool,
        found: &mut Vec<&'s WikiNode>,
    ) {
        for node in self.args.iter().flatten().chain(self.children.iter()) {
            if let Node::Element(child) = node {
                if matches(child) {
                    found.push(child);
                }
                child.collect_descendants(matches, found);
            }
        }
    }

    pub fn find_html(&self, tag: &str) -> Vec<&WikiNode> {
        self.children
            .iter()
            .filter_map(Node::as_element)
            .filter(|node| node.kind == NodeKind::Html && node.name == tag)
            .collect()
    }

    /// HTML elements with `tag` anywhere below this node, optionally only
    /// those carrying `attr`.
    pub fn find_html_recursively(&self, tag: &str, attr: Option<&str>) -> Vec<&WikiNode> {
        let mut found = Vec::new();
        self.collect_descendants(
            &mut |node: &WikiNode| {
                node.kind == NodeKind::Html
                    && node.name == tag
                    && attr.map_or(true, |name| node.attrs.contains_key(name))
            },
            &mut found,
        );
        found
    }

    /// Children without the whitespace-only text between elements.
    pub fn filter_empty_str_child(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(|node| !node.is_blank())
    }

    pub fn to_wikitext(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

/// Concatenated text of the nodes and all their descendants, without markup.
pub fn plain_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => out.push_str(&plain_text(&element.children)),
        }
    }
    out
}

fn trim_nodes(mut nodes: Vec<Node>) -> Vec<Node> {
    if let Some(Node::Text(text)) = nodes.first_mut() {
        *text = text.trim_start().to_string();
    }
    if let Some(Node::Text(text)) = nodes.last_mut() {
        *text = text.trim_end().to_string();
    }
    nodes.retain(|node| !matches!(node, Node::Text(text) if text.is_empty()));
    nodes
}

// ─────────────────────────────────────────────────────────────────────────────
// Wikitext serialization
// ─────────────────────────────────────────────────────────────────────────────

pub fn to_wikitext(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => out.push_str(text),
        Node::Element(element) => write_element(element, out),
    }
}

fn write_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        write_node(node, out);
    }
}

fn write_args(args: &[Vec<Node>], out: &mut String) {
    for (index, arg) in args.iter().enumerate() {
        if index > 0 {
            out.push('|');
        }
        write_nodes(arg, out);
    }
}

fn write_attrs(attrs: &BTreeMap<String, String>, out: &mut String) {
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(value);
        out.push('"');
    }
}

fn ensure_newline(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn write_element(node: &WikiNode, out: &mut String) {
    match node.kind {
        NodeKind::Root => write_nodes(&node.children, out),
        NodeKind::Heading(level) => {
            ensure_newline(out);
            let marks = "=".repeat(level as usize);
            out.push_str(&marks);
            for arg in &node.args {
                write_nodes(arg, out);
            }
            out.push_str(&marks);
            out.push('\n');
            write_nodes(&node.children, out);
        }
        NodeKind::Template => {
            out.push_str("{{");
            write_args(&node.args, out);
            out.push_str("}}");
        }
        NodeKind::Link => {
            out.push_str("[[");
            write_args(&node.args, out);
            out.push_str("]]");
        }
        NodeKind::List => {
            ensure_newline(out);
            write_nodes(&node.children, out);
        }
        NodeKind::ListItem => {
            ensure_newline(out);
            out.push_str(&node.name);
            write_nodes(&node.children, out);
            ensure_newline(out);
        }
        NodeKind::Table => {
            ensure_newline(out);
            out.push_str("{|");
            write_attrs(&node.attrs, out);
            out.push('\n');
            write_nodes(&node.children, out);
            ensure_newline(out);
            out.push_str("|}\n");
        }
        NodeKind::TableCaption => {
            ensure_newline(out);
            out.push_str("|+");
            write_nodes(&node.children, out);
            out.push('\n');
        }
        NodeKind::TableRow => {
            ensure_newline(out);
            out.push_str("|-");
            write_attrs(&node.attrs, out);
            out.push('\n');
            for cell in node.children.iter().filter(|child| !child.is_blank()) {
                write_node(cell, out);
            }
        }
        NodeKind::TableHeaderCell | NodeKind::TableCell => {
            ensure_newline(out);
            out.push(if node.kind == NodeKind::TableHeaderCell { '!' } else { '|' });
            if !node.attrs.is_empty() {
                write_attrs(&node.attrs, out);
                out.push_str(" |");
            }
            out.push(' ');
            write_nodes(&node.children, out);
            out.push('\n');
        }
        NodeKind::Italic => {
            out.push_str("''");
            write_nodes(&node.children, out);
            out.push_str("''");
        }
        NodeKind::Bold => {
            out.push_str("'''");
            write_nodes(&node.children, out);
            out.push_str("'''");
        }
        NodeKind::Html => {
            out.push('<');
            out.push_str(&node.name);
            write_attrs(&node.attrs, out);
            if is_void_tag(&node.name) {
                out.push('>');
            } else {
                out.push('>');
                write_nodes(&node.children, out);
                out.push_str("</");
                out.push_str(&node.name);
                out.push('>');
            }
        }
    }
}

pub(crate) fn is_void_tag(tag: &str) -> bool {
    matches!(tag, "br" | "hr" | "wbr" | "img")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wikitext::parser::parse;

    #[test]
    fn template_parameters_positional_and_named() {
        let root = parse("{{t+|zh|字典|tr= zìdiǎn }}");
        let template = root.find_child(NodeKind::Template).next().unwrap();
        assert_eq!(template.template_name(), "t+");
        let params = template.template_parameters();
        assert_eq!(params[&ParamKey::Positional(1)], vec![Node::Text("zh".into())]);
        assert_eq!(params[&ParamKey::Positional(2)], vec![Node::Text("字典".into())]);
        assert_eq!(params[&ParamKey::from("tr")], vec![Node::Text("zìdiǎn".into())]);
    }

    #[test]
    fn numbered_named_parameter_is_positional() {
        let root = parse("{{audio|2=Zh-dajia.ogg|zh}}");
        let template = root.find_child(NodeKind::Template).next().unwrap();
        assert_eq!(template.template_arg_text(1), "zh");
        assert_eq!(template.template_arg_text(2), "Zh-dajia.ogg");
    }

    #[test]
    fn find_content_stops_at_nested_heading() {
        let root = parse("== a {{x}} ==\n{{y}}\n=== b ===\n{{z}}");
        let heading = root.find_headings().next().unwrap();
        let names: Vec<String> = heading
            .find_content(NodeKind::Template)
            .iter()
            .map(|node| node.template_name())
            .collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn find_child_recursively_searches_arguments() {
        let root = parse("{{outer|[[inner]]}} [[other]]");
        assert_eq!(root.find_child_recursively(NodeKind::Link).len(), 2);
    }

    #[test]
    fn find_html_recursively_with_attribute() {
        let root = parse(r#"<div><span lang="zh">甲</span><span>乙</span></div>"#);
        let spans = root.find_html_recursively("span", Some("lang"));
        assert_eq!(spans.len(), 1);
        assert_eq!(plain_text(&spans[0].children), "甲");
    }

    #[test]
    fn wikitext_round_trip_of_template() {
        let text = "{{multitrans|data=\n* 英語：{{t+|en|dictionary}}\n}}";
        let root = parse(text);
        assert_eq!(root.to_wikitext(), text);
    }
}
