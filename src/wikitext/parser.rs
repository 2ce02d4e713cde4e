//! Recursive-descent wikitext parser.
//!
//! The page is first cut into logical lines (a template, link or HTML table
//! spanning several physical lines stays on one logical line). Block syntax
//! (headings, lists, wiki tables) is recognized per logical line; everything
//! inside a line goes through the inline parser, which uses the call stack for
//! nesting the way the scanner's template-parameter parser does.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use super::node::{is_void_tag, Node, NodeKind, WikiNode};

lazy_static! {
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref HTML_TAG: Regex =
        Regex::new(r"^<(/?)([A-Za-z][A-Za-z0-9]*)(\s[^<>]*?)?\s*(/?)>").unwrap();
    static ref HTML_ATTR: Regex = Regex::new(
        r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*(?:=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#
    )
    .unwrap();
}

const LIST_CHARS: &[char] = &['*', '#', ':', ';'];

/// Parses a page (or any wikitext fragment) into a `Root` node.
pub fn parse(text: &str) -> WikiNode {
    let text = COMMENT.replace_all(text, "");
    parse_blocks(&text, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Block level
// ─────────────────────────────────────────────────────────────────────────────

/// Open heading sections above the root; closing a heading attaches it to
/// whatever section encloses it.
struct Sections {
    root: WikiNode,
    open: Vec<WikiNode>,
}

impl Sections {
    fn new() -> Self {
        Self {
            root: WikiNode::new(NodeKind::Root),
            open: Vec::new(),
        }
    }

    fn container(&mut self) -> &mut Vec<Node> {
        match self.open.last_mut() {
            Some(heading) => &mut heading.children,
            None => &mut self.root.children,
        }
    }

    fn push(&mut self, node: Node) {
        push_merged(self.container(), node);
    }

    fn close_top(&mut self) {
        if let Some(heading) = self.open.pop() {
            self.push(Node::Element(heading));
        }
    }

    fn open_heading(&mut self, level: u8, title: Vec<Node>) {
        while let Some(open_level) = self.open.last().and_then(WikiNode::heading_level) {
            if open_level < level {
                break;
            }
            self.close_top();
        }
        let mut heading = WikiNode::new(NodeKind::Heading(level));
        heading.args.push(title);
        self.open.push(heading);
    }

    fn finish(mut self) -> WikiNode {
        while !self.open.is_empty() {
            self.close_top();
        }
        self.root
    }
}

fn push_merged(nodes: &mut Vec<Node>, node: Node) {
    if let Node::Text(text) = &node {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(last)) = nodes.last_mut() {
            last.push_str(text);
            return;
        }
    }
    nodes.push(node);
}

fn parse_blocks(text: &str, headings: bool) -> WikiNode {
    let lines = logical_lines(text);
    let mut sections = Sections::new();
    let mut index = 0;
    while index < lines.len() {
        let line = lines[index];
        let is_last = index + 1 == lines.len();

        if headings {
            if let Some((level, title)) = heading_line(line) {
                sections.open_heading(level, parse_inline(title));
                index += 1;
                continue;
            }
        }

        if line.trim_start().starts_with("{|") {
            let end = table_end(&lines, index);
            sections.push(Node::Element(parse_table(&lines[index..end])));
            index = end;
            continue;
        }

        if line.starts_with(LIST_CHARS) {
            let mut entries = Vec::new();
            while index < lines.len() && lines[index].starts_with(LIST_CHARS) {
                let line = lines[index];
                let prefix_len = line.len() - line.trim_start_matches(LIST_CHARS).len();
                let content = line[prefix_len..].trim_start();
                entries.push((line[..prefix_len].to_string(), parse_inline(content)));
                index += 1;
            }
            for list in build_lists(entries) {
                sections.push(list);
            }
            continue;
        }

        for node in parse_inline(line) {
            sections.push(node);
        }
        if !is_last {
            sections.push(Node::Text("\n".to_string()));
        }
        index += 1;
    }
    sections.finish()
}

fn heading_line(line: &str) -> Option<(u8, &str)> {
    let line = line.trim_end();
    if !line.starts_with('=') || line.contains('\n') {
        return None;
    }
    let lead = line.len() - line.trim_start_matches('=').len();
    let trail = line.len() - line.trim_end_matches('=').len();
    let level = lead.min(trail).min(6);
    if level == 0 || line.len() <= level * 2 {
        return None;
    }
    Some((level as u8, &line[level..line.len() - level]))
}

/// Cuts text at newlines that are not inside a template, link or HTML table.
fn logical_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut pos = 0;
    while pos < text.len() {
        let rest = &text[pos..];
        let span = if rest.starts_with("{{") {
            brace_span(rest, '{', '}')
        } else if rest.starts_with("[[") {
            brace_span(rest, '[', ']')
        } else if starts_with_ignore_case(rest, "<table") {
            html_table_span(rest)
        } else {
            None
        };
        if let Some(len) = span {
            pos += len;
            continue;
        }
        if rest.starts_with('\n') {
            lines.push(&text[start..pos]);
            start = pos + 1;
        }
        pos += rest.chars().next().map_or(1, char::len_utf8);
    }
    lines.push(&text[start..]);
    lines
}

/// Length of a balanced bracket run starting at `text[0]`, counting single
/// bracket characters so that `{{{1}}}` inside a template balances.
pub(crate) fn brace_span(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (index, c) in text.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(index + c.len_utf8());
            }
        } else if depth == 0 {
            return None;
        }
    }
    None
}

fn html_table_span(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = 0;
    while pos < text.len() {
        let rest = &text[pos..];
        if starts_with_ignore_case(rest, "<table") {
            depth += 1;
            pos += "<table".len();
        } else if starts_with_ignore_case(rest, "</table") {
            depth = depth.checked_sub(1)?;
            let close = rest.find('>').map_or(rest.len(), |gt| gt + 1);
            pos += close;
            if depth == 0 {
                return Some(pos);
            }
        } else {
            pos += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    None
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
}

/// Byte offset of the first ASCII case-insensitive occurrence of `needle`.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Lists
// ─────────────────────────────────────────────────────────────────────────────

enum ListStep {
    Append,
    Nest,
    Close,
}

/// Groups consecutive list lines into nested lists: a line whose prefix
/// extends the open list's prefix opens a list inside that list's last item.
fn build_lists(entries: Vec<(String, Vec<Node>)>) -> Vec<Node> {
    let mut out = Vec::new();
    let mut stack: Vec<WikiNode> = Vec::new();
    for (prefix, content) in entries {
        loop {
            let step = match stack.last() {
                Some(top) if top.name == prefix => ListStep::Append,
                Some(top) if prefix.starts_with(top.name.as_str()) => ListStep::Nest,
                Some(_) => ListStep::Close,
                None => ListStep::Nest,
            };
            match step {
                ListStep::Append => break,
                ListStep::Nest => {
                    stack.push(WikiNode::named(NodeKind::List, &prefix));
                    break;
                }
                ListStep::Close => close_list(&mut stack, &mut out),
            }
        }
        let mut item = WikiNode::named(NodeKind::ListItem, &prefix);
        item.children = content;
        if let Some(list) = stack.last_mut() {
            list.children.push(Node::Element(item));
        }
    }
    while !stack.is_empty() {
        close_list(&mut stack, &mut out);
    }
    out
}

fn close_list(stack: &mut Vec<WikiNode>, out: &mut Vec<Node>) {
    let Some(list) = stack.pop() else {
        return;
    };
    match stack.last_mut().and_then(|parent| parent.children.last_mut()) {
        Some(Node::Element(item)) => item.children.push(Node::Element(list)),
        _ => out.push(Node::Element(list)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiki tables
// ─────────────────────────────────────────────────────────────────────────────

fn table_end(lines: &[&str], start: usize) -> usize {
    let mut depth = 0usize;
    for (offset, line) in lines[start..].iter().enumerate() {
        let line = line.trim_start();
        if line.starts_with("{|") {
            depth += 1;
        } else if line.starts_with("|}") {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return start + offset + 1;
            }
        }
    }
    lines.len()
}

struct RawCell {
    kind: NodeKind,
    attrs: BTreeMap<String, String>,
    content: String,
}

#[derive(Default)]
struct RawRow {
    attrs: BTreeMap<String, String>,
    cells: Vec<RawCell>,
}

fn parse_table(lines: &[&str]) -> WikiNode {
    let mut table = WikiNode::new(NodeKind::Table);
    let Some((first, body)) = lines.split_first() else {
        return table;
    };
    table.attrs = parse_attrs(first.trim_start().trim_start_matches("{|"));

    let mut caption: Option<String> = None;
    let mut rows: Vec<RawRow> = Vec::new();
    let mut index = 0;
    while index < body.len() {
        let line = body[index];
        let trimmed = line.trim_start();
        index += 1;

        if trimmed.starts_with("{|") {
            let end = table_end(body, index - 1);
            let nested = body[index - 1..end].join("\n");
            index = end;
            if let Some(cell) = rows.last_mut().and_then(|row| row.cells.last_mut()) {
                cell.content.push('\n');
                cell.content.push_str(&nested);
            }
            continue;
        }
        if trimmed.starts_with("|}") {
            break;
        }
        if let Some(text) = trimmed.strip_prefix("|+") {
            caption = Some(text.trim().to_string());
            continue;
        }
        if let Some(attrs) = trimmed.strip_prefix("|-") {
            rows.push(RawRow {
                attrs: parse_attrs(attrs),
                cells: Vec::new(),
            });
            continue;
        }

        let cells: Vec<RawCell> = if let Some(text) = trimmed.strip_prefix('!') {
            split_top_level(text, "!!")
                .into_iter()
                .flat_map(|part| split_top_level(part, "||"))
                .map(|part| raw_cell(NodeKind::TableHeaderCell, part))
                .collect()
        } else if let Some(text) = trimmed.strip_prefix('|') {
            split_top_level(text, "||")
                .into_iter()
                .map(|part| raw_cell(NodeKind::TableCell, part))
                .collect()
        } else {
            if let Some(cell) = rows.last_mut().and_then(|row| row.cells.last_mut()) {
                cell.content.push('\n');
                cell.content.push_str(line);
            }
            continue;
        };
        if rows.is_empty() {
            rows.push(RawRow::default());
        }
        if let Some(row) = rows.last_mut() {
            row.cells.extend(cells);
        }
    }

    if let Some(text) = caption {
        let mut node = WikiNode::new(NodeKind::TableCaption);
        node.children = parse_inline(&text);
        table.children.push(Node::Element(node));
    }
    for row in rows {
        let mut row_node = WikiNode::new(NodeKind::TableRow);
        row_node.attrs = row.attrs;
        for cell in row.cells {
            let mut cell_node = WikiNode::new(cell.kind);
            cell_node.attrs = cell.attrs;
            cell_node.children = parse_blocks(cell.content.trim(), false).children;
            row_node.children.push(Node::Element(cell_node));
        }
        table.children.push(Node::Element(row_node));
    }
    table
}

/// A cell may start with attributes separated from the content by a single
/// top-level `|`.
fn raw_cell(kind: NodeKind, text: &str) -> RawCell {
    let parts = split_top_level(text, "|");
    let (attrs, content) = match parts.as_slice() {
        [attrs, ..] if parts.len() > 1 && !attrs.contains("[[") && !attrs.contains("{{") => {
            (parse_attrs(attrs), text[attrs.len() + 1..].to_string())
        }
        _ => (BTreeMap::new(), text.to_string()),
    };
    RawCell {
        kind,
        attrs,
        content,
    }
}

/// Splits at `separator` outside templates and links.
pub(crate) fn split_top_level<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut pos = 0;
    while pos < text.len() {
        let rest = &text[pos..];
        if rest.starts_with("{{") || rest.starts_with("[[") {
            depth += 1;
            pos += 2;
        } else if (rest.starts_with("}}") || rest.starts_with("]]")) && depth > 0 {
            depth -= 1;
            pos += 2;
        } else if depth == 0 && rest.starts_with(separator) {
            parts.push(&text[start..pos]);
            pos += separator.len();
            start = pos;
        } else {
            pos += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_attrs(text: &str) -> BTreeMap<String, String> {
    HTML_ATTR
        .captures_iter(text)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            (caps[1].to_ascii_lowercase(), value.to_string())
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Inline level
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Stop {
    TemplateArg,
    LinkArg,
    Italic,
    Bold,
    Html(String),
}

struct InlineParser<'a> {
    text: &'a str,
    pos: usize,
    stops: Vec<Stop>,
}

pub(crate) fn parse_inline(text: &str) -> Vec<Node> {
    let mut parser = InlineParser::new(text);
    parser.parse_nodes()
}

impl<'a> InlineParser<'a> {
    fn new(text: &'a str) -> Self {
        InlineParser {
            text,
            pos: 0,
            stops: Vec::new(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn consume(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.text.len());
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.rest().chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn stop_here(&self) -> bool {
        let rest = self.rest();
        self.stops.iter().any(|stop| match stop {
            Stop::TemplateArg => rest.starts_with('|') || rest.starts_with("}}"),
            Stop::LinkArg => rest.starts_with('|') || rest.starts_with("]]"),
            Stop::Italic => rest.starts_with("''") && !rest.starts_with("'''"),
            Stop::Bold => rest.starts_with("'''"),
            Stop::Html(tag) => is_closing_tag(rest, tag),
        })
    }

    /// Whether `marker` occurs again before the end of the physical line.
    fn closes_on_line(&self, skip: usize, marker: &str) -> bool {
        let rest = &self.rest()[skip..];
        let line = rest.split('\n').next().unwrap_or("");
        line.contains(marker)
    }

    // ─────────────────────────────────────────────────────────────
    // nodes ::= (template | link | bold | italic | html | text)*
    // ─────────────────────────────────────────────────────────────
    fn parse_nodes(&mut self) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut text = String::new();
        while !self.at_end() {
            if self.stop_here() {
                break;
            }
            let rest = self.rest();

            if rest.starts_with("{{{") {
                if let Some(len) = brace_span(rest, '{', '}') {
                    text.push_str(&rest[..len]);
                    self.consume(len);
                    continue;
                }
            }
            if rest.starts_with("{{") && brace_span(rest, '{', '}').is_some() {
                flush_text(&mut nodes, &mut text);
                nodes.push(Node::Element(self.parse_template()));
                continue;
            }
            if rest.starts_with("[[") && brace_span(rest, '[', ']').is_some() {
                flush_text(&mut nodes, &mut text);
                nodes.push(Node::Element(self.parse_link()));
                continue;
            }
            if rest.starts_with("'''") && self.closes_on_line(3, "'''") {
                flush_text(&mut nodes, &mut text);
                nodes.push(Node::Element(self.parse_quoted(NodeKind::Bold)));
                continue;
            }
            if rest.starts_with("''") && !rest.starts_with("'''") && self.closes_on_line(2, "''") {
                flush_text(&mut nodes, &mut text);
                nodes.push(Node::Element(self.parse_quoted(NodeKind::Italic)));
                continue;
            }
            if rest.starts_with('<') && self.parse_html(&mut nodes, &mut text) {
                continue;
            }
            if let Some(c) = self.consume_char() {
                text.push(c);
            }
        }
        flush_text(&mut nodes, &mut text);
        nodes
    }

    // ─────────────────────────────────────────────────────────────
    // template ::= "{{" nodes ("|" nodes)* "}}"
    // ─────────────────────────────────────────────────────────────
    fn parse_template(&mut self) -> WikiNode {
        self.consume(2);
        let mut node = WikiNode::new(NodeKind::Template);
        node.args = self.parse_args(Stop::TemplateArg, "}}");
        node
    }

    // ─────────────────────────────────────────────────────────────
    // link ::= "[[" nodes ("|" nodes)* "]]"
    // ─────────────────────────────────────────────────────────────
    fn parse_link(&mut self) -> WikiNode {
        self.consume(2);
        let mut node = WikiNode::new(NodeKind::Link);
        node.args = self.parse_args(Stop::LinkArg, "]]");
        node
    }

    fn parse_args(&mut self, stop: Stop, close: &str) -> Vec<Vec<Node>> {
        let mut args = Vec::new();
        self.stops.push(stop);
        loop {
            args.push(self.parse_nodes());
            if self.rest().starts_with('|') {
                self.consume(1);
                continue;
            }
            if self.rest().starts_with(close) {
                self.consume(close.len());
            }
            break;
        }
        self.stops.pop();
        args
    }

    fn parse_quoted(&mut self, kind: NodeKind) -> WikiNode {
        let (marker, stop) = match kind {
            NodeKind::Bold => ("'''", Stop::Bold),
            _ => ("''", Stop::Italic),
        };
        self.consume(marker.len());
        self.stops.push(stop);
        let mut node = WikiNode::new(kind);
        node.children = self.parse_nodes();
        self.stops.pop();
        if self.rest().starts_with(marker) {
            self.consume(marker.len());
        }
        node
    }

    // ─────────────────────────────────────────────────────────────
    // html ::= "<" tag attrs ">" nodes "</" tag ">" | "<" tag attrs "/>"
    // ─────────────────────────────────────────────────────────────
    fn parse_html(&mut self, nodes: &mut Vec<Node>, text: &mut String) -> bool {
        let rest = self.rest();
        let Some(caps) = HTML_TAG.captures(rest) else {
            return false;
        };
        let tag_len = caps[0].len();
        let tag = caps[2].to_ascii_lowercase();
        if &caps[1] == "/" {
            // stray closing tag
            self.consume(tag_len);
            return true;
        }
        let attrs = caps.get(3).map_or("", |m| m.as_str());
        let self_closing = &caps[4] == "/" || is_void_tag(&tag);
        self.consume(tag_len);

        if tag == "nowiki" {
            if !self_closing {
                let end = find_ignore_case(self.rest(), "</nowiki").unwrap_or(self.rest().len());
                text.push_str(&self.rest()[..end]);
                self.consume(end);
                self.skip_closing_tag();
            }
            return true;
        }

        flush_text(nodes, text);
        let kind = match tag.as_str() {
            "table" => NodeKind::Table,
            "tr" => NodeKind::TableRow,
            "th" => NodeKind::TableHeaderCell,
            "td" => NodeKind::TableCell,
            "caption" => NodeKind::TableCaption,
            _ => NodeKind::Html,
        };
        let mut node = WikiNode::new(kind);
        if kind == NodeKind::Html {
            node.name = tag.clone();
        }
        node.attrs = parse_attrs(attrs);

        let closes = !self_closing && find_ignore_case(self.rest(), &format!("</{tag}")).is_some();
        if closes {
            self.stops.push(Stop::Html(tag.clone()));
            node.children = self.parse_nodes();
            self.stops.pop();
            if is_closing_tag(self.rest(), &tag) {
                self.skip_closing_tag();
            }
        }
        nodes.push(Node::Element(node));
        true
    }

    fn skip_closing_tag(&mut self) {
        let len = self.rest().find('>').map_or(self.rest().len(), |gt| gt + 1);
        self.consume(len);
    }
}

fn is_closing_tag(text: &str, tag: &str) -> bool {
    text.starts_with("</")
        && text
            .get(2..2 + tag.len())
            .map_or(false, |name| name.eq_ignore_ascii_case(tag))
        && text[2 + tag.len()..]
            .chars()
            .next()
            .map_or(true, |c| c == '>' || c.is_whitespace())
}

fn flush_text(nodes: &mut Vec<Node>, text: &mut String) {
    if !text.is_empty() {
        push_merged(nodes, Node::Text(std::mem::take(text)));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests for the wikitext parser
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wikitext::node::plain_text;

    fn elements(nodes: &[Node]) -> Vec<&WikiNode> {
        nodes.iter().filter_map(Node::as_element).collect()
    }

    // ─────────────────────────────────────────────────────────────
    // Headings
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn headings_nest_by_level() {
        let root = parse("==A==\n===B===\ntext\n====C====\n==D==");
        let top: Vec<_> = root.find_headings().collect();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].kind, NodeKind::Heading(2));
        assert_eq!(plain_text(&top[0].args[0]), "A");
        let b = top[0].find_headings().next().unwrap();
        assert_eq!(b.find_headings().next().unwrap().kind, NodeKind::Heading(4));
        assert_eq!(plain_text(&top[1].args[0]), "D");
    }

    #[test]
    fn heading_title_keeps_templates() {
        let root = parse("== słownik ({{język polski}}) ==");
        let heading = root.find_headings().next().unwrap();
        let template = heading.find_content(NodeKind::Template)[0];
        assert_eq!(template.template_name(), "język polski");
    }

    // ─────────────────────────────────────────────────────────────
    // Lists
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn list_items_nest_by_prefix() {
        let root = parse(":[1] gloss1\n::[a] subglossA\n::[b] subglossB\n:[2] gloss2");
        let lists: Vec<_> = root.find_child(NodeKind::List).collect();
        assert_eq!(lists.len(), 1);
        let items: Vec<_> = lists[0].find_child(NodeKind::ListItem).collect();
        assert_eq!(items.len(), 2);
        let nested = items[0].find_child(NodeKind::List).next().unwrap();
        assert_eq!(nested.name, "::");
        assert_eq!(nested.find_child(NodeKind::ListItem).count(), 2);
        assert_eq!(plain_text(&items[1].children), "[2] gloss2");
    }

    #[test]
    fn different_prefixes_make_separate_lists() {
        let root = parse("* {{trans.}}\n:[1] a\n* {{intrans.}}\n:[2] b");
        let names: Vec<_> = root
            .find_child(NodeKind::List)
            .map(|list| list.name.as_str())
            .collect();
        assert_eq!(names, vec!["*", ":", "*", ":"]);
    }

    #[test]
    fn multiline_template_stays_in_list_item() {
        let root = parse("* a {{t|x\n|y}}\n* b");
        let list = root.find_child(NodeKind::List).next().unwrap();
        assert_eq!(list.find_child(NodeKind::ListItem).count(), 2);
    }

    // ─────────────────────────────────────────────────────────────
    // Tables
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn wiki_table_cells_and_spans() {
        let root = parse("{| class=\"t\"\n! a !! colspan=\"2\" | b\n|-\n| c || d\n|}");
        let table = root.find_child(NodeKind::Table).next().unwrap();
        assert_eq!(table.attr("class"), "t");
        let rows: Vec<_> = table.find_child(NodeKind::TableRow).collect();
        assert_eq!(rows.len(), 2);
        let headers: Vec<_> = rows[0].find_child(NodeKind::TableHeaderCell).collect();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1].attr("colspan"), "2");
        assert_eq!(plain_text(&headers[1].children), "b");
        let cells: Vec<_> = rows[1].find_child(NodeKind::TableCell).collect();
        assert_eq!(plain_text(&cells[1].children), "d");
    }

    #[test]
    fn cell_content_continues_on_next_line() {
        let root = parse("{|\n|-\n| one\ntwo\n|}");
        let table = root.find_child(NodeKind::Table).next().unwrap();
        let row = table.find_child(NodeKind::TableRow).next().unwrap();
        let cell = row.find_child(NodeKind::TableCell).next().unwrap();
        assert_eq!(plain_text(&cell.children), "one\ntwo");
    }

    #[test]
    fn html_table_maps_to_table_nodes() {
        let root = parse("* x：<table><tr><th>h</th></tr><tr><td>d</td></tr></table>");
        let item = root
            .find_child(NodeKind::List)
            .next()
            .unwrap()
            .find_child(NodeKind::ListItem)
            .next()
            .unwrap();
        let table = item.find_child(NodeKind::Table).next().unwrap();
        let rows: Vec<_> = table.find_child(NodeKind::TableRow).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].find_child(NodeKind::TableHeaderCell).count(), 1);
    }

    // ─────────────────────────────────────────────────────────────
    // Inline markup
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn link_with_display_inside_italic() {
        let nodes = parse_inline("''[[a#b|c]]'' d");
        let italic = elements(&nodes)[0];
        assert_eq!(italic.kind, NodeKind::Italic);
        let link = elements(&italic.children)[0];
        assert_eq!(link.args.len(), 2);
        assert_eq!(plain_text(&link.args[1]), "c");
    }

    #[test]
    fn bold_inside_italic() {
        let nodes = parse_inline("''a '''b''' c''");
        let italic = elements(&nodes)[0];
        assert_eq!(elements(&italic.children)[0].kind, NodeKind::Bold);
        assert_eq!(plain_text(&italic.children), "a b c");
    }

    #[test]
    fn nested_templates() {
        let nodes = parse_inline("{{K|{{inner|x}}|ft=a [[b]]}}");
        let template = elements(&nodes)[0];
        assert_eq!(template.args.len(), 3);
        assert_eq!(elements(&template.args[1])[0].template_name(), "inner");
    }

    #[test]
    fn unclosed_template_is_text() {
        assert_eq!(parse_inline("{{abc"), vec![Node::Text("{{abc".into())]);
    }

    #[test]
    fn template_parameter_reference_is_text() {
        let nodes = parse_inline("a {{{1|b}}} c");
        assert_eq!(nodes, vec![Node::Text("a {{{1|b}}} c".into())]);
    }

    #[test]
    fn comments_are_dropped() {
        let root = parse("a<!-- hidden\nstill hidden -->b");
        assert_eq!(root.children, vec![Node::Text("ab".into())]);
    }

    #[test]
    fn html_attributes_and_void_tags() {
        let nodes = parse_inline(r#"<span class="tr Latn" lang=zh>x<br/>y</span>"#);
        let span = elements(&nodes)[0];
        assert_eq!(span.name, "span");
        assert_eq!(span.attr("class"), "tr Latn");
        assert_eq!(span.attr("lang"), "zh");
        assert_eq!(elements(&span.children)[0].name, "br");
    }

    #[test]
    fn nowiki_is_literal() {
        let nodes = parse_inline("<nowiki>{{x}}</nowiki>");
        assert_eq!(nodes, vec![Node::Text("{{x}}".into())]);
    }

    #[test]
    fn closing_tags_match_any_case() {
        let nodes = parse_inline("<SPAN>x</Span> y <NOWIKI>{{z}}</NoWiki>");
        let span = elements(&nodes)[0];
        assert_eq!(span.name, "span");
        assert_eq!(span.children, vec![Node::Text("x".into())]);
        assert_eq!(nodes[1], Node::Text(" y {{z}}".into()));
        assert_eq!(html_table_span("<TABLE><tr><td>a</td></tr></Table> rest"), Some(34));
    }

    #[test]
    fn case_insensitive_search_offsets() {
        assert_eq!(find_ignore_case("aé</SPAN>", "</span"), Some(3));
        assert_eq!(find_ignore_case("no close", "</span"), None);
        assert_eq!(find_ignore_case("ab", "</span"), None);
    }

    #[test]
    fn split_top_level_ignores_nested_pipes() {
        assert_eq!(
            split_top_level("a|{{b|c}}|[[d|e]]", "|"),
            vec!["a", "{{b|c}}", "[[d|e]]"]
        );
    }
}
