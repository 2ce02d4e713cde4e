//! Inflection tables.
//!
//! Form templates are expanded before the resulting tables are walked. A
//! simple grid has one header row and one header column. Conjugation tables
//! use merged cells: header spans stay active for the rows and columns they
//! cover, and an all-header row that follows data rows starts a new region.

use crate::config::TemplateRole;
use crate::context::Context;
use crate::model::{push_unique, Form, WordEntry};
use crate::tags::translate_raw_tags;
use crate::wikitext::{Node, NodeKind, WikiNode};

const CELL_KINDS: [NodeKind; 2] = [NodeKind::TableHeaderCell, NodeKind::TableCell];

/// Header cell of a span-aware table and the rows and columns it covers.
#[derive(Debug, Clone)]
struct TableHeader {
    text: String,
    col_index: usize,
    colspan: usize,
    row_index: usize,
    rowspan: usize,
}

impl TableHeader {
    fn covers_row(&self, row: usize) -> bool {
        self.row_index <= row && row < self.row_index + self.rowspan
    }

    fn covers_col(&self, col: usize) -> bool {
        self.col_index <= col && col < self.col_index + self.colspan
    }
}

/// Forms section content: form templates and bare tables.
pub fn extract_inflections(ctx: &mut Context<'_>, entry: &mut WordEntry, nodes: &[Node]) {
    for node in nodes.iter().filter_map(Node::as_element) {
        match node.kind {
            NodeKind::Template => {
                extract_inflection_template(ctx, entry, node);
            }
            NodeKind::Table => extract_span_grid(ctx, entry, node, ""),
            _ => {}
        }
    }
}

/// Dispatches a template by its inflection role. Returns false for
/// templates that have none.
pub fn extract_inflection_template(ctx: &mut Context<'_>, entry: &mut WordEntry, node: &WikiNode) -> bool {
    match ctx.profile().template_role(&node.template_name()) {
        Some(TemplateRole::FormGrid) => extract_form_grid(ctx, entry, node),
        Some(TemplateRole::PrincipalParts) => extract_principal_parts(ctx, entry, node),
        Some(TemplateRole::ConjugationGrid) => {
            if let Some(expanded) = ctx.expand_template(node) {
                for table in expanded.find_child_recursively(NodeKind::Table) {
                    extract_span_grid(ctx, entry, table, "");
                }
            }
        }
        _ => return false,
    }
    true
}

fn is_skipped_cell(text: &str, title: &str) -> bool {
    text.is_empty() || text == "-" || text == title
}

// ─────────────────────────────────────────────────────────────────────────────
// Simple grid
// ─────────────────────────────────────────────────────────────────────────────

pub fn extract_form_grid(ctx: &Context<'_>, entry: &mut WordEntry, node: &WikiNode) {
    let Some(expanded) = ctx.expand_template(node) else {
        ctx.warn("inflection/form_grid", format!("missing template {}", node.template_name()));
        return;
    };
    let rules = &ctx.profile().inflection;
    let start = entry.forms.len();

    for table in expanded.find_child_recursively(NodeKind::Table) {
        let mut column_headers: Vec<String> = Vec::new();
        for row in table.find_child(NodeKind::TableRow) {
            let cells: Vec<&WikiNode> = row.find_child_any(&CELL_KINDS).collect();
            if cells.iter().skip(1).any(|cell| cell.kind == NodeKind::TableHeaderCell) {
                column_headers = cells
                    .iter()
                    .skip(1)
                    .map(|cell| ctx.clean_element(cell).trim().to_string())
                    .collect();
                continue;
            }
            let Some((first, values)) = cells.split_first() else {
                continue;
            };
            let row_header = ctx.clean_element(first).trim().to_string();
            for (offset, cell) in values.iter().enumerate() {
                let text = ctx.clean_element(cell);
                for line in text.lines().map(str::trim) {
                    if is_skipped_cell(line, ctx.title()) {
                        continue;
                    }
                    let mut form = Form {
                        form: line.to_string(),
                        ..Default::default()
                    };
                    if !rules.ignored_row_headers.contains(&row_header) {
                        push_unique(&mut form.raw_tags, row_header.as_str());
                    }
                    if let Some(header) = column_headers.get(offset) {
                        push_unique(&mut form.raw_tags, header.as_str());
                    }
                    entry.forms.push(form);
                }
            }
        }
    }

    let links: Vec<Node> = expanded
        .children
        .iter()
        .filter(|child| child.is_kind(NodeKind::Link))
        .cloned()
        .collect();
    ctx.clean_into(&mut *entry, &links);

    let profile = ctx.profile();
    for form in &mut entry.forms[start..] {
        translate_raw_tags(profile, &mut form.tags, &mut form.raw_tags);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Principal parts and the conjugation subpage
// ─────────────────────────────────────────────────────────────────────────────

/// Reads the principal parts straight from the template arguments, then
/// walks the conjugation tables of the `<title><suffix>` subpage.
pub fn extract_principal_parts(ctx: &mut Context<'_>, entry: &mut WordEntry, node: &WikiNode) {
    let profile = ctx.profile();
    let Some(parts) = &profile.inflection.principal_parts else {
        return;
    };
    for part in &parts.forms {
        let form = node
            .template_arg(part.arg)
            .map(|arg| ctx.clean_into(&mut *entry, &arg).trim().to_string())
            .unwrap_or_default();
        if is_skipped_cell(&form, ctx.title()) {
            continue;
        }
        let ipa = part
            .ipa_arg
            .and_then(|index| node.template_arg(index))
            .map(|arg| ctx.clean(&arg).trim().to_string())
            .unwrap_or_default();
        entry.forms.push(Form {
            form,
            tags: part.tags.clone(),
            ipa,
            ..Default::default()
        });
    }

    let subpage = format!("{}{}", ctx.title(), parts.subpage_suffix);
    if !ctx.enter_subpage(&subpage) {
        return;
    }
    let Some(page) = ctx.get_page(&subpage) else {
        return;
    };
    let root = ctx.parse(&page.body);
    for template in root.find_child(NodeKind::Template) {
        if profile.template_role(&template.template_name()) != Some(TemplateRole::ConjugationGrid) {
            continue;
        }
        if let Some(expanded) = ctx.expand_template(template) {
            for table in expanded.find_child_recursively(NodeKind::Table) {
                extract_span_grid(ctx, entry, table, &subpage);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Span-aware grid
// ─────────────────────────────────────────────────────────────────────────────

fn span_attr(cell: &WikiNode, name: &str) -> usize {
    cell.attr(name).trim().parse::<usize>().ok().filter(|span| *span > 0).unwrap_or(1)
}

/// Moves `col` past cells claimed by row headers of earlier rows.
/// Moves `col` past cells of earlier rows whose rowspan reaches `row_index`.
fn skip_claimed(claimed: &[TableHeader], row_index: usize, mut col: usize) -> usize {
    while let Some(header) = claimed
        .iter()
        .find(|header| header.row_index < row_index && header.covers_row(row_index) && header.covers_col(col))
    {
        col = header.col_index + header.colspan;
    }
    col
}

pub fn extract_span_grid(ctx: &Context<'_>, entry: &mut WordEntry, table: &WikiNode, source: &str) {
    let profile = ctx.profile();
    let rules = &profile.inflection;
    let is_header = |cell: &WikiNode| {
        cell.kind == NodeKind::TableHeaderCell
            || (!rules.header_class.is_empty()
                && cell.attr("class").split_whitespace().any(|class| class == rules.header_class))
    };

    let start = entry.forms.len();
    let mut shared_tags: Vec<String> = Vec::new();
    let mut shared_raw_tags: Vec<String> = Vec::new();
    let mut col_headers: Vec<TableHeader> = Vec::new();
    let mut row_headers: Vec<TableHeader> = Vec::new();
    let mut claimed: Vec<TableHeader> = Vec::new();
    let mut after_data_row = false;

    for (row_index, row) in table.find_child(NodeKind::TableRow).enumerate() {
        let cells: Vec<&WikiNode> = row.find_child_any(&CELL_KINDS).collect();
        if cells.is_empty() {
            continue;
        }
        let all_header = cells.iter().all(|cell| is_header(*cell));
        if all_header && after_data_row {
            shared_tags.clear();
            shared_raw_tags.clear();
            col_headers.clear();
            row_headers.clear();
        }
        after_data_row = !all_header;

        let mut col = 0;
        for cell in &cells {
            col = skip_claimed(&claimed, row_index, col);
            let colspan = span_attr(cell, "colspan");
            let rowspan = span_attr(cell, "rowspan");
            let cleaned = ctx.clean_element(cell);
            let text = cleaned.trim_matches(|c: char| c == '|' || c.is_whitespace());
            if rowspan > 1 {
                claimed.push(TableHeader {
                    text: text.to_string(),
                    col_index: col,
                    colspan,
                    row_index,
                    rowspan,
                });
            }
            if is_skipped_cell(text, ctx.title()) {
                col += colspan;
                continue;
            }

            if is_header(*cell) {
                if let Some(prefix) = rules.header_prefixes.iter().find(|prefix| text.starts_with(&prefix.prefix)) {
                    for tag in &prefix.tags {
                        push_unique(&mut shared_tags, tag.clone());
                    }
                } else if all_header && col == 0 {
                    push_unique(&mut shared_raw_tags, text);
                } else if all_header {
                    col_headers.push(TableHeader {
                        text: text.to_string(),
                        col_index: col,
                        colspan,
                        row_index,
                        rowspan,
                    });
                } else {
                    let text = text.split(['(', '（']).next().unwrap_or(text).trim();
                    row_headers.push(TableHeader {
                        text: text.to_string(),
                        col_index: col,
                        colspan,
                        row_index,
                        rowspan,
                    });
                }
                col += colspan;
                continue;
            }

            let mut raw_tags = shared_raw_tags.clone();
            for header in row_headers.iter().filter(|header| header.covers_row(row_index)) {
                push_unique(&mut raw_tags, header.text.as_str());
            }
            for header in col_headers.iter().filter(|header| header.covers_col(col)) {
                push_unique(&mut raw_tags, header.text.as_str());
            }
            for line in text.lines().map(str::trim) {
                if is_skipped_cell(line, ctx.title()) {
                    continue;
                }
                entry.forms.push(Form {
                    form: line.to_string(),
                    tags: shared_tags.clone(),
                    raw_tags: raw_tags.clone(),
                    source: source.to_string(),
                    ..Default::default()
                });
            }
            col += colspan;
        }
    }

    for form in &mut entry.forms[start..] {
        translate_raw_tags(profile, &mut form.tags, &mut form.raw_tags);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests for inflection tables
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_profile, ExtractorConfig};
    use crate::store::PageStore;
    use serde_json::json;

    const CONJUGATION: &str = "{| class=\"wikitable\"
! vervoeging !! colspan=\"2\" | enkelvoud
|-
! rowspan=\"2\" | tegenwoordig
| loop || loopt
|-
| lopen || -
|-
! lijdende vorm !! meervoud
|-
! verleden (ovt)
| werden gelopen
|}";

    fn extract(store: &PageStore, title: &str, text: &str) -> WordEntry {
        let config = ExtractorConfig::for_edition("nl");
        let mut ctx = Context::new(store, builtin_profile("nl").unwrap(), &config);
        ctx.start_page(title);
        let root = ctx.parse(text);
        let mut entry = WordEntry::new(title, "Nederlands", "nl");
        extract_inflections(&mut ctx, &mut entry, &root.children);
        entry
    }

    // ─────────────────────────────────────────────────────────────
    // Span-aware grid
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn spans_and_regions() {
        let store = PageStore::new();
        let entry = extract(&store, "lopen", CONJUGATION);
        assert_eq!(
            serde_json::to_value(&entry.forms).unwrap(),
            json!([
                {"form": "loop", "tags": ["conjugation", "present", "singular"]},
                {"form": "loopt", "tags": ["conjugation", "present", "singular"]},
                {"form": "werden gelopen", "tags": ["passive", "past", "plural"]}
            ])
        );
    }

    #[test]
    fn row_spanning_column_headers_claim_their_cells() {
        let store = PageStore::new();
        let text = "{|
! rowspan=\"2\" | vervoeging !! colspan=\"2\" | enkelvoud !! rowspan=\"2\" | meervoud
|-
! ik !! jij
|-
! tegenwoordig
| loop || loopt || lopen
|}";
        let entry = extract(&store, "lopen2", text);
        assert_eq!(
            serde_json::to_value(&entry.forms).unwrap(),
            json!([
                {"form": "loop", "tags": ["conjugation", "present", "singular", "first-person"]},
                {"form": "loopt", "tags": ["conjugation", "present", "singular", "second-person"]},
                {"form": "lopen", "tags": ["conjugation", "present", "plural"]}
            ])
        );
    }

    #[test]
    fn header_class_marks_data_cells_as_headers() {
        let store = PageStore::new();
        let text = "{|\n| class=\"infoboxrijhoofding\" | onvoltooid || class=\"infoboxrijhoofding\" | ik\n|-\n| class=\"infoboxrijhoofding\" | tegenwoordig\n| loop\n|}";
        let entry = extract(&store, "lopen", text);
        assert_eq!(
            serde_json::to_value(&entry.forms).unwrap(),
            json!([{"form": "loop", "tags": ["imperfect", "present", "first-person", "singular"]}])
        );
    }

    #[test]
    fn malformed_spans_default_to_one() {
        let store = PageStore::new();
        let text = "{|\n! x !! colspan=\"twee\" | enkelvoud !! meervoud\n|-\n! tegenwoordig\n| loop || lopen || -\n|}";
        let entry = extract(&store, "lopen2", text);
        assert_eq!(
            serde_json::to_value(&entry.forms).unwrap(),
            json!([
                {"form": "loop", "tags": ["present", "singular"], "raw_tags": ["x"]},
                {"form": "lopen", "tags": ["present", "plural"], "raw_tags": ["x"]}
            ])
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Simple grid
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn noun_grid_with_category() {
        let mut store = PageStore::new();
        store.add_page(
            "Sjabloon:-nlnoun-",
            "{| class=\"infobox\"\n!\n! enkelvoud\n! meervoud\n|-\n| naamwoord\n| {{{1}}}\n| {{{2}}}\n|-\n| verkleinwoord\n| {{{3}}}\n| {{{4}}}\n|}\n[[Categorie:Zelfstandig naamwoord in het Nederlands]]",
        );
        let entry = extract(&store, "huis", "{{-nlnoun-|huis|huizen|huisje|huisjes}}");
        assert_eq!(
            serde_json::to_value(&entry.forms).unwrap(),
            json!([
                {"form": "huizen", "tags": ["plural"]},
                {"form": "huisje", "tags": ["diminutive", "singular"]},
                {"form": "huisjes", "tags": ["diminutive", "plural"]}
            ])
        );
        assert_eq!(entry.categories, vec!["Zelfstandig naamwoord in het Nederlands"]);
    }

    // ─────────────────────────────────────────────────────────────
    // Principal parts
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn principal_parts_then_subpage() {
        let mut store = PageStore::new();
        store.add_page("Sjabloon:-nlverb-", CONJUGATION);
        store.add_page("lopen/vervoeging", "{{-nlverb-}}");
        let entry = extract(&store, "lopen", "{{-nlstam-|lopen|liep|gelopen|ˈlopə(n)|lip|ɣəˈlopə(n)}}");
        assert_eq!(
            serde_json::to_value(&entry.forms).unwrap(),
            json!([
                {"form": "liep", "tags": ["past"], "ipa": "lip"},
                {"form": "gelopen", "tags": ["past", "participle"], "ipa": "ɣəˈlopə(n)"},
                {"form": "loop", "tags": ["conjugation", "present", "singular"], "source": "lopen/vervoeging"},
                {"form": "loopt", "tags": ["conjugation", "present", "singular"], "source": "lopen/vervoeging"},
                {"form": "werden gelopen", "tags": ["passive", "past", "plural"], "source": "lopen/vervoeging"}
            ])
        );
    }

    #[test]
    fn missing_conjugation_subpage_is_silent() {
        let store = PageStore::new();
        let entry = extract(&store, "lopen", "{{-nlstam-|lopen|liep|gelopen}}");
        assert_eq!(entry.forms.len(), 2);
    }
}
