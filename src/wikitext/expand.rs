//! Template expansion against the page store.
//!
//! Only plain transclusion is supported: `{{{param|default}}}` substitution,
//! `noinclude`/`includeonly`/`onlyinclude`, and a few magic words. Parser
//! functions and templates missing from the store are left in the output as
//! literal calls (with their arguments expanded).

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use super::parser::{brace_span, split_top_level};
use crate::store::{Page, PageStore};

const MAX_DEPTH: usize = 24;

lazy_static! {
    static ref NOINCLUDE: Regex = Regex::new(r"(?is)<noinclude\s*>.*?(?:</noinclude\s*>|$)").unwrap();
    static ref INCLUDEONLY_TAG: Regex = Regex::new(r"(?i)</?includeonly\s*>").unwrap();
    static ref ONLYINCLUDE: Regex = Regex::new(r"(?is)<onlyinclude\s*>(.*?)</onlyinclude\s*>").unwrap();
}

type Args = BTreeMap<String, String>;

pub struct Expander<'a> {
    store: &'a PageStore,
    namespace: &'a str,
    title: &'a str,
}

impl<'a> Expander<'a> {
    pub fn new(store: &'a PageStore, namespace: &'a str, title: &'a str) -> Self {
        Self {
            store,
            namespace,
            title,
        }
    }

    /// Expands every known template in `text`.
    pub fn expand_all(&self, text: &str) -> String {
        self.expand(text, None, 0)
    }

    /// Whether a call to `name` would expand to something.
    pub fn template_exists(&self, name: &str) -> bool {
        self.magic_word(name).is_some() || self.lookup(name).is_some()
    }

    fn magic_word(&self, name: &str) -> Option<String> {
        match name {
            "PAGENAME" | "FULLPAGENAME" | "BASEPAGENAME" => Some(self.title.to_string()),
            "!" => Some("|".to_string()),
            _ => None,
        }
    }

    fn lookup(&self, name: &str) -> Option<&'a Page> {
        let name = name.trim();
        if name.is_empty() || name.starts_with('#') {
            return None;
        }
        if let Some(main) = name.strip_prefix(':') {
            return self.store.get_page(main);
        }
        if let Some((prefix, _)) = name.split_once(':') {
            if prefix == self.namespace || prefix == "Template" {
                return self.store.get_page(name);
            }
        }
        let mut chars = name.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        [
            format!("{}:{}", self.namespace, name),
            format!("{}:{}", self.namespace, capitalized),
            format!("Template:{name}"),
        ]
        .iter()
        .find_map(|title| self.store.get_page(title))
    }

    fn expand(&self, text: &str, args: Option<&Args>, depth: usize) -> String {
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;
        while pos < text.len() {
            let rest = &text[pos..];
            if rest.starts_with("{{") {
                if let Some(len) = brace_span(rest, '{', '}') {
                    let call = &rest[..len];
                    out.push_str(&self.expand_call(call, args, depth));
                    pos += len;
                    continue;
                }
            }
            let c_len = rest.chars().next().map_or(1, char::len_utf8);
            out.push_str(&rest[..c_len]);
            pos += c_len;
        }
        out
    }

    fn expand_call(&self, call: &str, args: Option<&Args>, depth: usize) -> String {
        if depth >= MAX_DEPTH {
            return call.to_string();
        }
        if call.starts_with("{{{") && call.ends_with("}}}") && call.len() >= 6 {
            let inner = &call[3..call.len() - 3];
            return match args {
                Some(args) => self.expand_param(inner, args, depth),
                None => call.to_string(),
            };
        }
        let inner = &call[2..call.len() - 2];
        match self.expand_template(inner, args, depth) {
            Some(expanded) => expanded,
            None => format!("{{{{{}}}}}", self.expand(inner, args, depth + 1)),
        }
    }

    fn expand_param(&self, inner: &str, args: &Args, depth: usize) -> String {
        let parts = split_top_level(inner, "|");
        let name = self.expand(parts[0], Some(args), depth + 1);
        let name = name.trim();
        if let Some(value) = args.get(name) {
            return value.clone();
        }
        if parts.len() > 1 {
            let default = parts[1..].join("|");
            return self.expand(&default, Some(args), depth + 1);
        }
        format!("{{{{{{{name}}}}}}}")
    }

    fn expand_template(&self, inner: &str, args: Option<&Args>, depth: usize) -> Option<String> {
        let parts = split_top_level(inner, "|");
        let name = self.expand(parts[0], args, depth + 1);
        let name = name.trim();
        if let Some(value) = self.magic_word(name) {
            return Some(value);
        }
        let page = self.lookup(name)?;

        let mut call_args = Args::new();
        let mut position = 0;
        for part in &parts[1..] {
            match named_arg(part) {
                Some((key, value)) => {
                    let key = self.expand(key, args, depth + 1).trim().to_string();
                    let value = self.expand(value, args, depth + 1).trim().to_string();
                    call_args.insert(key, value);
                }
                None => {
                    position += 1;
                    let value = self.expand(part, args, depth + 1);
                    call_args.insert(position.to_string(), value);
                }
            }
        }
        let body = transcluded_body(&page.body);
        Some(self.expand(&body, Some(&call_args), depth + 1))
    }
}

/// Splits `name=value` when the `=` comes before any nested markup.
fn named_arg(part: &str) -> Option<(&str, &str)> {
    let eq = part.find('=')?;
    let head = &part[..eq];
    if head.contains("{{") || head.contains("[[") {
        return None;
    }
    Some((head, &part[eq + 1..]))
}

fn transcluded_body(body: &str) -> String {
    if ONLYINCLUDE.is_match(body) {
        return ONLYINCLUDE
            .captures_iter(body)
            .map(|caps| caps[1].to_string())
            .collect();
    }
    let body = NOINCLUDE.replace_all(body, "");
    INCLUDEONLY_TAG.replace_all(&body, "").into_owned()
}
