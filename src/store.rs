use std::collections::{HashMap, HashSet};

/// One page of the dump: main-namespace entries, template pages and
/// subpages alike.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub title: String,
    pub body: String,
    pub redirect_to: Option<String>,
}

/// In-memory page-content store filled once before extraction starts and
/// read-only afterwards, so it can be shared by all worker threads.
#[derive(Debug, Default)]
pub struct PageStore {
    pages: HashMap<String, Page>,
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&mut self, title: &str, body: &str) {
        self.pages.insert(
            title.to_string(),
            Page {
                title: title.to_string(),
                body: body.to_string(),
                redirect_to: None,
            },
        );
    }

    pub fn add_redirect(&mut self, title: &str, target: &str) {
        self.pages.insert(
            title.to_string(),
            Page {
                title: title.to_string(),
                body: String::new(),
                redirect_to: Some(target.to_string()),
            },
        );
    }

    /// Looks a page up by exact title, following redirects. A redirect chain
    /// that loops back on itself yields `None`.
    pub fn get_page(&self, title: &str) -> Option<&Page> {
        let mut seen = HashSet::new();
        let mut current = title;
        loop {
            if !seen.insert(current) {
                return None;
            }
            let page = self.pages.get(current)?;
            match &page.redirect_to {
                Some(target) => current = target.as_str(),
                None => return Some(page),
            }
        }
    }

    pub fn contains(&self, title: &str) -> bool {
        self.get_page(title).is_some()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirects_are_followed() {
        let mut store = PageStore::new();
        store.add_page("Vorlage:K", "tag");
        store.add_redirect("Vorlage:Kontext", "Vorlage:K");
        assert_eq!(store.get_page("Vorlage:Kontext").unwrap().body, "tag");
    }

    #[test]
    fn redirect_cycle_yields_none() {
        let mut store = PageStore::new();
        store.add_redirect("a/vervoeging", "a");
        store.add_redirect("a", "a/vervoeging");
        assert!(store.get_page("a").is_none());
    }

    #[test]
    fn missing_page() {
        let store = PageStore::new();
        assert!(store.get_page("nothing").is_none());
        assert!(store.is_empty());
    }
}
