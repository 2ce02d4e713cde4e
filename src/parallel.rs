//! Dump loading and page-level parallelism.
//!
//! Extraction runs in three phases:
//! - Phase 1 reads every `<page>` of the dump into a `PageStore` (templates
//!   and subpages are needed while extracting main-namespace pages)
//! - Phase 2 runs `parse_page` over the main-namespace pages, sequentially or
//!   on scoped threads that each own a `Context`
//! - Phase 3 writes one JSON object per entry, in page order

use std::io::{BufRead, Write};
use std::thread;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::config::{EditionProfile, ExtractorConfig};
use crate::context::Context;
use crate::error::Result;
use crate::extractor::parse_page;
use crate::model::WordEntry;
use crate::store::PageStore;

lazy_static! {
    static ref TITLE_PATTERN: Regex = Regex::new(r"<title>([^<]+)</title>").unwrap();
    static ref NS_PATTERN: Regex = Regex::new(r"<ns>(\d+)</ns>").unwrap();
    static ref TEXT_PATTERN: Regex = Regex::new(r"(?s)<text[^>]*>(.*?)</text>").unwrap();
    static ref REDIRECT_PATTERN: Regex = Regex::new(r#"<redirect\s+title="([^"]+)""#).unwrap();
}

const PAGE_START: &[u8] = b"<page>";
const PAGE_END: &[u8] = b"</page>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    Sequential,
    Parallel,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub strategy: Strategy,
    pub num_threads: usize,
    /// Stop after this many main-namespace pages.
    pub page_limit: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        let cpus = thread::available_parallelism().map(|p| p.get()).unwrap_or(4);
        Self {
            strategy: Strategy::Parallel,
            num_threads: cpus,
            page_limit: None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub pages_loaded: usize,
    pub redirects: usize,
    pub pages_processed: usize,
    pub pages_with_entries: usize,
    pub entries_written: usize,
    pub elapsed: Duration,
}

/// Pages of a dump: the store plus the main-namespace titles to extract.
#[derive(Debug, Default)]
pub struct LoadedDump {
    pub store: PageStore,
    pub titles: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase 1: loading
// ─────────────────────────────────────────────────────────────────────────────

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Calls `callback` with each complete `<page>...</page>` element. Pages are
/// cut from the byte stream before decoding so that a read boundary never
/// splits a multi-byte character.
pub fn scan_pages(mut reader: impl BufRead, mut callback: impl FnMut(&str) -> bool) -> std::io::Result<()> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; 1024 * 1024];

    loop {
        let bytes_read = reader.read(&mut chunk)?;
        if bytes_read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..bytes_read]);

        while let Some(start) = find_bytes(&buffer, PAGE_START) {
            let Some(end_offset) = find_bytes(&buffer[start..], PAGE_END) else {
                buffer.drain(..start);
                break;
            };
            let end = start + end_offset + PAGE_END.len();
            let page_xml = String::from_utf8_lossy(&buffer[start..end]).into_owned();
            buffer.drain(..end);
            if !callback(&page_xml) {
                return Ok(());
            }
        }

        if buffer.len() > PAGE_START.len() && find_bytes(&buffer, PAGE_START).is_none() {
            buffer.drain(..buffer.len() - PAGE_START.len());
        }
    }

    Ok(())
}

pub fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

pub fn load_dump(reader: impl BufRead, page_limit: Option<usize>, progress: &ProgressBar) -> Result<(LoadedDump, Stats)> {
    let mut dump = LoadedDump::default();
    let mut stats = Stats::default();

    scan_pages(reader, |page_xml| {
        let Some(title) = TITLE_PATTERN.captures(page_xml).map(|cap| unescape_xml(&cap[1])) else {
            return true;
        };
        stats.pages_loaded += 1;
        if stats.pages_loaded % 10_000 == 0 {
            progress.set_message(format!("Loaded {} pages", stats.pages_loaded));
        }

        if let Some(cap) = REDIRECT_PATTERN.captures(page_xml) {
            dump.store.add_redirect(&title, &unescape_xml(&cap[1]));
            stats.redirects += 1;
            return true;
        }
        let text = TEXT_PATTERN
            .captures(page_xml)
            .map(|cap| unescape_xml(&cap[1]))
            .unwrap_or_default();
        dump.store.add_page(&title, &text);

        let main_namespace = NS_PATTERN.captures(page_xml).map_or(true, |cap| &cap[1] == "0");
        if main_namespace && page_limit.map_or(true, |limit| dump.titles.len() < limit) {
            dump.titles.push(title);
        }
        true
    })?;

    Ok((dump, stats))
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase 2: extraction
// ─────────────────────────────────────────────────────────────────────────────

fn extract_chunk(
    store: &PageStore,
    profile: &EditionProfile,
    config: &ExtractorConfig,
    titles: &[String],
) -> Vec<Vec<WordEntry>> {
    let mut ctx = Context::new(store, profile, config);
    titles
        .iter()
        .map(|title| match store.get_page(title) {
            Some(page) => parse_page(&mut ctx, title, &page.body),
            None => Vec::new(),
        })
        .collect()
}

/// Entries of every page in `titles`, in title order.
pub fn extract_pages(
    dump: &LoadedDump,
    profile: &EditionProfile,
    config: &ExtractorConfig,
    options: &RunOptions,
) -> Vec<Vec<WordEntry>> {
    let titles = &dump.titles;
    if options.strategy == Strategy::Sequential || titles.len() < 2 {
        return extract_chunk(&dump.store, profile, config, titles);
    }

    let num_threads = options.num_threads.min(titles.len()).max(1);
    let chunk_size = (titles.len() + num_threads - 1) / num_threads;
    thread::scope(|scope| {
        let handles: Vec<_> = titles
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || extract_chunk(&dump.store, profile, config, chunk)))
            .collect();

        let mut all_results = Vec::with_capacity(titles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(results) => all_results.extend(results),
                Err(_) => {
                    warn!(chunk = index, "extraction thread panicked; its pages are skipped");
                    let skipped = chunk_size.min(titles.len() - all_results.len());
                    all_results.extend(std::iter::repeat_with(Vec::new).take(skipped));
                }
            }
        }
        all_results
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase 3: output
// ─────────────────────────────────────────────────────────────────────────────

pub fn write_entries<W: Write>(writer: &mut W, pages: Vec<Vec<WordEntry>>, stats: &mut Stats) -> Result<()> {
    for entries in pages {
        stats.pages_processed += 1;
        if !entries.is_empty() {
            stats.pages_with_entries += 1;
        }
        for entry in entries {
            let json = serde_json::to_string(&entry)?;
            writeln!(writer, "{json}")?;
            stats.entries_written += 1;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Loads a dump, extracts it and writes JSONL.
pub fn run<W: Write>(
    reader: impl BufRead,
    writer: &mut W,
    profile: &EditionProfile,
    config: &ExtractorConfig,
    options: &RunOptions,
    progress: &ProgressBar,
) -> Result<Stats> {
    let start_time = Instant::now();

    info!("Phase 1: loading pages");
    progress.set_message("Loading pages");
    let (dump, mut stats) = load_dump(reader, options.page_limit, progress)?;
    info!(
        pages = stats.pages_loaded,
        redirects = stats.redirects,
        to_extract = dump.titles.len(),
        "loaded in {:?}",
        start_time.elapsed()
    );

    info!(strategy = ?options.strategy, threads = options.num_threads, "Phase 2: extracting");
    progress.set_message(format!("Extracting {} pages", dump.titles.len()));
    let extract_start = Instant::now();
    let pages = extract_pages(&dump, profile, config, options);
    info!("extracted in {:?}", extract_start.elapsed());

    progress.set_message("Writing entries");
    write_entries(writer, pages, &mut stats)?;
    stats.elapsed = start_time.elapsed();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_profile;
    use std::fs::File;
    use std::io::{BufReader, Write as _};

    const DUMP: &str = r#"<mediawiki>
  <page>
    <title>Vorlage:en</title>
    <ns>10</ns>
    <revision><text xml:space="preserve">Englisch</text></revision>
  </page>
  <page>
    <title>Haus</title>
    <ns>0</ns>
    <revision><text xml:space="preserve">== Haus ({{Sprache|Deutsch}}) ==
=== {{Wortart|Substantiv|Deutsch}} ===
{{Bedeutungen}}
:[1] Gebäude &amp; Heim
==== {{Übersetzungen}} ====
{{Ü-Tabelle|Ü-Liste=
*{{en}}: [1] {{Ü|en|house}}
}}</text></revision>
  </page>
  <page>
    <title>Hause</title>
    <ns>0</ns>
    <redirect title="Haus" />
    <revision><text xml:space="preserve">#WEITERLEITUNG [[Haus]]</text></revision>
  </page>
  <page>
    <title>Baum</title>
    <ns>0</ns>
    <revision><text xml:space="preserve">== Baum ({{Sprache|Deutsch}}) ==
=== {{Wortart|Substantiv|Deutsch}} ===
{{Bedeutungen}}
:[1] Pflanze mit &lt;i&gt;Stamm&lt;/i&gt;</text></revision>
  </page>
</mediawiki>
"#;

    fn write_dump() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DUMP.as_bytes()).unwrap();
        file
    }

    fn run_with(strategy: Strategy, page_limit: Option<usize>) -> (String, Stats) {
        let file = write_dump();
        let reader = BufReader::new(File::open(file.path()).unwrap());
        let profile = builtin_profile("de").unwrap();
        let config = ExtractorConfig::for_edition("de");
        let options = RunOptions {
            strategy,
            num_threads: 2,
            page_limit,
        };
        let mut output = Vec::new();
        let stats = run(reader, &mut output, profile, &config, &options, &ProgressBar::hidden()).unwrap();
        (String::from_utf8(output).unwrap(), stats)
    }

    #[test]
    fn loads_templates_redirects_and_main_pages() {
        let file = write_dump();
        let reader = BufReader::new(File::open(file.path()).unwrap());
        let (dump, stats) = load_dump(reader, None, &ProgressBar::hidden()).unwrap();
        assert_eq!(stats.pages_loaded, 4);
        assert_eq!(stats.redirects, 1);
        assert_eq!(dump.titles, vec!["Haus", "Baum"]);
        assert_eq!(dump.store.get_page("Hause").unwrap().title, "Haus");
        assert_eq!(dump.store.get_page("Vorlage:en").unwrap().body, "Englisch");
    }

    #[test]
    fn sequential_output() {
        let (output, stats) = run_with(Strategy::Sequential, None);
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["word"], "Haus");
        assert_eq!(lines[0]["senses"][0]["glosses"][0], "Gebäude & Heim");
        assert_eq!(lines[0]["translations"][0]["word"], "house");
        assert_eq!(lines[1]["word"], "Baum");
        assert_eq!(lines[1]["senses"][0]["glosses"][0], "Pflanze mit Stamm");
        assert_eq!(stats.pages_processed, 2);
        assert_eq!(stats.entries_written, 2);
    }

    #[test]
    fn parallel_matches_sequential() {
        let (sequential, _) = run_with(Strategy::Sequential, None);
        let (parallel, _) = run_with(Strategy::Parallel, None);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn page_limit_counts_main_pages() {
        let (output, stats) = run_with(Strategy::Parallel, Some(1));
        assert_eq!(output.lines().count(), 1);
        assert_eq!(stats.pages_processed, 1);
    }

    #[test]
    fn pages_split_across_reads_keep_multibyte_text() {
        let dump = "<page><title>字典</title><ns>0</ns><text>漢字</text></page>";
        let reader = BufReader::with_capacity(3, dump.as_bytes());
        let mut pages = Vec::new();
        scan_pages(reader, |page| {
            pages.push(page.to_string());
            true
        })
        .unwrap();
        assert_eq!(pages, vec![dump.to_string()]);
    }

    #[test]
    fn xml_entities() {
        assert_eq!(unescape_xml("a &amp;lt; b &lt;br&gt; &quot;c&quot;"), "a &lt; b <br> \"c\"");
    }
}
