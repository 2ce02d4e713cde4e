use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use wiktionary_extractor::config::builtin_editions;
use wiktionary_extractor::parallel::{run, RunOptions, Stats, Strategy};
use wiktionary_extractor::{builtin_profile, EditionProfile, Error, ExtractorConfig, Result};

#[derive(Parser, Debug)]
#[command(name = "wiktionary-extractor")]
#[command(about = "Extract structured entries from a Wiktionary XML dump")]
struct Args {
    /// Input XML file (.xml or .xml.bz2)
    input: PathBuf,

    /// Output JSONL file
    output: PathBuf,

    /// Dictionary edition of the dump (de, es, nl, pl, zh)
    #[arg(short, long)]
    edition: String,

    /// Edition profile YAML replacing the built-in one
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Run configuration YAML (capture switches, language allow-list)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only extract these language codes (repeatable)
    #[arg(short, long = "language-code")]
    language_codes: Vec<String>,

    /// Processing strategy
    #[arg(short, long, value_enum, default_value_t = Strategy::Parallel)]
    strategy: Strategy,

    /// Number of threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,

    /// Limit number of main-namespace pages to extract (for testing)
    #[arg(long)]
    page_limit: Option<usize>,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();
}

fn print_stats(stats: &Stats, edition: &str, strategy: Strategy) {
    println!();
    println!("============================================================");
    println!("Edition: {}", edition);
    println!("Strategy: {:?}", strategy);
    println!("Pages loaded: {}", stats.pages_loaded);
    println!("Redirects: {}", stats.redirects);
    println!("------------------------------------------------------------");
    println!("Pages processed: {}", stats.pages_processed);
    println!("Pages with entries: {}", stats.pages_with_entries);
    println!("Entries written: {}", stats.entries_written);
    println!(
        "Avg entries/page: {:.2}",
        stats.entries_written as f64 / stats.pages_with_entries.max(1) as f64
    );
    println!("Time: {}m {}s", stats.elapsed.as_secs() / 60, stats.elapsed.as_secs() % 60);
    println!(
        "Rate: {:.0} pages/sec",
        stats.pages_processed as f64 / stats.elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!("============================================================");
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|source| Error::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let reader: Box<dyn BufRead> = if path.to_string_lossy().ends_with(".bz2") {
        Box::new(BufReader::with_capacity(256 * 1024, BzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(256 * 1024, file))
    };
    Ok(reader)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let custom_profile;
    let profile: &EditionProfile = match &args.schema {
        Some(path) => {
            custom_profile = EditionProfile::from_path(path)?;
            &custom_profile
        }
        None => builtin_profile(&args.edition).map_err(|err| {
            let known: Vec<&str> = builtin_editions().collect();
            tracing::error!("built-in editions: {}", known.join(", "));
            err
        })?,
    };

    let mut config = match &args.config {
        Some(path) => ExtractorConfig::from_path(path)?,
        None => ExtractorConfig::default(),
    };
    config.edition = args.edition.clone();
    if !args.language_codes.is_empty() {
        config.capture_language_codes = Some(args.language_codes.clone());
    }

    let mut options = RunOptions {
        strategy: args.strategy,
        page_limit: args.page_limit,
        ..RunOptions::default()
    };
    if args.threads > 0 {
        options.num_threads = args.threads;
    }

    if !args.quiet {
        println!("Wiktionary extractor");
        println!("Input: {}", args.input.display());
        println!("Output: {}", args.output.display());
        println!("Edition: {}", args.edition);
        if let Some(limit) = args.page_limit {
            println!("Page limit: {}", limit);
        }
        println!();
    }

    let reader = open_input(&args.input)?;
    let output = File::create(&args.output)?;
    let mut writer = BufWriter::with_capacity(256 * 1024, output);

    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
            pb.set_style(style);
        }
        pb
    };

    let stats = run(reader, &mut writer, profile, &config, &options, &progress)?;
    progress.finish_and_clear();
    info!(entries = stats.entries_written, "done");

    if !args.quiet {
        print_stats(&stats, &args.edition, args.strategy);
    }
    Ok(())
}
