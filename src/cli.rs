//! CLI: formats | generate | hash | check
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;

use crate::codec::{self, Codec};
use crate::config::{CheckConfig, DEFAULT_GENERATOR_SEED};
use crate::fold::{FoldOptions, KeyOrder};
use crate::harness::{self, Report};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// verify that independent codecs agree on document content by comparing
/// canonical structural digests instead of bytes
#[derive(Parser, Debug)]
#[command(name = "serial-parity", version)]
pub struct CommandLineInterface {
    /// more log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// list registered codecs and their formats
    Formats,
    /// encode a generated tree and write the bytes
    Generate(GenerateCmd),
    /// decode files and print their digests
    Hash(HashCmd),
    /// run the (codec, size) equivalence matrix
    Check(CheckCmd),
}

#[derive(Args, Debug, Clone)]
struct FoldSettings {
    /// accumulator seed, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_u32)]
    fold_seed: Option<u32>,

    /// whether map pair order is part of the content
    #[arg(long, value_enum)]
    key_order: Option<KeyOrder>,

    /// maximum container nesting accepted while folding
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(clap::Parser, Debug)]
struct GenerateCmd {
    /// size budget (node count) of the generated tree
    #[arg(long, default_value_t = 1000)]
    size: usize,

    /// generator seed
    #[arg(long, default_value_t = DEFAULT_GENERATOR_SEED)]
    seed: u64,

    /// codec to encode with (see `formats`)
    #[arg(long)]
    codec: String,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    fold: FoldSettings,
}

#[derive(clap::Parser, Debug)]
struct HashCmd {
    /// codec to decode with (see `formats`)
    #[arg(long)]
    codec: String,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    #[command(flatten)]
    fold: FoldSettings,
}

#[derive(clap::Parser, Debug)]
struct CheckCmd {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// size budgets, comma separated
    #[arg(long, value_delimiter = ',')]
    sizes: Option<Vec<usize>>,

    /// generator seed
    #[arg(long)]
    seed: Option<u64>,

    /// restrict to these codecs (repeatable)
    #[arg(long)]
    codec: Vec<String>,

    #[command(flatten)]
    fold: FoldSettings,

    /// write the JSON report here
    #[arg(long)]
    report: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl FoldSettings {
    fn apply(&self, mut options: FoldOptions) -> anyhow::Result<FoldOptions> {
        if let Some(seed) = self.fold_seed {
            options = options.with_seed(seed);
        }
        if let Some(key_order) = self.key_order {
            options = options.with_key_order(key_order);
        }
        if let Some(max_depth) = self.max_depth {
            options = options.with_max_depth(max_depth);
        }
        options.validate()?;
        Ok(options)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> u8 {
        self.verbose
    }

    pub fn run(&self) -> anyhow::Result<ExitCode> {
        match &self.cmd {
            Command::Formats => {
                for codec in codec::all() {
                    let format = codec.format();
                    println!("{:<14} {:<12} .{}", codec.name(), format, format.file_extension());
                }
                Ok(ExitCode::SUCCESS)
            }
            Command::Generate(target) => target.run(),
            Command::Hash(target) => target.run(),
            Command::Check(target) => target.run(),
        }
    }
}

impl GenerateCmd {
    fn run(&self) -> anyhow::Result<ExitCode> {
        let codec = lookup(&self.codec)?;
        let options = self.fold.apply(FoldOptions::default())?;
        let tree = crate::generate::generate(self.size, self.seed);
        let encoded = codec
            .encode(&tree, &options)
            .with_context(|| format!("{} failed to encode a tree of size {}", codec.name(), self.size))?;
        match self.out.as_ref() {
            Some(out) => write_file(out, &encoded.bytes)?,
            None => std::io::stdout()
                .lock()
                .write_all(&encoded.bytes)
                .context("failed to write to stdout")?,
        }
        tracing::info!(codec = codec.name(), size = self.size, bytes = encoded.bytes.len(), "encoded");
        eprintln!("{}", encoded.digest);
        Ok(ExitCode::SUCCESS)
    }
}

impl HashCmd {
    fn run(&self) -> anyhow::Result<ExitCode> {
        let codec = lookup(&self.codec)?;
        let options = self.fold.apply(FoldOptions::default())?;
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        let mut failed = 0usize;
        for source_path in &source_paths {
            match hash_file(codec, source_path, &options) {
                Ok(digest) => println!("{digest}  {}", source_path.display()),
                Err(error) => {
                    failed += 1;
                    eprintln!("{} {}: {error:#}", "FAIL".red().bold(), source_path.display());
                }
            }
        }
        if failed > 0 {
            eprintln!("{failed} of {} file(s) failed", source_paths.len());
            return Ok(ExitCode::FAILURE);
        }
        Ok(ExitCode::SUCCESS)
    }
}

impl CheckCmd {
    fn config(&self) -> anyhow::Result<CheckConfig> {
        let mut config = match self.config.as_ref() {
            Some(path) => CheckConfig::load(path)?,
            None => CheckConfig::default(),
        };
        if let Some(sizes) = self.sizes.as_ref() {
            config.sizes = sizes.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if !self.codec.is_empty() {
            config.codecs = self.codec.clone();
        }
        config.fold = self.fold.apply(config.fold)?;
        config.validate()?;
        Ok(config)
    }

    fn run(&self) -> anyhow::Result<ExitCode> {
        let config = self.config()?;
        let report = harness::run(&config);
        print_report(&report);
        if let Some(out) = self.report.as_ref() {
            let src = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
            write_file(out, src.as_bytes())?;
        }
        if report.passed() {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::FAILURE)
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn lookup(name: &str) -> anyhow::Result<&'static dyn Codec> {
    match codec::by_name(name) {
        Some(codec) => Ok(codec),
        None => bail!("unknown codec {name:?}; expected one of: {}", codec::names().join(", ")),
    }
}

fn hash_file(codec: &dyn Codec, path: &Path, options: &FoldOptions) -> anyhow::Result<crate::hash::Digest> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(codec.decode(&bytes, options)?)
}

fn write_file(out: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, bytes).with_context(|| format!("failed to write {}", out.display()))
}

fn print_report(report: &Report) {
    for pair in report.pairs() {
        let digest = pair.reference.map(|d| d.to_string()).unwrap_or_else(|| "--------".into());
        let bytes = pair.encoded_len.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
        let status = if pair.passed() { "PASS".green().bold() } else { "FAIL".red().bold() };
        println!(
            "{status} {:<14} size={:<6} nodes={:<6} digest={digest} bytes={bytes}",
            pair.codec, pair.size, pair.nodes
        );
        for failure in &pair.failures {
            println!("     {}", failure.to_string().red());
        }
    }
    let total = report.pairs().count();
    let failed = report.failed_pairs();
    let summary = format!("{} of {total} pair(s) passed", total - failed);
    if failed == 0 {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }
}

fn parse_u32(src: &str) -> Result<u32, String> {
    let parsed = match src.strip_prefix("0x").or_else(|| src.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => src.parse(),
    };
    parsed.map_err(|e| format!("{src:?} is not a 32-bit seed: {e}"))
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let before = out.len();
            for entry in glob::glob(pattern)? {
                out.push(entry?);
            }
            if out.len() == before {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
