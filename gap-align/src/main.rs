use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;

use gap_align::batch;
use gap_align::config::{BandWidth, CompareOpt, EdgeMode, SearchMode};
use gap_align::io::{read_fasta_file, FastaRecord, ReportWriter};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(
    name = "gap-align",
    author,
    version,
    about = "Find and align overlaps between padded reads and contigs",
    arg_required_else_help = true
)]
struct Cli {
    /// 输出 debug 级别日志（RUST_LOG 优先）
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare sequences of <B> against sequences of <A> (A is indexed)
    Compare {
        a: PathBuf,
        b: PathBuf,
        /// Use every record of both files instead of only the first
        #[arg(long)]
        all: bool,
        #[command(flatten)]
        opts: CompareArgs,
    },
    /// All-pairs comparison within one FASTA file
    Pairs {
        set: PathBuf,
        #[command(flatten)]
        opts: CompareArgs,
    },
    /// Print the default configuration as TOML
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Sensitive,
    Block,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EdgeArg {
    /// 两侧前导 gap 免费，回溯取最优边
    Overlap,
    /// 前导 gap 计分，回溯必须到右下角
    Global,
    /// 只有 seq2 的左侧悬垂免费
    ZeroX,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// TOML configuration file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    #[arg(short = 'k', long = "word-length")]
    word_length: Option<usize>,
    #[arg(long = "min-match")]
    min_match: Option<usize>,
    /// Band width: number of diagonals, or a percentage such as "5%"; 0 disables banding
    #[arg(long, value_parser = parse_band)]
    band: Option<BandWidth>,
    #[arg(long = "gap-open")]
    gap_open: Option<i32>,
    #[arg(long = "gap-ext")]
    gap_extend: Option<i32>,
    #[arg(long = "max-mismatch")]
    max_mismatch: Option<f64>,
    #[arg(long, value_enum)]
    edge: Option<EdgeArg>,
    #[arg(long)]
    fast: bool,
    #[arg(long = "filter-words")]
    filter_words: Option<usize>,
    /// Do not try the reverse complement of the second sequence
    #[arg(long = "single-strand")]
    single_strand: bool,
    #[arg(short = 't', long = "threads")]
    threads: Option<usize>,
    /// Output path (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Print each alignment in blocks of this many columns
    #[arg(long = "show-alignment")]
    show_alignment: Option<usize>,
}

fn parse_band(s: &str) -> Result<BandWidth, String> {
    match s.strip_suffix('%') {
        Some(p) => p
            .trim()
            .parse::<f64>()
            .map(BandWidth::Percent)
            .map_err(|e| format!("bad band percentage '{}': {}", s, e)),
        None => s
            .trim()
            .parse::<usize>()
            .map(BandWidth::Absolute)
            .map_err(|e| format!("bad band width '{}': {}", s, e)),
    }
}

impl CompareArgs {
    fn to_opt(&self) -> Result<CompareOpt> {
        let mut opt = match &self.config {
            Some(path) => CompareOpt::from_toml_file(path)?,
            None => CompareOpt::default(),
        };
        if let Some(m) = self.mode {
            opt.mode = match m {
                ModeArg::Sensitive => SearchMode::Sensitive,
                ModeArg::Block => SearchMode::Block,
            };
        }
        if let Some(k) = self.word_length {
            opt.word_length = k;
        }
        if let Some(n) = self.min_match {
            opt.min_match = n;
        }
        if let Some(b) = self.band {
            opt.band = b;
        }
        if let Some(g) = self.gap_open {
            opt.gap_open = g;
        }
        if let Some(g) = self.gap_extend {
            opt.gap_extend = g;
        }
        if let Some(m) = self.max_mismatch {
            opt.max_mismatch = m;
        }
        if let Some(e) = self.edge {
            opt.edge_mode = match e {
                EdgeArg::Overlap => EdgeMode::EDGE_GAPS_ZERO | EdgeMode::BEST_EDGE_TRACE,
                EdgeArg::Global => EdgeMode::EDGE_GAPS_COUNT | EdgeMode::FULL_LENGTH_TRACE,
                EdgeArg::ZeroX => EdgeMode::EDGE_GAPS_ZEROX | EdgeMode::BEST_EDGE_TRACE,
            };
        }
        if self.fast {
            opt.fast_mode = true;
        }
        if let Some(n) = self.filter_words {
            opt.filter_words = n;
        }
        if self.single_strand {
            opt.both_strands = false;
        }
        if let Some(t) = self.threads {
            opt.threads = t;
        }
        opt.validate().map_err(|e| anyhow!("{}", e))?;
        Ok(opt)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Compare { a, b, all, opts } => run_compare(&a, &b, all, &opts),
        Commands::Pairs { set, opts } => run_pairs(&set, &opts),
        Commands::Config => {
            print!("{}", CompareOpt::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn names(records: &[FastaRecord]) -> Vec<String> {
    records.iter().map(|r| r.id.clone()).collect()
}

fn seqs(records: &[FastaRecord]) -> Vec<&[u8]> {
    records.iter().map(|r| r.seq.as_slice()).collect()
}

fn writer(opts: &CompareArgs, opt: &CompareOpt) -> Result<ReportWriter<Box<dyn std::io::Write>>> {
    let out: Box<dyn std::io::Write> = match &opts.out {
        Some(p) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(p).with_context(|| format!("cannot create '{}'", p.display()))?,
        )),
        None => Box::new(std::io::BufWriter::new(std::io::stdout())),
    };
    let pads = gap_align::align::overlap::PadSymbols { old: opt.old_pad_byte(), new: opt.new_pad_byte() };
    let w = ReportWriter::new(out, pads);
    Ok(match opts.show_alignment {
        Some(width) => w.with_alignments(width),
        None => w,
    })
}

fn run_compare(a: &Path, b: &Path, all: bool, opts: &CompareArgs) -> Result<()> {
    let opt = opts.to_opt()?;
    let mut recs_a = read_fasta_file(a)?;
    let mut recs_b = read_fasta_file(b)?;
    if !all {
        recs_a.truncate(1);
        recs_b.truncate(1);
    }
    info!(
        "comparing {} x {} sequences ({} mode)",
        recs_a.len(),
        recs_b.len(),
        if matches!(opt.mode, SearchMode::Sensitive) { "sensitive" } else { "block" }
    );

    let report = batch::compare_sets(&seqs(&recs_a), &seqs(&recs_b), &opt)?;
    let mut w = writer(opts, &opt)?;
    w.header("compare")?;
    w.report(&report, &names(&recs_a), &names(&recs_b))?;
    if report.failed > 0 {
        bail!("{} comparisons failed", report.failed);
    }
    Ok(())
}

fn run_pairs(set: &Path, opts: &CompareArgs) -> Result<()> {
    let opt = opts.to_opt()?;
    let recs = read_fasta_file(set)?;
    info!("all-pairs comparison of {} sequences from '{}'", recs.len(), set.display());

    let report = batch::compare_all(&seqs(&recs), &opt)?;
    let mut w = writer(opts, &opt)?;
    w.header("pairs")?;
    let n = names(&recs);
    w.report(&report, &n, &n)?;
    if report.failed > 0 {
        bail!("{} comparisons failed", report.failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_argument() {
        assert_eq!(parse_band("25").unwrap(), BandWidth::Absolute(25));
        assert_eq!(parse_band("5%").unwrap(), BandWidth::Percent(5.0));
        assert!(parse_band("x%").is_err());
    }

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli::parse_from([
            "gap-align", "pairs", "reads.fa", "--mode", "sensitive", "-k", "12", "--min-match", "24",
            "--band", "10%", "--edge", "global", "--single-strand",
        ]);
        let Commands::Pairs { opts, .. } = cli.command else {
            panic!("expected pairs");
        };
        let opt = opts.to_opt().unwrap();
        assert_eq!(opt.mode, SearchMode::Sensitive);
        assert_eq!(opt.word_length, 12);
        assert_eq!(opt.band, BandWidth::Percent(10.0));
        assert_eq!(opt.edge_mode, EdgeMode::EDGE_GAPS_COUNT | EdgeMode::FULL_LENGTH_TRACE);
        assert!(!opt.both_strands);
    }
}
