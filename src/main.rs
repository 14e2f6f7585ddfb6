//! meshsub - inspect subscription matching from the command line
//!
//! Loads subscription events (JSON lines, as replicated between cluster
//! nodes) into a trie and resolves topics against it.
//!
//! Usage:
//!   meshsub [OPTIONS] <COMMAND>
//!
//! Commands:
//!   lookup <PATTERN>   Resolve a pattern with `+` wildcards and fan-out
//!   exact <TOPIC>      Resolve one topic, no wildcards, no fan-out
//!   dump               Print the trie as subscribe events
//!   stats              Print node, group and session counts
//!
//! Options:
//!   -c, --config <FILE>          Configuration file path
//!   -s, --subscriptions <FILE>   Subscription events to load (JSON lines)
//!   -l, --log-level              Log level (error, warn, info, debug, trace)
//!   --metrics                    Print Prometheus metrics after the command
//!   -h, --help                   Print help

use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use meshsub::{Config, Metrics, PeerName, Session, SubEvent, SubTrie, TrieError};

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    #[default]
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// meshsub - subscription matching for clustered pub/sub
#[derive(Parser, Debug)]
#[command(name = "meshsub")]
#[command(author = "meshsub Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Resolve pub/sub destinations from a subscription trie")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subscription events to load, one JSON object per line
    #[arg(short, long)]
    subscriptions: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,

    /// Print Prometheus metrics after the command
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a pattern with `+` wildcards and subtree fan-out
    Lookup {
        pattern: String,
        /// Number of consecutive lookups (shows group rotation)
        #[arg(short, long, default_value_t = 1)]
        repeat: usize,
    },
    /// Resolve exactly one topic
    Exact {
        topic: String,
        /// Number of consecutive lookups (shows group rotation)
        #[arg(short, long, default_value_t = 1)]
        repeat: usize,
    },
    /// Print every subscription as a subscribe event
    Dump,
    /// Print trie size
    Stats,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    // Load configuration file if specified, otherwise defaults + env overrides
    let loaded = match &args.config {
        Some(path) => Config::load(path),
        None => Config::from_env(),
    };
    let file_config = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    // Setup logging - CLI overrides config, config overrides default (warn)
    let log_level = args.log_level.unwrap_or_else(|| {
        match file_config.log.level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Warn,
        }
    });

    // Logs go to stderr so stdout carries only results
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level.to_tracing_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    let metrics_enabled = args.metrics || file_config.metrics.enabled;
    let mut trie = SubTrie::with_limits(file_config.trie.limits());
    if metrics_enabled {
        trie = trie.with_metrics(Metrics::new());
    }

    if let Some(path) = &args.subscriptions {
        let applied = load_events(&trie, path)?;
        let stats = trie.stats();
        info!(
            applied,
            nodes = stats.nodes,
            sessions = stats.sessions,
            "Loaded subscriptions from {:?}",
            path
        );
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match args.command {
        Command::Lookup { pattern, repeat } => {
            for round in 0..repeat {
                print_round(&mut out, round, repeat, trie.lookup(&pattern))?;
            }
        }
        Command::Exact { topic, repeat } => {
            for round in 0..repeat {
                print_round(&mut out, round, repeat, trie.lookup_exactly(&topic))?;
            }
        }
        Command::Dump => {
            for event in trie.snapshot() {
                serde_json::to_writer(&mut out, &event)?;
                writeln!(out)?;
            }
        }
        Command::Stats => {
            let stats = trie.stats();
            writeln!(
                out,
                "nodes={} groups={} sessions={}",
                stats.nodes, stats.groups, stats.sessions
            )?;
        }
    }

    if let Some(metrics) = trie.metrics() {
        write!(out, "{}", metrics.encode_text()?)?;
    }

    Ok(())
}

/// Apply every event in a JSON-lines file; blank lines and `#` comments are skipped
fn load_events(trie: &SubTrie<PeerName>, path: &Path) -> Result<usize, Box<dyn Error>> {
    let reader = BufReader::new(File::open(path)?);
    let mut applied = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let event: SubEvent<PeerName> = serde_json::from_str(line)
            .map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?;
        match trie.apply(&event) {
            Ok(_) => applied += 1,
            Err(e) => warn!(line = index + 1, "Skipping subscription event: {}", e),
        }
    }

    Ok(applied)
}

fn print_round(
    out: &mut impl Write,
    round: usize,
    rounds: usize,
    result: Result<Vec<Session<PeerName>>, TrieError>,
) -> Result<(), Box<dyn Error>> {
    if rounds > 1 {
        writeln!(out, "# round {}", round + 1)?;
    }
    match result {
        Ok(sessions) => {
            for session in sessions {
                writeln!(out, "{}\t{}", session.addr, session.client_id)?;
            }
        }
        Err(TrieError::NoMatch) => writeln!(out, "no match")?,
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
