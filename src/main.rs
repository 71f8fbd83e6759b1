use std::collections::HashSet;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use logscope_engine::{
    Classifier, FilterUpdate, LogEntry, LogLevel, PatternSet, Producer, Session, StreamController,
    TimeRange, load_pattern_rules,
};
use logscope_types::ClusterEvent;

/// logscope - a live classification and filtering viewer for cluster debug logs
#[derive(Parser, Debug)]
#[command(name = "logscope")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Buffer size for log entries
    #[arg(long, default_value = "10000")]
    buffer_size: usize,

    /// Buffer size for cluster events
    #[arg(long, default_value = "1000")]
    event_buffer_size: usize,

    /// Ingestion tick period in milliseconds
    #[arg(long, default_value = "5000")]
    period_ms: u64,

    /// TOML file with critical pattern rules (built-in rules when omitted)
    #[arg(long, value_name = "FILE")]
    patterns: Option<PathBuf>,

    /// Source name attached to entries read from stdin
    #[arg(long, default_value = "stdin")]
    source_name: String,

    /// Only show entries matching a critical pattern
    #[arg(long)]
    critical_only: bool,

    /// Admitted levels, comma-separated (default: info,warn,error)
    #[arg(long, value_delimiter = ',')]
    level: Vec<String>,

    /// Restrict to these sources (repeatable)
    #[arg(long)]
    source: Vec<String>,

    /// Case-insensitive substring search over messages
    #[arg(long, default_value = "")]
    search: String,

    /// Time window: 5m, 1h, 24h, or all
    #[arg(long, default_value = "all")]
    time_range: String,

    /// Write the filtered view to this file on exit
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,
}

/// Producer that reads log lines from stdin on a background thread and
/// hands over at most one entry per tick
struct StdinProducer {
    rx: mpsc::Receiver<LogEntry>,
    finished: Arc<AtomicBool>,
}

impl StdinProducer {
    fn spawn(source_name: String) -> Self {
        let (tx, rx) = mpsc::channel();
        let finished = Arc::new(AtomicBool::new(false));
        let thread_finished = Arc::clone(&finished);

        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let mut entry = LogEntry::new(source_name.clone(), line);
                let first_word = entry
                    .message
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .trim_matches(|c: char| !c.is_alphanumeric());
                entry.level = LogLevel::from_str(first_word);
                if tx.send(entry).is_err() {
                    break;
                }
            }
            thread_finished.store(true, Ordering::SeqCst);
        });

        Self { rx, finished }
    }
}

impl Producer for StdinProducer {
    fn next_log_entry(&mut self) -> Option<LogEntry> {
        self.rx.try_recv().ok()
    }

    fn next_cluster_event(&mut self) -> Option<ClusterEvent> {
        None
    }
}

fn build_filter_update(args: &Args) -> Result<FilterUpdate> {
    let mut update = FilterUpdate {
        critical_only: Some(args.critical_only),
        search_query: Some(args.search.clone()),
        ..Default::default()
    };

    if !args.level.is_empty() {
        let mut levels = HashSet::new();
        for name in &args.level {
            levels.insert(LogLevel::from_str(name));
        }
        update.levels = Some(levels);
    }

    if !args.source.is_empty() {
        update.sources = Some(args.source.iter().cloned().collect());
    }

    update.time_range = Some(
        TimeRange::from_label(&args.time_range)
            .with_context(|| format!("unknown time range '{}'", args.time_range))?,
    );

    Ok(update)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing for debugging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run_app(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run_app(args: Args) -> Result<()> {
    // Pattern rules are static configuration; a bad rule is fatal here
    let patterns = match &args.patterns {
        Some(path) => PatternSet::compile(load_pattern_rules(path)?)?,
        None => PatternSet::builtin(),
    };

    let session = Session::new(
        Classifier::new(patterns),
        args.buffer_size,
        args.event_buffer_size,
    );
    session.update_filter(build_filter_update(&args)?);

    let producer = StdinProducer::spawn(args.source_name.clone());
    let exhausted = Arc::clone(&producer.finished);

    let mut controller = StreamController::spawn(
        session.clone(),
        producer,
        Duration::from_millis(args.period_ms),
    );

    let notifier = session.notifier();
    let mut last_printed_id: Option<u64> = None;
    let mut drain_interval = tokio::time::interval(Duration::from_millis(args.period_ms.max(50)));
    let mut last_ingested = 0;

    loop {
        tokio::select! {
            _ = notifier.notified() => {
                print_new_entries(&session, &mut last_printed_id);
            }

            _ = drain_interval.tick() => {
                print_new_entries(&session, &mut last_printed_id);
                // Exit once stdin is closed and the controller has drained
                // the producer's backlog (ingestion stalls for a full tick)
                let ingested = session.ingested_entries() + session.dropped_entries();
                if exhausted.load(Ordering::SeqCst) && ingested == last_ingested {
                    break;
                }
                last_ingested = ingested;
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    controller.shutdown();

    if let Some(path) = &args.export {
        std::fs::write(path, session.export_text())
            .with_context(|| format!("failed to write export to {}", path.display()))?;
    }

    let summary = session.summary_counts();
    eprintln!(
        "{} visible, {} critical, {} malformed dropped",
        summary.total,
        summary.critical,
        session.dropped_entries()
    );

    Ok(())
}

fn print_new_entries(session: &Session, last_printed_id: &mut Option<u64>) {
    for classified in session.visible_entries() {
        if last_printed_id.is_some_and(|last| classified.entry.id <= last) {
            continue;
        }
        let line = match &classified.critical {
            Some(critical) => format!(
                "{} [{}] {} !! {} ({})",
                classified.entry.timestamp.format("%H:%M:%S%.3f"),
                classified.effective_level.as_str(),
                classified.entry.message,
                critical.description,
                critical.classification.as_str()
            ),
            None => format!(
                "{} [{}] {}",
                classified.entry.timestamp.format("%H:%M:%S%.3f"),
                classified.effective_level.as_str(),
                classified.entry.message
            ),
        };
        println!("{line}");
        session.push_transcript(line);
        *last_printed_id = Some(classified.entry.id);
    }
}
