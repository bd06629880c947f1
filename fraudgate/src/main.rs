// fraudgate/src/main.rs
//
// fraudgate — checkout fraud-risk gate daemon
//
// Reads a JSONL feed of storefront risk events (failed logins, sign-ups,
// checkouts, generic rate checks), evaluates each against the in-memory
// signal store and writes verdicts to the output directory.
//
// Two operational modes:
//   tail    — follow a live JSONL feed (wall clock, background reaper)
//   replay  — evaluate a captured feed in timestamp order; the store clock
//             follows the recorded timestamps and sweeps run on that timeline
//
// Usage:
//   fraudgate --mode tail --path /var/log/storefront/risk_events.jsonl
//   fraudgate --mode replay --path captured.jsonl --config risk.json

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fraudgate::engine::dispatcher::Dispatcher;
use fraudgate::events::{RiskEvent, RiskEventKind, RiskVerdict};
use fraudgate::{
    assess_order_risk, is_rate_limited, record_account_creation, record_failed_login,
    start_reaper, Clock, ManualClock, RateLimit, RiskConfig, RiskError, RiskSignalStore, SystemClock,
};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "fraudgate",
    about   = "Checkout fraud-risk gate: rate limits, device fingerprints, order scoring",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[arg(long, value_enum, default_value = "tail")]
    mode: Mode,

    #[arg(long, default_value = "/tmp/fraudgate_events.jsonl",
          help = "JSONL risk-event feed")]
    path: PathBuf,

    #[arg(long, default_value = "/tmp/fraudgate_output",
          help = "Verdict output directory")]
    output: PathBuf,

    #[arg(long, help = "JSON config file overriding default thresholds")]
    config: Option<PathBuf>,

    #[arg(long, help = "Reaper interval in seconds (overrides config)")]
    reaper_interval: Option<u64>,

    #[arg(long, default_value = "60", help = "Stats print interval in seconds (tail mode)")]
    stats_interval: u64,
}

#[derive(Clone, ValueEnum)]
enum Mode {
    Tail,    // follow a live JSONL feed
    Replay,  // evaluate a captured feed on its own timeline
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

struct Pipeline {
    store:      Arc<RiskSignalStore>,
    dispatcher: Dispatcher,
}

impl Pipeline {
    fn new(config: RiskConfig, clock: Arc<dyn Clock>, output: PathBuf) -> Result<Self> {
        Ok(Self {
            store:      Arc::new(RiskSignalStore::with_config(config, clock)?),
            dispatcher: Dispatcher::new(output)?,
        })
    }

    async fn process(&self, event: RiskEvent) {
        let verdict = match evaluate(&self.store, &event) {
            Ok(v)  => v,
            Err(e) => {
                warn!("Rejected {} event from {}: {}", event.kind.label(), event.kind.subject(), e);
                return;
            }
        };
        if let Err(e) = self.dispatcher.dispatch(&verdict).await {
            error!("Dispatch failed: {:#}", e);
        }
    }
}

fn evaluate(store: &RiskSignalStore, event: &RiskEvent) -> std::result::Result<RiskVerdict, RiskError> {
    let (flagged, assessment) = match &event.kind {
        RiskEventKind::FailedLogin { ip, email } =>
            (record_failed_login(store, ip, email)?, None),
        RiskEventKind::AccountCreation { ip } =>
            (record_account_creation(store, ip)?, None),
        RiskEventKind::Checkout { order, user, device } => {
            let a = assess_order_risk(store, order, user, device)?;
            (a.requires_review, Some(a))
        }
        RiskEventKind::RateCheck { identifier, action, limit, window_ms } => {
            let base   = store.config().default_rate_limit;
            let policy = RateLimit::per_ms(
                limit.unwrap_or(base.limit),
                window_ms.unwrap_or(base.window_ms),
            );
            (is_rate_limited(store, identifier, action, policy)?, None)
        }
    };

    Ok(RiskVerdict {
        request_id: event.request_id.clone(),
        kind:       event.kind.label().to_string(),
        subject:    event.kind.subject().to_string(),
        flagged,
        assessment,
        timestamp:  store.now(),
    })
}

// ── Terminal output ───────────────────────────────────────────────────────────

fn print_banner(mode: &str, cli: &Cli) {
    println!("\n  \x1b[1mfraudgate\x1b[0m \x1b[90mv{}\x1b[0m", env!("CARGO_PKG_VERSION"));
    println!("  Mode: \x1b[96m{}\x1b[0m  |  {}", mode, cli.path.display());
    println!("  Output: \x1b[90m{}\x1b[0m\n", cli.output.display());
}

fn print_stats(store: &RiskSignalStore, elapsed_secs: f64) {
    let s = store.stats();
    println!(
        "\n\x1b[1m── stats  uptime={:.0}s  checkouts={}  high_risk={}  rate_keys={}  devices={}  \
         logins={}  signups={}  cards={}  sweeps={} ──\x1b[0m",
        elapsed_secs, s.evaluations, s.high_risk_orders, s.rate_limits, s.devices,
        s.failed_logins, s.account_creations, s.checkout_attempts, s.sweeps
    );
}

async fn print_stats_loop(store: Arc<RiskSignalStore>, start: Instant, every: u64) {
    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(every.max(1))).await;
        print_stats(&store, start.elapsed().as_secs_f64());
    }
}

// ── Event sources ─────────────────────────────────────────────────────────────

async fn tail_jsonl(path: PathBuf, tx: mpsc::Sender<RiskEvent>) -> Result<()> {
    let file = tokio::fs::File::open(&path).await
        .with_context(|| format!("opening feed {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    while lines.next_line().await?.is_some() {}  // consume existing

    info!("Tailing {}", path.display());
    loop {
        match lines.next_line().await? {
            Some(line) => {
                let line = line.trim();
                if line.is_empty() { continue; }
                match serde_json::from_str::<RiskEvent>(line) {
                    Ok(ev) => { if tx.send(ev).await.is_err() { break; } }
                    Err(e) => warn!("Parse error: {}", e),
                }
            }
            None => tokio::time::sleep(tokio::time::Duration::from_millis(50)).await,
        }
    }
    Ok(())
}

fn load_replay(content: &str) -> Vec<(DateTime<Utc>, RiskEvent)> {
    let parsed: Vec<RiskEvent> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|l| match serde_json::from_str::<RiskEvent>(l) {
            Ok(ev) => Some(ev),
            Err(e) => { warn!("Parse error: {}", e); None }
        })
        .collect();

    // Untimed events inherit the previous timestamp; a leading untimed run
    // takes the first recorded one.
    let first_ts = parsed.iter().find_map(|ev| ev.timestamp).unwrap_or_else(Utc::now);
    let mut last_ts = first_ts;
    let mut events: Vec<_> = parsed
        .into_iter()
        .map(|ev| {
            last_ts = ev.timestamp.unwrap_or(last_ts);
            (last_ts, ev)
        })
        .collect();
    events.sort_by_key(|(ts, _)| *ts);
    events
}

async fn run_replay(cli: &Cli, config: RiskConfig) -> Result<()> {
    let content = tokio::fs::read_to_string(&cli.path).await
        .with_context(|| format!("reading feed {}", cli.path.display()))?;
    let events = load_replay(&content);
    if events.is_empty() {
        info!("No events in {}", cli.path.display());
        return Ok(());
    }

    let sweep_every = chrono::Duration::from_std(config.reaper_interval())
        .context("reaper interval out of range")?;
    let clock       = Arc::new(ManualClock::new(events[0].0));
    let pipeline    = Pipeline::new(config, clock.clone(), cli.output.clone())?;
    let start       = Instant::now();
    let mut last_sweep = events[0].0;

    for (ts, event) in events {
        while ts - last_sweep >= sweep_every {
            last_sweep = last_sweep + sweep_every;
            clock.set(last_sweep);
            pipeline.store.cleanup();
        }
        clock.set(ts);
        pipeline.process(event).await;
    }

    print_stats(&pipeline.store, start.elapsed().as_secs_f64());
    Ok(())
}

async fn run_tail(cli: &Cli, config: RiskConfig) -> Result<()> {
    let interval = config.reaper_interval();
    let pipeline = Pipeline::new(config, Arc::new(SystemClock), cli.output.clone())?;
    let start    = Instant::now();
    let (tx, mut rx) = mpsc::channel::<RiskEvent>(16384);

    let reaper = start_reaper(Arc::clone(&pipeline.store), interval)?;
    tokio::spawn(print_stats_loop(Arc::clone(&pipeline.store), start, cli.stats_interval));

    let path = cli.path.clone();
    tokio::spawn(async move {
        if let Err(e) = tail_jsonl(path, tx).await {
            error!("Feed reader stopped: {:#}", e);
        }
    });

    println!("  Press Ctrl+C to stop.\n");

    // Events are evaluated in arrival order; the store is shared with the reaper
    loop {
        tokio::select! {
            ev = rx.recv() => match ev {
                Some(event) => pipeline.process(event).await,
                None        => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    reaper.stop().await;
    print_stats(&pipeline.store, start.elapsed().as_secs_f64());
    Ok(())
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("fraudgate=info".parse()?))
        .compact().init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RiskConfig::from_file(path)?,
        None       => RiskConfig::default(),
    };
    if let Some(secs) = cli.reaper_interval {
        config.reaper_interval_secs = secs;
    }
    config.validate()?;

    match cli.mode {
        Mode::Tail => {
            print_banner("TAIL", &cli);
            run_tail(&cli, config).await
        }
        Mode::Replay => {
            print_banner("REPLAY", &cli);
            run_replay(&cli, config).await
        }
    }
}
