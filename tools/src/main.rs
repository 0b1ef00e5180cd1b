//! commission-runner: headless driver for the commission engine.
//!
//! Usage:
//!   commission-runner --db ledger.db --data-dir ./data < event.json
//!   commission-runner --db ledger.db --ipc-mode
//!
//! On startup `{data-dir}/commission/directory.json`, when present, is
//! upserted into the store so a fresh database has an agency tree.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use commission_core::{
    aggregate::DateRange,
    config::SplitConfig,
    directory::DirectorySeed,
    engine::CommissionEngine,
    model::{CommissionEvent, CommissionStatus},
    store::CommissionStore,
};
use std::env;
use std::io::{self, BufRead, Read, Write};
use std::path::Path;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Calculate {
        event: CommissionEvent,
    },
    Record {
        event: CommissionEvent,
    },
    MarkPaid {
        record_ids: Vec<String>,
        #[serde(default)]
        paid_at:    Option<DateTime<Utc>>,
    },
    Summary {
        #[serde(default)]
        start: Option<NaiveDate>,
        #[serde(default)]
        end:   Option<NaiveDate>,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");

    let config = load_config(data_dir)?;
    let mut store = CommissionStore::open(db).with_context(|| format!("opening {db}"))?;
    store.migrate()?;
    seed_directory(&mut store, data_dir)?;
    let mut engine = CommissionEngine::new(store, config)?;

    if ipc_mode {
        run_ipc_loop(&mut engine)
    } else {
        run_once(&engine)
    }
}

/// Read one event from stdin and print its allocation.
fn run_once(engine: &CommissionEngine) -> Result<()> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let event: CommissionEvent =
        serde_json::from_str(&input).context("stdin is not a commission event")?;

    let allocation = engine.preview(&event)?;

    println!("case {} / payee {}", event.case_id, event.payee_id);
    println!("  total:       {:>12.2}", allocation.total_amount);
    for s in &allocation.splits {
        println!(
            "  L{} {:<24} {:<20} {:>6.2}% {:>12.2}",
            s.level,
            s.payee_name,
            s.organization_name,
            s.split_percentage * 100.0,
            s.amount
        );
    }
    println!("  unallocated: {:>12.2}", allocation.unallocated);
    Ok(())
}

fn run_ipc_loop(engine: &mut CommissionEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        if matches!(cmd, IpcCommand::Quit) {
            break;
        }
        let reply = match handle_command(engine, cmd) {
            Ok(value) => value,
            // Calculation errors go back to the caller; the loop keeps running.
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(engine: &mut CommissionEngine, cmd: IpcCommand) -> Result<serde_json::Value> {
    let value = match cmd {
        IpcCommand::Calculate { event } => serde_json::to_value(engine.preview(&event)?)?,
        IpcCommand::Record { event } => {
            serde_json::to_value(engine.calculate_and_record(&event)?)?
        }
        IpcCommand::MarkPaid { record_ids, paid_at } => {
            let at = paid_at.unwrap_or_else(Utc::now);
            let updated = engine.bulk_mark_paid(&record_ids, at)?;
            serde_json::json!({ "updated": updated, "status": CommissionStatus::Paid })
        }
        IpcCommand::Summary { start, end } => {
            let range = match (start, end) {
                (Some(start), Some(end)) => Some(DateRange { start, end }),
                (None, None) => None,
                _ => anyhow::bail!("summary needs both start and end, or neither"),
            };
            serde_json::to_value(engine.period_summary(range)?)?
        }
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

/// The config file is optional: without one the built-in rates apply.
fn load_config(data_dir: &str) -> Result<SplitConfig> {
    let path = Path::new(data_dir).join("commission/split_config.json");
    if path.exists() {
        SplitConfig::load(data_dir)
    } else {
        log::info!("{} not found, using default split rates", path.display());
        Ok(SplitConfig::default())
    }
}

/// The directory file is optional: without one the store keeps whatever
/// tree it already holds.
fn seed_directory(store: &mut CommissionStore, data_dir: &str) -> Result<()> {
    let path = Path::new(data_dir).join("commission/directory.json");
    if !path.exists() {
        log::info!("{} not found, using the tree already in the store", path.display());
        return Ok(());
    }
    let seed = DirectorySeed::load(data_dir)?;
    store.import_directory(&seed)?;
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
