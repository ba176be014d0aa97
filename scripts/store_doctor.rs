use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};

use hearthlist_lib::config;
use hearthlist_lib::diagnostics;
use hearthlist_lib::store::StoreHandle;
use hearthlist_lib::time::to_rfc3339;

#[derive(Debug, Parser)]
#[command(name = "store_doctor", about = "Inspect the Hearthlist offline store", version)]
struct Cli {
    /// Path to the store file; defaults to the app data location.
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Summarize offline storage usage.
    Stats {
        /// Emit the raw JSON summary instead of the text view.
        #[arg(long)]
        json: bool,
    },
    /// List queued pending writes in drain order.
    Queue,
    /// List entries parked after exhausting a retry ceiling.
    DeadLetters,
    /// Remove all snapshots and queued writes. Destructive.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

fn main() {
    hearthlist_lib::logging::init();
    if let Err(err) = run() {
        eprintln!("store_doctor: {err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.store.unwrap_or_else(config::store_path);
    let store = StoreHandle::file(&path)?;

    match cli.command {
        Command::Stats { json } => {
            let summary = diagnostics::gather_summary(&store);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("store:        {}", path.display());
                println!("snapshots:    {}", summary.snapshot_count);
                println!("queued:       {}", summary.queue_length);
                println!("dead letters: {}", summary.dead_letter_count);
                println!("size:         {}", summary.cache_size);
            }
        }
        Command::Queue => {
            let queue = hearthlist_lib::queue::PendingQueue::new(store);
            for entry in queue.entries() {
                println!(
                    "{}  {:?}  household={}  enqueued={}",
                    entry.id,
                    entry.kind,
                    entry.household_id,
                    to_rfc3339(entry.enqueued_at)
                );
            }
        }
        Command::DeadLetters => {
            let queue = hearthlist_lib::queue::PendingQueue::new(store);
            for entry in queue.dead_letters() {
                println!(
                    "{}  {:?}  attempts={}  enqueued={}",
                    entry.id,
                    entry.kind,
                    entry.attempts,
                    to_rfc3339(entry.enqueued_at)
                );
            }
        }
        Command::Clear { yes } => {
            if !yes {
                eprintln!("refusing to clear without --yes");
                process::exit(2);
            }
            let removed = diagnostics::clear_offline_data(&store);
            store.persist()?;
            println!("removed {removed} offline entries");
        }
    }

    Ok(())
}
