//! `taskgraph` inspector CLI.
//!
//! Collections are opaque JSON documents from this binary's point of view -
//! it doesn't link against any concrete `Record` type, so it reads the raw
//! `{version, updated_at, records}` shape directly rather than going through
//! `Store<T>`. Useful for poking at a `polyphase` project's on-disk state
//! without pulling in the orchestrator crate.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use crate::store::read_json;

#[derive(Parser)]
#[command(name = "taskgraph", version = env!("CARGO_PKG_VERSION"), about = "Inspect taskgraph-backed collections")]
pub struct Cli {
    /// Directory holding the collection's `<name>.json` document.
    #[arg(long, global = true, default_value = ".")]
    pub dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the version, last-updated time, and record count for a collection.
    Stats {
        /// Collection name, e.g. "tasks" (reads `<dir>/<name>.json`).
        collection: String,
    },
    /// Print the ids of every record in a collection.
    List {
        collection: String,
    },
    /// Print one record by id.
    Show {
        collection: String,
        id: String,
    },
    /// List snapshot files under `<dir>/snapshots`.
    Snapshots {
        collection: String,
    },
}

pub fn run(cli: Cli) -> eyre::Result<()> {
    match cli.command {
        Command::Stats { collection } => stats(&cli.dir, &collection),
        Command::List { collection } => list(&cli.dir, &collection),
        Command::Show { collection, id } => show(&cli.dir, &collection, &id),
        Command::Snapshots { collection } => snapshots(&cli.dir, &collection),
    }
}

fn doc(dir: &PathBuf, collection: &str) -> eyre::Result<Value> {
    let path = dir.join(format!("{}.json", collection));
    read_json::<Value>(&path)?.ok_or_else(|| eyre::eyre!("no collection document at {}", path.display()))
}

fn stats(dir: &PathBuf, collection: &str) -> eyre::Result<()> {
    let doc = doc(dir, collection)?;
    let version = doc.get("version").and_then(Value::as_u64).unwrap_or(0);
    let updated_at = doc.get("updated_at").and_then(Value::as_i64).unwrap_or(0);
    let count = doc
        .get("records")
        .and_then(Value::as_object)
        .map(|m| m.len())
        .unwrap_or(0);
    println!("collection: {}", collection);
    println!("version:    {}", version);
    println!("updated_at: {}", updated_at);
    println!("records:    {}", count);
    Ok(())
}

fn list(dir: &PathBuf, collection: &str) -> eyre::Result<()> {
    let doc = doc(dir, collection)?;
    if let Some(records) = doc.get("records").and_then(Value::as_object) {
        let mut ids: Vec<&String> = records.keys().collect();
        ids.sort();
        for id in ids {
            println!("{}", id);
        }
    }
    Ok(())
}

fn show(dir: &PathBuf, collection: &str, id: &str) -> eyre::Result<()> {
    let doc = doc(dir, collection)?;
    match doc.get("records").and_then(|r| r.get(id)) {
        Some(record) => println!("{}", serde_json::to_string_pretty(record)?),
        None => eyre::bail!("no record {} in collection {}", id, collection),
    }
    Ok(())
}

fn snapshots(dir: &PathBuf, collection: &str) -> eyre::Result<()> {
    let snapshots_dir = dir.join("snapshots");
    if !snapshots_dir.exists() {
        return Ok(());
    }
    let prefix = format!("{}_", collection);
    let mut names: Vec<String> = std::fs::read_dir(&snapshots_dir)?
        .flatten()
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.starts_with(&prefix) || collection.is_empty())
        .collect();
    names.sort();
    for name in names {
        println!("{}", name);
    }
    Ok(())
}
