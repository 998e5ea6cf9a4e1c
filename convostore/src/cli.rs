//! CLI argument parsing for convostore

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

use crate::{Message, Role, ThreadStore};

#[derive(Parser, Debug)]
#[command(name = "convostore")]
#[command(author, version, about = "Inspect and replay bounded conversation threads", long_about = None)]
pub struct Cli {
    /// Directory holding `<thread_id>.json` snapshots (defaults to `.pipeline/threads`)
    #[arg(short, long, default_value = ".pipeline/threads")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List persisted thread ids
    List,
    /// Print every message in a thread
    Show {
        thread_id: String,
    },
    /// Print token usage for a thread
    Stats {
        thread_id: String,
    },
    /// Append a user message to a thread and re-save it
    Append {
        thread_id: String,
        phase: String,
        content: String,
    },
    /// Delete a persisted thread
    Delete {
        thread_id: String,
    },
}

pub fn run(cli: Cli) -> eyre::Result<()> {
    let store = ThreadStore::open(&cli.root);
    match cli.command {
        Command::List => {
            for id in store.list()? {
                println!("{}", id);
            }
        }
        Command::Show { thread_id } => {
            let thread = store.load(&thread_id, "")?;
            for m in &thread.messages {
                let role = format!("{:?}", m.role).to_lowercase();
                let role = match m.role {
                    Role::System => role.magenta(),
                    Role::User => role.cyan(),
                    Role::Assistant => role.green(),
                    Role::Tool => role.yellow(),
                };
                println!("[{}] {}", role, m.content);
            }
        }
        Command::Stats { thread_id } => {
            let thread = store.load(&thread_id, "")?;
            println!("thread:   {}", thread_id);
            println!("version:  {}", thread.version);
            println!("messages: {}", thread.messages.len());
            println!("tokens:   {}", thread.total_tokens());
        }
        Command::Append { thread_id, phase, content } => {
            let mut thread = store.load(&thread_id, &phase)?;
            thread.append(Message::user(content));
            store.snapshot_thread(&mut thread)?;
            println!("{} appended to {}", "✓".green(), thread_id);
        }
        Command::Delete { thread_id } => {
            store.delete(&thread_id)?;
            println!("{} deleted {}", "✓".green(), thread_id);
        }
    }
    Ok(())
}
