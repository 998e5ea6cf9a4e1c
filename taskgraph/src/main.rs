use clap::Parser;
use taskgraph::cli::Cli;

fn main() -> eyre::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    taskgraph::cli::run(cli)
}
