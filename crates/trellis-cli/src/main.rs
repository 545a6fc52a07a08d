use clap::Parser;
use tracing::Level;

mod cli;
mod commands;
mod render;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = commands::run_command(cli).await {
        eprintln!("{}", render::error(&e));
        std::process::exit(render::exit_code(&e));
    }
}
