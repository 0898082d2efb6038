use clap::Parser;
use owo_colors::OwoColorize;
use url::Url;

mod cli;

use cli::op::{Op, OpContext};
use cli::ops::{Daemon, Health, Version};

crate::command_enum! {
    (Daemon, Daemon),
    (Health, Health),
    (Version, Version),
}

#[derive(Parser, Debug)]
#[command(name = "gary", version, about = "Random images, quotes and jokes over HTTP")]
struct Cli {
    /// Base URL of a running service, used by client commands
    #[arg(
        long,
        global = true,
        env = "GARY_REMOTE",
        default_value = "http://localhost:8080"
    )]
    remote: Url,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let ctx = OpContext::new(&cli.remote)?;

    match cli.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
