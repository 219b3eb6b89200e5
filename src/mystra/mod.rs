use anyhow::Result;

use clap::{Parser, Subcommand};

use crate::config::MystraConfig;

mod chat;
mod run;

#[derive(Parser, Debug)]
#[command(version, about, long_about=None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the relay server
    Run(run::RunArgs),
    /// Open a terminal chat session against a running relay
    Chat(chat::ChatArgs),
    /// generate new config, non-interactively
    Configure,
}

pub async fn cli() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run(args) => run::run(args.clone()).await?,
        Commands::Chat(args) => chat::chat(args.clone()).await?,
        Commands::Configure => {
            let path = MystraConfig::default_path();
            MystraConfig::create_file(path.clone())?;
            log::info!("config written to {:?}", path.to_str().unwrap());
        }
    }

    Ok(())
}
