use anyhow::Result;
use clap::Args;

use crate::{channels::Channels, config::MystraConfig};

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[arg(
        short,
        long,
        value_name = "PATH",
        value_hint = clap::ValueHint::DirPath,
        help = "path to mystra config file",
    )]
    config: Option<std::path::PathBuf>,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = MystraConfig::load(args.config)?;

    let channels = Channels::new(config.channels.clone(), config.upstream.clone())?;
    channels.run().await?;

    Ok(())
}
