use anyhow::Result;
use futures::future::join_all;

use crate::{
    channels::http::HTTPChannel,
    config::{ChannelsConfig, UpstreamConfig},
};

pub mod http;

pub trait Channel {
    async fn run(&mut self) -> Result<()>;
}

pub struct Channels {
    config: ChannelsConfig,
    upstream: UpstreamConfig,
}

impl Channels {
    pub fn new(config: ChannelsConfig, upstream: UpstreamConfig) -> Result<Self> {
        Ok(Self { config, upstream })
    }

    pub async fn run(&self) -> Result<()> {
        let mut handles = vec![];

        if let Some(http_config) = &self.config.http {
            let mut http = HTTPChannel::new(http_config.clone(), self.upstream.clone())?;

            handles.push(tokio::spawn(async move {
                if let Err(e) = http.run().await {
                    log::error!("Err{:?}", e);
                }
            }));
        }

        for res in join_all(handles).await {
            res?;
        }

        Ok(())
    }
}
