use std::{fs, str::FromStr};

use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::constant;

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_preamble")]
    pub preamble: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_preamble() -> String {
    constant::DEFAULT_PREAMBLE.into()
}

#[derive(Debug, Deserialize, Clone)]
pub struct HTTPChannelConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChannelsConfig {
    pub http: Option<HTTPChannelConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MystraConfig {
    pub upstream: UpstreamConfig,
    pub channels: ChannelsConfig,
    pub client: Option<ClientConfig>,
}

#[derive(Debug, Deserialize, Clone)]
struct AllConfig {
    mystra: MystraConfig,
}

impl MystraConfig {
    pub fn load(path: Option<std::path::PathBuf>) -> Result<Self> {
        let default_path = Self::default_path();

        let path = path.unwrap_or_else(|| {
            log::warn!(
                "config path not inputed, fallback to {:?}",
                default_path.to_str().unwrap()
            );

            default_path
        });

        if !path.exists() {
            log::warn!(
                "{} not found, generating a new config file",
                path.to_str().unwrap()
            );

            Self::create_file(path.clone())?;
        }

        let settings = Config::builder()
            .add_source(config::File::from(path.clone()))
            .build()?;

        log::info!("config loaded: {:?}", path.to_str().unwrap());
        let config = settings.try_deserialize::<AllConfig>()?;

        Ok(config.mystra)
    }

    pub fn default_path() -> std::path::PathBuf {
        let mut path = dirs::home_dir().unwrap();
        path.push(std::path::PathBuf::from_str(constant::DEFAULT_CONFIG_PATH).unwrap());
        path
    }

    pub fn create_file(path: std::path::PathBuf) -> Result<()> {
        if let Some(parent_dir) = path.parent() {
            let _ = std::fs::create_dir_all(parent_dir)?;
        }

        let _ = fs::write(&path, constant::DEFAULT_CONFIG_TOML)?;

        Ok(())
    }

    /// Where `mystra chat` points. Falls back to the local relay port.
    pub fn client_base_url(&self) -> String {
        match &self.client {
            Some(client) => client.base_url.clone(),
            None => {
                let port = self.channels.http.as_ref().map(|h| h.port).unwrap_or(8080);
                format!("http://localhost:{}", port)
            }
        }
    }
}
