pub const DEFAULT_CONFIG_PATH: &str = "config/.mystra/config.toml"; // relative to $HOME
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../templates/mystra.template.toml");

pub const CREDENTIAL_PATH: &str = "config/.mystra/api_key"; // relative to $HOME

pub const DEFAULT_PREAMBLE: &str = include_str!("../templates/PREAMBLE.md");
