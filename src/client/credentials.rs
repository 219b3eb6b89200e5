use std::{fs, path::PathBuf, str::FromStr};

use anyhow::Result;

use crate::constant;

/// Single credential persisted under a fixed path, standing in for the
/// browser-local storage of the web client. Injected where needed; the
/// pipeline itself only ever receives the key as a parameter.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new() -> Self {
        let mut path = dirs::home_dir().unwrap();
        path.push(PathBuf::from_str(constant::CREDENTIAL_PATH).unwrap());
        Self { path }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn get(&self) -> Option<String> {
        let key = fs::read_to_string(&self.path).ok()?;
        let key = key.trim().to_string();
        if key.is_empty() { None } else { Some(key) }
    }

    pub fn set(&self, key: &str) -> Result<()> {
        if let Some(parent_dir) = self.path.parent() {
            let _ = fs::create_dir_all(parent_dir)?;
        }
        fs::write(&self.path, key)?;

        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }

        Ok(())
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
