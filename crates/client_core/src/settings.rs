use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "bidconnect.toml";
const ENV_PREFIX: &str = "BIDCONNECT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Mock,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub backend: BackendKind,
    pub base_url: String,
    pub storage_path: Option<PathBuf>,
    pub mock_latency_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Mock,
            base_url: "http://127.0.0.1:8080".into(),
            storage_path: None,
            mock_latency_ms: 800,
            request_timeout_secs: 30,
        }
    }
}

impl ClientSettings {
    /// Layers, lowest first: defaults, the settings file, `BIDCONNECT__*`
    /// environment variables. An explicit `path` must exist; otherwise
    /// `bidconnect.toml` in the working directory is read when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(path) if !path.exists() => {
                return Err(anyhow!("settings file {} does not exist", path.display()));
            }
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(
                config::File::with_name(DEFAULT_SETTINGS_FILE).required(false),
            ),
        };

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Self = builder
            .build()
            .context("failed to read client settings")?
            .try_deserialize()
            .context("invalid client settings")?;
        settings.base_url()?;
        Ok(settings)
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).with_context(|| format!("invalid base_url '{}'", self.base_url))
    }

    /// Location of the persisted session file.
    pub fn storage_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.storage_path {
            return Ok(path.clone());
        }
        let base = dirs::data_local_dir()
            .ok_or_else(|| anyhow!("unable to resolve local app data dir"))?;
        Ok(base.join("bidconnect").join("session.json"))
    }

    pub fn mock_latency(&self) -> Duration {
        Duration::from_millis(self.mock_latency_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            "backend = \"http\"\nbase_url = \"http://tenders.local:9000/\"\nmock_latency_ms = 0\n",
        )
        .expect("write settings");

        let settings = ClientSettings::load(Some(&path)).expect("load");
        assert_eq!(settings.backend, BackendKind::Http);
        assert_eq!(settings.base_url, "http://tenders.local:9000/");
        assert_eq!(settings.mock_latency(), Duration::ZERO);
        assert_eq!(settings.request_timeout_secs, 30);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(ClientSettings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn explicit_storage_path_wins() {
        let settings = ClientSettings {
            storage_path: Some(PathBuf::from("/tmp/bc/session.json")),
            ..ClientSettings::default()
        };
        assert_eq!(
            settings.storage_path().expect("path"),
            PathBuf::from("/tmp/bc/session.json")
        );
    }
}
