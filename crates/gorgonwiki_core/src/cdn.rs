use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde_json::{Map, Value};

use crate::config::{BotConfig, render_data_url};

/// One upstream data file: a JSON object keyed by internal identifier.
pub type DataFile = Map<String, Value>;

pub trait CdnFetch {
    fn fetch_version(&mut self) -> Result<String>;
    fn fetch_file(&mut self, version: &str, file: &str) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct CdnClientConfig {
    pub version_url: String,
    pub data_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl CdnClientConfig {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            version_url: config.version_url(),
            data_url: config.data_url(),
            user_agent: config.user_agent(),
            timeout_ms: 60_000,
        }
    }
}

pub struct CdnClient {
    client: Client,
    config: CdnClientConfig,
}

impl CdnClient {
    pub fn new(config: CdnClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build CDN HTTP client")?;
        Ok(Self { client, config })
    }
}

impl CdnFetch for CdnClient {
    fn fetch_version(&mut self) -> Result<String> {
        let response = self
            .client
            .get(&self.config.version_url)
            .header("User-Agent", self.config.user_agent.clone())
            .send()
            .with_context(|| format!("failed to fetch {}", self.config.version_url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("version request failed with HTTP {status}");
        }
        let body = response
            .text()
            .context("failed to read version response body")?;
        let version = body.trim().to_string();
        if version.is_empty() {
            bail!("CDN returned an empty version string");
        }
        Ok(version)
    }

    fn fetch_file(&mut self, version: &str, file: &str) -> Result<Value> {
        let url = render_data_url(&self.config.data_url, version, file);
        let response = self
            .client
            .get(&url)
            .header("User-Agent", self.config.user_agent.clone())
            .send()
            .with_context(|| format!("failed to fetch {url}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("data request for {file} failed with HTTP {status}");
        }
        response
            .json()
            .with_context(|| format!("failed to decode {file}.json"))
    }
}

/// Version-pinned access to the upstream data files.
///
/// Each file is read from `<cache_root>/v<version>/<file>.json` when present and
/// downloaded (then written there) otherwise. Parsed files are memoized for the
/// lifetime of the value since they cannot change while the process runs.
pub struct GameData {
    fetcher: RefCell<Box<dyn CdnFetch>>,
    version: String,
    version_dir: Option<PathBuf>,
    files: RefCell<BTreeMap<String, Rc<DataFile>>>,
}

impl GameData {
    pub fn open(
        mut fetcher: Box<dyn CdnFetch>,
        cache_root: &Path,
        pinned_version: Option<&str>,
    ) -> Result<Self> {
        let version = match pinned_version {
            Some(version) => version.trim().to_string(),
            None => fetcher.fetch_version()?,
        };
        let version_dir = cache_root.join(format!("v{version}"));
        fs::create_dir_all(&version_dir)
            .with_context(|| format!("failed to create {}", version_dir.display()))?;
        tracing::debug!(version = %version, cache = %version_dir.display(), "opened game data");

        Ok(Self {
            fetcher: RefCell::new(fetcher),
            version,
            version_dir: Some(version_dir),
            files: RefCell::new(BTreeMap::new()),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn version_dir(&self) -> Option<&Path> {
        self.version_dir.as_deref()
    }

    pub fn file(&self, name: &str) -> Result<Rc<DataFile>> {
        if let Some(file) = self.files.borrow().get(name) {
            return Ok(Rc::clone(file));
        }

        let value = self.load_or_download(name)?;
        let data = match value {
            Value::Object(map) => Rc::new(map),
            other => bail!(
                "{name}.json must be a JSON object keyed by id, found {}",
                json_kind(&other)
            ),
        };
        self.files
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&data));
        Ok(data)
    }

    fn load_or_download(&self, name: &str) -> Result<Value> {
        let cached_path = self
            .version_dir
            .as_ref()
            .map(|dir| dir.join(format!("{name}.json")));

        if let Some(path) = &cached_path
            && path.exists()
        {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            return serde_json::from_str(&content)
                .with_context(|| format!("failed to parse cached {}", path.display()));
        }

        tracing::info!(file = name, version = %self.version, "downloading data file");
        let value = self.fetcher.borrow_mut().fetch_file(&self.version, name)?;
        if !value.is_object() {
            bail!(
                "{name}.json must be a JSON object keyed by id, found {}",
                json_kind(&value)
            );
        }
        if let Some(path) = &cached_path {
            let rendered =
                serde_json::to_string(&value).context("failed to serialize data file")?;
            fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        Ok(value)
    }

    /// In-memory data set with no disk cache and no network access.
    #[cfg(test)]
    pub(crate) fn preloaded<I>(version: &str, files: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        let mut loaded = BTreeMap::new();
        for (name, value) in files {
            if let Value::Object(map) = value {
                loaded.insert(name.to_string(), Rc::new(map));
            }
        }
        Self {
            fetcher: RefCell::new(Box::new(OfflineFetch)),
            version: version.to_string(),
            version_dir: None,
            files: RefCell::new(loaded),
        }
    }
}

#[cfg(test)]
struct OfflineFetch;

#[cfg(test)]
impl CdnFetch for OfflineFetch {
    fn fetch_version(&mut self) -> Result<String> {
        bail!("offline")
    }

    fn fetch_file(&mut self, _version: &str, file: &str) -> Result<Value> {
        bail!("offline: {file}.json was not preloaded")
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
