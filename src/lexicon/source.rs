//! Where lexicon documents come from
//!
//! A [`LexiconSource`] returns the raw document text for a version; parsing and
//! validation happen in the store so every source is held to the same rules.
//!
//! - [`FileLexiconSource`]: a local JSON file, or a directory of
//!   `<version>.json` files
//! - [`HttpLexiconSource`]: `GET {base_url}/{version}.json`, `latest.json` when
//!   no version is pinned
//! - [`StaticLexiconSource`]: a document held in memory, including the lexicon
//!   bundled into the binary as the last-resort fallback

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Lexicon compiled into the binary
pub const BUNDLED_LEXICON: &str = include_str!("../../data/lexicon.json");

/// Supplier of raw lexicon documents
#[async_trait]
pub trait LexiconSource: Send + Sync {
    /// Fetch the document for `version`, or the latest one when `None`
    async fn fetch(&self, version: Option<&str>) -> EngineResult<String>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Reads lexicon documents from the local filesystem
#[derive(Debug, Clone)]
pub struct FileLexiconSource {
    path: PathBuf,
}

impl FileLexiconSource {
    /// `path` is either a document, or a directory holding `<version>.json`
    /// files plus an optional `latest.json`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn resolve(&self, version: Option<&str>) -> PathBuf {
        if !self.path.is_dir() {
            return self.path.clone();
        }
        self.path
            .join(format!("{}.json", version.unwrap_or("latest")))
    }
}

#[async_trait]
impl LexiconSource for FileLexiconSource {
    async fn fetch(&self, version: Option<&str>) -> EngineResult<String> {
        let path = self.resolve(version);
        tracing::debug!(path = %path.display(), "reading lexicon file");
        let raw = tokio::fs::read_to_string(&path).await?;
        Ok(raw)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Fetches lexicon documents over HTTP
#[derive(Clone)]
pub struct HttpLexiconSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpLexiconSource {
    const TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: impl Into<String>) -> EngineResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(EngineError::Config(
                "lexicon URL cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| EngineError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    /// Build from the `SLANG_LEXICON_URL` environment variable
    pub fn from_env() -> EngineResult<Self> {
        let base_url = std::env::var("SLANG_LEXICON_URL").map_err(|_| {
            EngineError::Config("SLANG_LEXICON_URL environment variable not set".to_string())
        })?;
        Self::new(base_url)
    }

    fn url_for(&self, version: Option<&str>) -> String {
        format!("{}/{}.json", self.base_url, version.unwrap_or("latest"))
    }
}

impl std::fmt::Debug for HttpLexiconSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLexiconSource")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl LexiconSource for HttpLexiconSource {
    async fn fetch(&self, version: Option<&str>) -> EngineResult<String> {
        let url = self.url_for(version);
        tracing::debug!(%url, "fetching lexicon");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(EngineError::Network(format!(
                "lexicon fetch from {} failed with status {}",
                url, status
            )));
        }

        Ok(response.text().await?)
    }

    fn describe(&self) -> String {
        format!("http:{}", self.base_url)
    }
}

/// An in-memory lexicon document
#[derive(Debug, Clone)]
pub struct StaticLexiconSource {
    name: String,
    document: String,
}

impl StaticLexiconSource {
    pub fn new(name: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            document: document.into(),
        }
    }

    /// The lexicon compiled into the binary
    pub fn bundled() -> Self {
        Self::new("bundled", BUNDLED_LEXICON)
    }
}

#[async_trait]
impl LexiconSource for StaticLexiconSource {
    async fn fetch(&self, _version: Option<&str>) -> EngineResult<String> {
        // Version checks happen in the store
        Ok(self.document.clone())
    }

    fn describe(&self) -> String {
        format!("static:{}", self.name)
    }
}
