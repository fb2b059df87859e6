//! The `fetch` filter: load a chapter's `src` into its document.
//!
//! Lookup order: the cache snapshot taken at startup, then the cache entry on
//! disk (written by another chapter of the same group earlier in this run),
//! then the source itself. Remote bodies are written back to the cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use folio_core::{Filter, FilterFuture, ProcessingParams};
use folio_shared::{FetchConfig, FolioError, Result};

use crate::dom;

/// Where a chapter's `src` points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Remote(Url),
    Local(PathBuf),
}

impl Source {
    /// Classify `src`. Relative paths resolve against `root`.
    pub fn parse(src: &str, root: &Path) -> Result<Self> {
        match Url::parse(src) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Remote(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Self::Local)
                .map_err(|()| FolioError::validation(format!("invalid file URL: {src}"))),
            Ok(url) if url.scheme().len() > 1 => Err(FolioError::validation(format!(
                "unsupported source scheme {:?}: {src}",
                url.scheme()
            ))),
            // Relative paths, and Windows drive letters parsed as schemes.
            _ => {
                let path = Path::new(src);
                Ok(Self::Local(if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    root.join(path)
                }))
            }
        }
    }
}

pub struct Fetch {
    client: Client,
}

impl Fetch {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(config.redirect_limit))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FolioError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn download(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| FolioError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FolioError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| FolioError::Network(format!("{url}: body read failed: {e}")))
    }

    #[instrument(skip_all, fields(src = %src))]
    async fn load(&self, params: &ProcessingParams, src: &str) -> Result<String> {
        let entry = params.cache.entry_path(src);
        let cached = params.cache.contains_src(src)
            || tokio::fs::try_exists(&entry)
                .await
                .map_err(|e| FolioError::io(&entry, e))?;
        if cached {
            debug!(entry = %entry.display(), "cache hit");
            return read(&entry).await;
        }

        match Source::parse(src, &params.paths.root)? {
            Source::Remote(url) => {
                let body = self.download(&url).await?;
                tokio::fs::write(&entry, &body)
                    .await
                    .map_err(|e| FolioError::io(&entry, e))?;
                debug!(bytes = body.len(), entry = %entry.display(), "fetched and cached");
                Ok(body)
            }
            Source::Local(path) => read(&path).await,
        }
    }
}

async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FolioError::io(path, e))
}

impl Filter for Fetch {
    fn apply<'a>(&'a self, params: &'a mut ProcessingParams) -> FilterFuture<'a> {
        Box::pin(async move {
            let src = params.chapter()?.src.clone();
            let html = self.load(params, &src).await?;
            let parser = params.parser;
            params.chapter_mut()?.dom = dom::parse_source(&html, parser);
            Ok(())
        })
    }
}
