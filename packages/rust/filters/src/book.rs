//! Output filters writing a single-file HTML book and a JSON manifest.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use folio_core::{Filter, FilterFuture, ProcessingParams};
use folio_shared::{FolioError, Result};

use crate::dom::{self, escape_xml};

/// Path of the artifact `<output_dir>/<file stem>.<ext>`.
pub(crate) fn artifact_path(params: &ProcessingParams, ext: &str) -> PathBuf {
    params
        .paths
        .output_dir
        .join(format!("{}.{ext}", params.spec.file_stem()))
}

pub(crate) async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FolioError::io(parent, e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| FolioError::io(path, e))
}

// ---------------------------------------------------------------------------
// html-book
// ---------------------------------------------------------------------------

/// Writes every chapter into one HTML file with a table of contents.
pub struct HtmlBook;

impl HtmlBook {
    /// Render the book document.
    pub fn render(params: &ProcessingParams) -> Result<String> {
        let spec = &params.spec;
        let chapters = params.finished_chapters()?;
        let title = escape_xml(spec.display_title());

        let mut html = format!(
            "<!DOCTYPE html>\n<html lang=\"{}\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n",
            escape_xml(spec.language.as_deref().unwrap_or("en"))
        );
        html.push_str(&format!("<body>\n<header>\n<h1>{title}</h1>\n"));
        if let Some(creator) = &spec.creator {
            html.push_str(&format!("<p class=\"creator\">{}</p>\n", escape_xml(creator)));
        }
        html.push_str("</header>\n");

        html.push_str("<nav id=\"toc\">\n<ol>\n");
        for chapter in chapters {
            html.push_str(&format!(
                "<li><a href=\"#chapter-{}\">{}</a></li>\n",
                chapter.id(),
                escape_xml(&chapter.title)
            ));
        }
        html.push_str("</ol>\n</nav>\n");

        for chapter in chapters {
            html.push_str(&format!(
                "<section class=\"chapter\" id=\"chapter-{}\">\n<h2>{}</h2>\n{}\n</section>\n",
                chapter.id(),
                escape_xml(&chapter.title),
                dom::body_html(&chapter.dom)
            ));
        }

        html.push_str("</body>\n</html>\n");
        Ok(html)
    }
}

impl Filter for HtmlBook {
    fn apply<'a>(&'a self, params: &'a mut ProcessingParams) -> FilterFuture<'a> {
        Box::pin(async move {
            let html = Self::render(params)?;
            let path = artifact_path(params, "html");
            write_artifact(&path, html.as_bytes()).await?;
            info!(path = %path.display(), bytes = html.len(), "html book written");
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// manifest
// ---------------------------------------------------------------------------

/// JSON summary of a build.
#[derive(Debug, Clone, Serialize)]
pub struct BookManifest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub chapters: Vec<ManifestChapter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestChapter {
    pub id: String,
    pub title: String,
    pub src: String,
    /// Size of the chapter body HTML in bytes.
    pub bytes: usize,
}

impl BookManifest {
    pub fn from_params(params: &ProcessingParams) -> Result<Self> {
        let spec = &params.spec;
        let chapters = params
            .finished_chapters()?
            .iter()
            .map(|c| ManifestChapter {
                id: c.id().to_string(),
                title: c.title.clone(),
                src: c.src.clone(),
                bytes: dom::body_html(&c.dom).len(),
            })
            .collect();

        Ok(Self {
            title: spec.display_title().to_string(),
            creator: spec.creator.clone(),
            language: spec.language.clone(),
            generated_at: Utc::now(),
            chapters,
        })
    }
}

/// Writes `<stem>.json` describing the finished chapters.
pub struct Manifest;

impl Filter for Manifest {
    fn apply<'a>(&'a self, params: &'a mut ProcessingParams) -> FilterFuture<'a> {
        Box::pin(async move {
            let manifest = BookManifest::from_params(params)?;
            let json = serde_json::to_string_pretty(&manifest)
                .map_err(|e| FolioError::Output(format!("failed to serialize manifest: {e}")))?;
            let path = artifact_path(params, "json");
            write_artifact(&path, json.as_bytes()).await?;
            info!(path = %path.display(), chapters = manifest.chapters.len(), "manifest written");
            Ok(())
        })
    }
}
