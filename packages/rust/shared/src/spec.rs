//! The declarative build spec: chapters, filter chains, and the output stage.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};

// ---------------------------------------------------------------------------
// FilterSpec
// ---------------------------------------------------------------------------

/// A reference to one or more filters, in any of the shapes a spec file allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSpec {
    /// A single filter id.
    Single(String),
    /// An ordered chain of filter ids.
    Chain(Vec<String>),
    /// Named chains; each chapter picks one by name.
    Named(BTreeMap<String, Vec<String>>),
}

impl FilterSpec {
    /// Resolve the chain a chapter should run.
    ///
    /// `chain_name` is the chapter's `filters` field, which is only consulted
    /// (and then required) for [`FilterSpec::Named`].
    pub fn chain_for<'a>(&'a self, chain_name: Option<&str>, chapter: &str) -> Result<&'a [String]> {
        let ids = match self {
            Self::Single(id) => std::slice::from_ref(id),
            Self::Chain(ids) => ids.as_slice(),
            Self::Named(chains) => {
                let name = chain_name.ok_or_else(|| {
                    FolioError::config(format!(
                        "in \"{chapter}\": when a collection of filter chains is specified, \
                         each chapter must name the chain to use"
                    ))
                })?;
                chains.get(name).map(Vec::as_slice).ok_or_else(|| {
                    FolioError::config(format!(
                        "in \"{chapter}\": cannot resolve the filter chain \"{name}\""
                    ))
                })?
            }
        };

        if ids.is_empty() {
            return Err(FolioError::config(format!(
                "in \"{chapter}\": the filter chain is empty"
            )));
        }

        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Spec
// ---------------------------------------------------------------------------

/// One `contents` entry as written in the spec file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDecl {
    /// Chapter title. Required; kept optional here so a missing title is
    /// reported against its chapter instead of as a bare parse error.
    #[serde(default)]
    pub title: Option<String>,

    /// Source locator (URL or local path).
    #[serde(default)]
    pub src: Option<String>,

    /// Chain name, required only when the spec's `filters` is a mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<String>,
}

/// A whole build: chapters in reading order, their filters, and the output stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    /// Book title, used by output filters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Author/creator, used by output filters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,

    /// BCP 47 language tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Artifact file stem (without extension).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    pub contents: Vec<ChapterDecl>,
    pub filters: FilterSpec,
    pub output: FilterSpec,
}

impl Spec {
    /// Check every chapter's required fields and chain, plus the output stage.
    ///
    /// Filter ids are not resolved here; that needs a registry.
    pub fn validate(&self) -> Result<()> {
        if self.contents.is_empty() {
            return Err(FolioError::config("the spec has no chapters in \"contents\""));
        }

        for (index, chapter) in self.contents.iter().enumerate() {
            let title = chapter.title.as_deref().unwrap_or_default();
            if title.trim().is_empty() {
                return Err(FolioError::config(format!(
                    "chapter {index}: each chapter must contain a non-empty \"title\" string"
                )));
            }
            if chapter.src.as_deref().unwrap_or_default().trim().is_empty() {
                return Err(FolioError::config(format!(
                    "in \"{title}\": each chapter must contain a non-empty \"src\" string"
                )));
            }
            self.filters.chain_for(chapter.filters.as_deref(), title)?;
        }

        self.output_chain()?;
        Ok(())
    }

    /// The output stage as an ordered list of ids.
    pub fn output_chain(&self) -> Result<&[String]> {
        match &self.output {
            FilterSpec::Single(id) => Ok(std::slice::from_ref(id)),
            FilterSpec::Chain(ids) if !ids.is_empty() => Ok(ids.as_slice()),
            FilterSpec::Chain(_) => Err(FolioError::config("the output filter list is empty")),
            FilterSpec::Named(_) => Err(FolioError::config(
                "unable to interpret the output filter reference; \
                 it must be either a string or an array of strings",
            )),
        }
    }

    /// Title for display and metadata.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    /// File stem for output artifacts: `filename`, else a slug of the title.
    pub fn file_stem(&self) -> String {
        if let Some(name) = self.filename.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }

        let slug: String = self
            .display_title()
            .chars()
            .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        let slug = slug
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");

        if slug.is_empty() { "book".into() } else { slug }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse and validate a spec from JSON text. `origin` names the source in errors.
pub fn parse_spec(json: &str, origin: &str) -> Result<Spec> {
    let spec: Spec = serde_json::from_str(json)
        .map_err(|e| FolioError::config(format!("failed to parse spec {origin}: {e}")))?;
    spec.validate()?;
    Ok(spec)
}

/// Read, parse, and validate a spec file.
pub fn load_spec(path: &Path) -> Result<Spec> {
    let content = std::fs::read_to_string(path).map_err(|e| FolioError::io(path, e))?;
    let spec = parse_spec(&content, &path.display().to_string())?;

    tracing::debug!(?path, chapters = spec.contents.len(), "spec loaded");
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(json: &str) -> Result<Spec> {
        parse_spec(json, "test.json")
    }

    #[test]
    fn parses_chain_and_single_output() {
        let spec = spec(
            r#"{
                "title": "A Book",
                "contents": [{"title": "One", "src": "http://x/1"}],
                "filters": ["fetch", "clean"],
                "output": "html-book"
            }"#,
        )
        .unwrap();

        assert_eq!(spec.filters, FilterSpec::Chain(vec!["fetch".into(), "clean".into()]));
        assert_eq!(spec.output_chain().unwrap(), ["html-book".to_string()]);
        assert_eq!(spec.file_stem(), "a-book");
    }

    #[test]
    fn named_chains_require_a_chain_name() {
        let err = spec(
            r#"{
                "contents": [{"title": "One", "src": "a"}],
                "filters": {"web": ["fetch"]},
                "output": ["epub"]
            }"#,
        )
        .unwrap_err();

        assert!(err.is_config());
        assert!(err.to_string().contains("\"One\""));
    }

    #[test]
    fn named_chain_must_exist() {
        let err = spec(
            r#"{
                "contents": [{"title": "One", "src": "a", "filters": "local"}],
                "filters": {"web": ["fetch"]},
                "output": "epub"
            }"#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("cannot resolve the filter chain \"local\""));
    }

    #[test]
    fn missing_title_or_src_is_rejected() {
        let err = spec(r#"{"contents": [{"src": "a"}], "filters": ["f"], "output": "o"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("chapter 0"));

        let err = spec(r#"{"contents": [{"title": "T", "src": ""}], "filters": ["f"], "output": "o"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("\"src\""));
    }

    #[test]
    fn named_output_is_rejected() {
        let err = spec(
            r#"{"contents": [{"title": "T", "src": "a"}], "filters": "f", "output": {"x": ["o"]}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("output filter reference"));
    }

    #[test]
    fn empty_contents_and_chains_are_rejected() {
        assert!(spec(r#"{"contents": [], "filters": ["f"], "output": "o"}"#).is_err());
        assert!(spec(r#"{"contents": [{"title": "T", "src": "a"}], "filters": [], "output": "o"}"#).is_err());
        assert!(spec(r#"{"contents": [{"title": "T", "src": "a"}], "filters": "f", "output": []}"#).is_err());
    }

    #[test]
    fn file_stem_prefers_explicit_filename() {
        let mut spec = spec(r#"{"contents": [{"title": "T", "src": "a"}], "filters": "f", "output": "o"}"#).unwrap();
        assert_eq!(spec.file_stem(), "untitled");

        spec.filename = Some("my-novel".into());
        assert_eq!(spec.file_stem(), "my-novel");
    }
}
