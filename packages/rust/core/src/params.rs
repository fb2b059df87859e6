//! Per-chain execution context handed to every filter.

use std::sync::Arc;

use scraper::Html;

use folio_shared::{FolioError, ParserConfig, Paths, Result, Spec};

use crate::cache::ContentCache;

// ---------------------------------------------------------------------------
// Chapter
// ---------------------------------------------------------------------------

/// A chapter being built: its spec fields plus the document filters work on.
#[derive(Debug)]
pub struct Chapter {
    index: usize,
    id: String,
    pub title: String,
    pub src: String,
    /// Chain name from the spec, if any.
    pub filters: Option<String>,
    /// The chapter document. Starts empty; filters replace or mutate it.
    pub dom: Html,
}

impl Chapter {
    /// Create a chapter at spec position `index` with an empty document.
    pub fn new(
        index: usize,
        title: impl Into<String>,
        src: impl Into<String>,
        filters: Option<String>,
    ) -> Self {
        Self {
            index,
            id: index.to_string(),
            title: title.into(),
            src: src.into(),
            filters,
            dom: Html::new_document(),
        }
    }

    /// Sequential id assigned at scheduling time.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Position in the spec's `contents`.
    pub fn index(&self) -> usize {
        self.index
    }
}

// ---------------------------------------------------------------------------
// RunContext / ProcessingParams
// ---------------------------------------------------------------------------

/// Everything a run shares between its chains.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub spec: Arc<Spec>,
    pub cache: Arc<ContentCache>,
    pub paths: Arc<Paths>,
    pub parser: ParserConfig,
}

impl RunContext {
    /// Params for one chapter's chain. The chain owns the chapter until it completes.
    pub fn chapter_params(&self, chapter: Chapter) -> ProcessingParams {
        ProcessingParams {
            spec: self.spec.clone(),
            chapter: Some(chapter),
            chapters: Vec::new(),
            cache: self.cache.clone(),
            paths: self.paths.clone(),
            parser: self.parser,
        }
    }

    /// Params for the output stage: no current chapter, every finished chapter in spec order.
    pub fn output_params(&self, chapters: Vec<Chapter>) -> ProcessingParams {
        ProcessingParams {
            spec: self.spec.clone(),
            chapter: None,
            chapters,
            cache: self.cache.clone(),
            paths: self.paths.clone(),
            parser: self.parser,
        }
    }
}

/// The context a filter receives.
///
/// Chapter chains get `chapter: Some(..)` and an empty `chapters`; the output
/// stage gets `chapter: None` and all finished chapters.
#[derive(Debug)]
pub struct ProcessingParams {
    pub spec: Arc<Spec>,
    pub chapter: Option<Chapter>,
    pub chapters: Vec<Chapter>,
    pub cache: Arc<ContentCache>,
    pub paths: Arc<Paths>,
    pub parser: ParserConfig,
}

impl ProcessingParams {
    /// Whether these params belong to the output stage.
    pub fn is_output_stage(&self) -> bool {
        self.chapter.is_none()
    }

    /// The chapter this chain is building; an error in the output stage.
    pub fn chapter(&self) -> Result<&Chapter> {
        self.chapter
            .as_ref()
            .ok_or_else(|| FolioError::contract("this filter only runs in a chapter chain"))
    }

    /// Mutable access to the chapter this chain is building.
    pub fn chapter_mut(&mut self) -> Result<&mut Chapter> {
        self.chapter
            .as_mut()
            .ok_or_else(|| FolioError::contract("this filter only runs in a chapter chain"))
    }

    /// Finished chapters; an error outside the output stage.
    pub fn finished_chapters(&self) -> Result<&[Chapter]> {
        if self.is_output_stage() {
            Ok(&self.chapters)
        } else {
            Err(FolioError::contract("this filter only runs in the output stage"))
        }
    }

    /// Move the chapter out once its chain is done.
    pub(crate) fn take_chapter(&mut self) -> Result<Chapter> {
        self.chapter
            .take()
            .ok_or_else(|| FolioError::contract("chapter already released"))
    }
}
