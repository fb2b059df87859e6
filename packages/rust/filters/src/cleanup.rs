//! Built-in chapter cleanup filters: `clean` and `unescape`.

use std::sync::LazyLock;

use scraper::Selector;
use tracing::trace;

use folio_core::{Filter, FilterFuture, ProcessingParams};

use crate::{dom, entities};

/// Elements that never belong in a book.
const NOISE: &str = "script, style, noscript, iframe";

/// Strips scripts, styles, embedded frames and comments from the chapter.
pub struct Clean;

impl Filter for Clean {
    fn apply<'a>(&'a self, params: &'a mut ProcessingParams) -> FilterFuture<'a> {
        static NOISE_SELECTOR: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse(NOISE).expect("valid selector"));

        Box::pin(async move {
            let chapter = params.chapter_mut()?;
            let elements = dom::purge(&mut chapter.dom, &NOISE_SELECTOR);
            let comments = dom::purge_comments(&mut chapter.dom);
            trace!(chapter = chapter.id(), elements, comments, "cleaned");
            Ok(())
        })
    }
}

/// Decodes leftover (often double-escaped) character references in text.
pub struct Unescape;

impl Filter for Unescape {
    fn apply<'a>(&'a self, params: &'a mut ProcessingParams) -> FilterFuture<'a> {
        Box::pin(async move {
            let chapter = params.chapter_mut()?;
            dom::map_text(&mut chapter.dom, entities::unescape_html);
            Ok(())
        })
    }
}
