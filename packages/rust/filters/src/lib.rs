//! Built-in Folio filters and filter definition loading.
//!
//! Chapter filters: `fetch`, `clean`, `unescape`.
//! Output filters: `html-book`, `epub`, `manifest`.
//! Anything in the filters directory (`<id>.toml`) is registered on top.

pub mod book;
pub mod cleanup;
pub mod definitions;
pub mod dom;
pub mod entities;
pub mod epub;
pub mod fetch;

use tracing::debug;

use folio_core::FilterRegistry;
use folio_shared::{AppConfig, Paths, Result};

pub use book::{BookManifest, HtmlBook, Manifest, ManifestChapter};
pub use cleanup::{Clean, Unescape};
pub use definitions::{DefinedFilter, FilterDefinition, load_definitions};
pub use entities::{decode_char_refs, unescape_html};
pub use epub::Epub;
pub use fetch::{Fetch, Source};

/// A registry holding only the built-in filters.
pub fn builtin_registry(config: &AppConfig) -> Result<FilterRegistry> {
    let mut registry = FilterRegistry::new();
    registry.register("fetch", Fetch::new(&config.fetch)?);
    registry.register("clean", Clean);
    registry.register("unescape", Unescape);
    registry.register("html-book", HtmlBook);
    registry.register("epub", Epub);
    registry.register("manifest", Manifest);
    Ok(registry)
}

/// Built-ins plus every definition in the configured filters directory.
pub fn default_registry(config: &AppConfig, paths: &Paths) -> Result<FilterRegistry> {
    let mut registry = builtin_registry(config)?;
    let defined = load_definitions(&mut registry, &paths.filters_dir)?;
    debug!(filters = registry.len(), defined = defined.len(), "filter registry ready");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = builtin_registry(&AppConfig::default()).unwrap();
        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            ["clean", "epub", "fetch", "html-book", "manifest", "unescape"]
        );
    }

    #[test]
    fn definitions_extend_and_override_builtins() {
        let root = std::env::temp_dir().join(format!("folio-registry-{}", Uuid::now_v7()));
        let config = AppConfig::default();
        let paths = Paths::resolve(&config.paths, &root);
        std::fs::create_dir_all(&paths.filters_dir).unwrap();
        std::fs::write(
            paths.filters_dir.join("clean.toml"),
            "kind = \"purge\"\nselectors = [\"aside\"]",
        )
        .unwrap();
        std::fs::write(
            paths.filters_dir.join("article.toml"),
            "kind = \"extract\"\nselector = \"article\"",
        )
        .unwrap();

        let registry = default_registry(&config, &paths).unwrap();
        assert_eq!(registry.len(), 7);
        assert!(registry.contains("article"));

        let _ = std::fs::remove_dir_all(&root);
    }
}
