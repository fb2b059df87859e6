//! Filters declared as TOML files in the filters directory.
//!
//! `filters/<id>.toml` registers a filter named `<id>`:
//!
//! ```toml
//! kind = "extract"
//! selector = "article.post"
//! ```
//!
//! Kinds: `extract` (keep the first match), `purge` (drop all matches) and
//! `replace` (regex over the serialized chapter).

use std::path::Path;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, trace};

use folio_core::{Filter, FilterFuture, FilterRegistry, ProcessingParams};
use folio_shared::{FolioError, Result};

use crate::dom;

/// The on-disk shape of a filter definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FilterDefinition {
    Extract { selector: String },
    Purge { selectors: Vec<String> },
    Replace { pattern: String, replacement: String },
}

impl FilterDefinition {
    /// Parse a definition from TOML text. `origin` names the source in errors.
    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| FolioError::config(format!("invalid filter definition {origin}: {e}")))
    }

    /// Compile selectors and patterns into a runnable filter.
    pub fn compile(&self) -> Result<DefinedFilter> {
        Ok(match self {
            Self::Extract { selector } => DefinedFilter::Extract {
                css: selector.clone(),
                selector: dom::selector(selector)?,
            },
            Self::Purge { selectors } => {
                if selectors.is_empty() {
                    return Err(FolioError::config("a purge filter needs at least one selector"));
                }
                DefinedFilter::Purge(
                    selectors
                        .iter()
                        .map(|s| dom::selector(s))
                        .collect::<Result<_>>()?,
                )
            }
            Self::Replace {
                pattern,
                replacement,
            } => DefinedFilter::Replace {
                pattern: Regex::new(pattern)
                    .map_err(|e| FolioError::config(format!("invalid pattern {pattern:?}: {e}")))?,
                replacement: replacement.clone(),
            },
        })
    }
}

/// A compiled [`FilterDefinition`].
#[derive(Debug)]
pub enum DefinedFilter {
    Extract { css: String, selector: Selector },
    Purge(Vec<Selector>),
    Replace { pattern: Regex, replacement: String },
}

impl Filter for DefinedFilter {
    fn apply<'a>(&'a self, params: &'a mut ProcessingParams) -> FilterFuture<'a> {
        Box::pin(async move {
            let chapter = params.chapter_mut()?;
            match self {
                Self::Extract { css, selector } => {
                    let inner = chapter
                        .dom
                        .select(selector)
                        .next()
                        .map(|el| el.inner_html())
                        .ok_or_else(|| {
                            FolioError::parse(format!(
                                "selector {css:?} matched nothing in chapter {:?}",
                                chapter.title
                            ))
                        })?;
                    chapter.dom = Html::parse_document(&inner);
                }
                Self::Purge(selectors) => {
                    let removed: usize = selectors
                        .iter()
                        .map(|s| dom::purge(&mut chapter.dom, s))
                        .sum();
                    trace!(chapter = chapter.id(), removed, "purged");
                }
                Self::Replace {
                    pattern,
                    replacement,
                } => {
                    let html = chapter.dom.html();
                    let replaced = pattern.replace_all(&html, replacement.as_str());
                    chapter.dom = Html::parse_document(&replaced);
                }
            }
            Ok(())
        })
    }
}

/// Register every `*.toml` definition in `dir`, in file-name order.
///
/// Definitions override built-ins with the same id. A missing directory
/// registers nothing. Returns the registered ids.
pub fn load_definitions(registry: &mut FilterRegistry, dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        debug!(dir = %dir.display(), "no filters directory");
        return Ok(Vec::new());
    }

    let mut files: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| FolioError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    files.sort();

    let mut ids = Vec::with_capacity(files.len());
    for path in files {
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let text = std::fs::read_to_string(&path).map_err(|e| FolioError::io(&path, e))?;
        let filter = FilterDefinition::parse(&text, &path.display().to_string())?.compile()?;

        registry.register(id, filter);
        ids.push(id.to_string());
    }

    info!(dir = %dir.display(), count = ids.len(), "filter definitions loaded");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use folio_core::{Chapter, ContentCache, RunContext};
    use folio_shared::{ParserConfig, Paths, PathsConfig, parse_spec};
    use uuid::Uuid;

    use super::*;

    fn params(source: &str) -> ProcessingParams {
        let spec = parse_spec(
            r#"{"contents": [{"title": "Intro", "src": "s"}], "filters": "f", "output": "x"}"#,
            "test",
        )
        .unwrap();
        let context = RunContext {
            spec: Arc::new(spec),
            cache: Arc::new(ContentCache::default()),
            paths: Arc::new(Paths::resolve(&PathsConfig::default(), Path::new("."))),
            parser: ParserConfig::default(),
        };
        let mut chapter = Chapter::new(0, "Intro", "s", None);
        chapter.dom = Html::parse_document(source);
        context.chapter_params(chapter)
    }

    fn body(params: &ProcessingParams) -> String {
        dom::body_html(&params.chapter().unwrap().dom)
    }

    #[test]
    fn parses_each_kind() {
        assert_eq!(
            FilterDefinition::parse("kind = \"extract\"\nselector = \"main\"", "t").unwrap(),
            FilterDefinition::Extract {
                selector: "main".into()
            }
        );
        assert!(matches!(
            FilterDefinition::parse("kind = \"purge\"\nselectors = [\"nav\", \".ad\"]", "t").unwrap(),
            FilterDefinition::Purge { selectors } if selectors.len() == 2
        ));
        assert!(matches!(
            FilterDefinition::parse("kind = \"replace\"\npattern = \"a\"\nreplacement = \"b\"", "t")
                .unwrap(),
            FilterDefinition::Replace { .. }
        ));
    }

    #[test]
    fn bad_definitions_are_config_errors() {
        assert!(FilterDefinition::parse("kind = \"teleport\"", "t").unwrap_err().is_config());
        assert!(FilterDefinition::parse("kind = \"extract\"", "t").unwrap_err().is_config());

        let bad_selector = FilterDefinition::Extract {
            selector: "div[".into(),
        };
        assert!(bad_selector.compile().unwrap_err().is_config());

        let bad_pattern = FilterDefinition::Replace {
            pattern: "(".into(),
            replacement: String::new(),
        };
        assert!(bad_pattern.compile().unwrap_err().is_config());

        let no_selectors = FilterDefinition::Purge { selectors: vec![] };
        assert!(no_selectors.compile().unwrap_err().is_config());
    }

    #[tokio::test]
    async fn extract_keeps_first_match() {
        let filter = FilterDefinition::Extract {
            selector: "article".into(),
        }
        .compile()
        .unwrap();
        let mut params = params("<nav>menu</nav><article><p>one</p></article><article>two</article>");
        filter.apply(&mut params).await.unwrap();
        assert_eq!(body(&params), "<p>one</p>");
    }

    #[tokio::test]
    async fn extract_without_match_fails() {
        let filter = FilterDefinition::Extract {
            selector: "article".into(),
        }
        .compile()
        .unwrap();
        let mut params = params("<p>no article here</p>");
        let err = filter.apply(&mut params).await.unwrap_err();
        assert!(matches!(err, FolioError::Parse { .. }));
        assert!(err.to_string().contains("Intro"));
    }

    #[tokio::test]
    async fn purge_and_replace_rewrite_the_document() {
        let purge = FilterDefinition::Purge {
            selectors: vec!["nav".into(), ".ad".into()],
        }
        .compile()
        .unwrap();
        let replace = FilterDefinition::Replace {
            pattern: "colour".into(),
            replacement: "color".into(),
        }
        .compile()
        .unwrap();

        let mut params = params(r#"<nav>x</nav><p>colour</p><div class="ad">buy</div>"#);
        purge.apply(&mut params).await.unwrap();
        replace.apply(&mut params).await.unwrap();
        assert_eq!(body(&params), "<p>color</p>");
    }

    #[test]
    fn loads_definitions_from_directory() {
        let dir = std::env::temp_dir().join(format!("folio-defs-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("main.toml"), "kind = \"extract\"\nselector = \"main\"").unwrap();
        std::fs::write(dir.join("ads.toml"), "kind = \"purge\"\nselectors = [\".ad\"]").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut registry = FilterRegistry::new();
        let ids = load_definitions(&mut registry, &dir).unwrap();
        assert_eq!(ids, ["ads", "main"]);
        assert!(registry.contains("main"));

        std::fs::write(dir.join("broken.toml"), "kind = 3").unwrap();
        let err = load_definitions(&mut FilterRegistry::new(), &dir).unwrap_err();
        assert!(err.is_config());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_registers_nothing() {
        let dir = std::env::temp_dir().join(format!("folio-defs-missing-{}", Uuid::now_v7()));
        let mut registry = FilterRegistry::new();
        assert!(load_definitions(&mut registry, &dir).unwrap().is_empty());
        assert!(registry.is_empty());
    }
}
