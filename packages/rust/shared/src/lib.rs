//! Shared types, error model, and configuration for Folio.
//!
//! This crate is the foundation depended on by all other Folio crates.
//! It provides:
//! - [`FolioError`]: the unified error type
//! - Spec types ([`Spec`], [`ChapterDecl`], [`FilterSpec`]) and spec loading
//! - Configuration ([`AppConfig`], [`Paths`], config loading)

pub mod config;
pub mod error;
pub mod spec;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, FetchConfig, ParserConfig, Paths, PathsConfig, init_config,
    load_config, load_config_from,
};
pub use error::{FolioError, Result};
pub use spec::{ChapterDecl, FilterSpec, Spec, load_spec, parse_spec};
