//! Scheduling and sequencing engine for Folio builds.
//!
//! This crate resolves a spec's filter chains through the [`FilterRegistry`],
//! groups chapters by source ([`SourceScheduler`]), runs each chapter's chain
//! ([`Chain`]), and gates the output stage behind the [`CompletionBarrier`].
//! It never touches HTML, the network, or output files itself: filters do.

pub mod barrier;
pub mod cache;
pub mod chain;
pub mod engine;
pub mod params;
pub mod registry;
pub mod scheduler;
pub mod workspace;

pub use barrier::CompletionBarrier;
pub use cache::{ContentCache, cache_key};
pub use chain::{Chain, ChainState, Sequence, Stage};
pub use engine::{ChapterJob, ChapterOutcome, Engine, RunPlan, RunReport};
pub use params::{Chapter, ProcessingParams, RunContext};
pub use registry::{Filter, FilterFuture, FilterRegistry};
pub use scheduler::{SourceGroup, SourceScheduler};
