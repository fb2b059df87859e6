//! End-to-end build run: spec → plan → grouped chapter chains → output stage.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::future::try_join_all;
use futures::stream::FuturesUnordered;
use tracing::{debug, info, instrument};

use folio_shared::{ParserConfig, Paths, Result, Spec};

use crate::barrier::CompletionBarrier;
use crate::cache::ContentCache;
use crate::chain::{Chain, ChainState};
use crate::params::{Chapter, RunContext};
use crate::registry::FilterRegistry;
use crate::scheduler::{SourceGroup, SourceScheduler};

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A chapter with its resolved chain, ready to run.
#[derive(Debug)]
pub struct ChapterJob<'r> {
    pub chapter: Chapter,
    pub chain: Chain<'r>,
}

/// Every chain of a run, resolved up front.
#[derive(Debug)]
pub struct RunPlan<'r> {
    pub jobs: Vec<ChapterJob<'r>>,
    pub output: Chain<'r>,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// How one chapter's chain ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterOutcome {
    pub index: usize,
    pub id: String,
    pub title: String,
    pub state: ChainState,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Per-chapter outcomes in spec order.
    pub chapters: Vec<ChapterOutcome>,
    /// Number of distinct sources.
    pub groups: usize,
    /// Chapters counted by the barrier.
    pub loaded: usize,
    /// Whether the output stage ran.
    pub output_fired: bool,
    pub output_state: ChainState,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Runs specs against a filter registry.
pub struct Engine<'r> {
    registry: &'r FilterRegistry,
    cache: Arc<ContentCache>,
    paths: Arc<Paths>,
    parser: ParserConfig,
}

impl<'r> Engine<'r> {
    pub fn new(
        registry: &'r FilterRegistry,
        cache: ContentCache,
        paths: Paths,
        parser: ParserConfig,
    ) -> Self {
        Self {
            registry,
            cache: Arc::new(cache),
            paths: Arc::new(paths),
            parser,
        }
    }

    pub fn registry(&self) -> &'r FilterRegistry {
        self.registry
    }

    /// Validate `spec` and resolve every chain, output stage included.
    ///
    /// Nothing runs here, so any configuration error aborts before the first filter.
    pub fn plan(&self, spec: &Spec) -> Result<RunPlan<'r>> {
        spec.validate()?;

        let mut jobs = Vec::with_capacity(spec.contents.len());
        for (index, decl) in spec.contents.iter().enumerate() {
            let title = decl.title.clone().unwrap_or_default();
            let src = decl.src.clone().unwrap_or_default();
            let ids = spec.filters.chain_for(decl.filters.as_deref(), &title)?;

            let chain = self.resolve(ids)?;
            debug!(chapter = index, %src, chain = ?chain.ids(), "chapter planned");

            jobs.push(ChapterJob {
                chapter: Chapter::new(index, title, src, decl.filters.clone()),
                chain,
            });
        }

        let output = self.resolve(spec.output_chain()?)?;

        Ok(RunPlan { jobs, output })
    }

    fn resolve(&self, ids: &[String]) -> Result<Chain<'r>> {
        Chain::resolve(self.registry, ids)
    }

    /// Run `spec` to completion.
    ///
    /// Group leaders start together in spec order; followers start once their
    /// leader has reached the barrier. The first error from any chain ends the
    /// run and drops every chain still in flight.
    #[instrument(skip_all, fields(title = spec.display_title(), chapters = spec.contents.len()))]
    pub async fn run(&self, spec: Spec) -> Result<RunReport> {
        let start = Instant::now();
        let plan = self.plan(&spec)?;

        let context = RunContext {
            spec: Arc::new(spec),
            cache: self.cache.clone(),
            paths: self.paths.clone(),
            parser: self.parser,
        };

        let total = plan.jobs.len();
        let barrier = CompletionBarrier::new(total, plan.output, context.clone());
        let groups = SourceScheduler::schedule(plan.jobs, |job| job.chapter.src.as_str());
        let group_count = groups.len();

        info!(chapters = total, sources = group_count, "starting run");

        let mut in_flight: FuturesUnordered<_> = groups
            .into_iter()
            .map(|group| self.run_group(group, &barrier, &context))
            .collect();

        let mut chapters = Vec::with_capacity(total);
        while let Some(outcomes) = in_flight.next().await {
            chapters.extend(outcomes?);
        }
        drop(in_flight);

        chapters.sort_by_key(|c: &ChapterOutcome| c.index);

        let report = RunReport {
            chapters,
            groups: group_count,
            loaded: barrier.loaded(),
            output_fired: barrier.has_fired(),
            output_state: barrier.output_state(),
            elapsed: start.elapsed(),
        };

        info!(
            loaded = report.loaded,
            output_fired = report.output_fired,
            elapsed_ms = report.elapsed.as_millis(),
            "run complete"
        );

        Ok(report)
    }

    /// Run one source group: the leader first, then its followers together.
    async fn run_group(
        &self,
        group: SourceGroup<ChapterJob<'r>>,
        barrier: &CompletionBarrier<'r>,
        context: &RunContext,
    ) -> Result<Vec<ChapterOutcome>> {
        let src = group.src.clone();
        let Some((leader, followers)) = group.into_leader() else {
            return Ok(Vec::new());
        };

        let mut outcomes = vec![self.run_chapter(leader, barrier, context).await?];

        if !followers.is_empty() {
            debug!(%src, followers = followers.len(), "leader done, releasing followers");
            let rest = try_join_all(
                followers
                    .into_iter()
                    .map(|job| self.run_chapter(job, barrier, context)),
            )
            .await?;
            outcomes.extend(rest);
        }

        Ok(outcomes)
    }

    #[instrument(skip_all, fields(chapter = job.chapter.id(), src = %job.chapter.src))]
    async fn run_chapter(
        &self,
        job: ChapterJob<'r>,
        barrier: &CompletionBarrier<'r>,
        context: &RunContext,
    ) -> Result<ChapterOutcome> {
        let ChapterJob { chapter, chain } = job;
        let index = chapter.index();
        let id = chapter.id().to_string();
        let title = chapter.title.clone();

        debug!(stages = chain.len(), "chapter chain started");

        let mut params = context.chapter_params(chapter);
        let mut state = ChainState::Pending;
        chain.run(&mut params, &mut state).await?;

        barrier.arrive(params.take_chapter()?).await?;

        Ok(ChapterOutcome {
            index,
            id,
            title,
            state,
        })
    }
}
