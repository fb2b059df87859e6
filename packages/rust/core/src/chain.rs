//! Ordered execution of filter chains.
//!
//! A [`Sequence`] runs two or more stages strictly one after another: a stage
//! starts only once the previous stage's future resolved. A one-stage chain
//! skips the sequence machinery and runs its filter directly ([`Chain::Single`]).

use tracing::{debug, error, trace};

use folio_shared::{FolioError, Result};

use crate::params::ProcessingParams;
use crate::registry::{Filter, FilterRegistry};

// ---------------------------------------------------------------------------
// ChainState
// ---------------------------------------------------------------------------

/// Where a chain is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainState {
    #[default]
    Pending,
    /// Running the stage at this index.
    Running(usize),
    Completed,
    /// The stage at this index returned an error.
    Failed(usize),
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// A resolved filter together with the id it was resolved from.
#[derive(Clone, Copy)]
pub struct Stage<'r> {
    pub id: &'r str,
    pub unit: &'r dyn Filter,
}

impl<'r> Stage<'r> {
    /// Resolve `id` through the registry.
    pub fn resolve(registry: &'r FilterRegistry, id: &str) -> Result<Self> {
        let (id, unit) = registry.get_entry(id)?;
        Ok(Self { id, unit })
    }

    /// Resolve every id in order, failing on the first unknown one.
    pub fn resolve_all(registry: &'r FilterRegistry, ids: &[String]) -> Result<Vec<Self>> {
        ids.iter()
            .map(|id| Self::resolve(registry, id))
            .collect()
    }
}

impl std::fmt::Debug for Stage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Stage").field(&self.id).finish()
    }
}

async fn run_stage(
    index: usize,
    stage: &Stage<'_>,
    params: &mut ProcessingParams,
    state: &mut ChainState,
) -> Result<()> {
    *state = ChainState::Running(index);
    trace!(stage = index, filter = stage.id, "stage started");

    if let Err(e) = stage.unit.apply(params).await {
        *state = ChainState::Failed(index);
        error!(stage = index, filter = stage.id, error = %e, "filter failed");
        return Err(e);
    }

    trace!(stage = index, filter = stage.id, "stage finished");
    Ok(())
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// Two or more stages run back to back.
#[derive(Debug, Clone)]
pub struct Sequence<'r> {
    stages: Vec<Stage<'r>>,
}

impl<'r> Sequence<'r> {
    /// Build a sequence. Fewer than two stages is a contract violation; one
    /// stage belongs on the [`Chain::Single`] path.
    pub fn new(stages: Vec<Stage<'r>>) -> Result<Self> {
        if stages.len() < 2 {
            return Err(FolioError::contract(format!(
                "cannot create a sequence of less than two operations (got {})",
                stages.len()
            )));
        }
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage<'r>] {
        &self.stages
    }

    /// Run every stage in order, stopping at the first error.
    pub async fn run(&self, params: &mut ProcessingParams, state: &mut ChainState) -> Result<()> {
        for (index, stage) in self.stages.iter().enumerate() {
            run_stage(index, stage, params, state).await?;
        }
        *state = ChainState::Completed;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// A resolved, non-empty filter chain.
#[derive(Debug, Clone)]
pub enum Chain<'r> {
    Single(Stage<'r>),
    Sequence(Sequence<'r>),
}

impl<'r> Chain<'r> {
    /// Pick the single-stage path or a [`Sequence`]. An empty chain is a config error.
    pub fn from_stages(mut stages: Vec<Stage<'r>>) -> Result<Self> {
        match stages.len() {
            0 => Err(FolioError::config("a filter chain needs at least one filter")),
            1 => Ok(Self::Single(stages.remove(0))),
            _ => Ok(Self::Sequence(Sequence::new(stages)?)),
        }
    }

    /// Resolve `ids` and build the chain.
    pub fn resolve(registry: &'r FilterRegistry, ids: &[String]) -> Result<Self> {
        Self::from_stages(Stage::resolve_all(registry, ids)?)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Sequence(seq) => seq.stages().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Filter ids in run order.
    pub fn ids(&self) -> Vec<&'r str> {
        match self {
            Self::Single(stage) => vec![stage.id],
            Self::Sequence(seq) => seq.stages().iter().map(|s| s.id).collect(),
        }
    }

    /// Run the chain to completion against `params`.
    pub async fn run(&self, params: &mut ProcessingParams, state: &mut ChainState) -> Result<()> {
        match self {
            Self::Single(stage) => {
                run_stage(0, stage, params, state).await?;
                *state = ChainState::Completed;
            }
            Self::Sequence(seq) => seq.run(params, state).await?,
        }
        debug!(stages = self.len(), "chain completed");
        Ok(())
    }
}
