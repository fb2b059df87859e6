//! Gate between the chapter chains and the output stage.
//!
//! Every chapter chain ends by handing its chapter to [`CompletionBarrier::arrive`].
//! The arrival that brings the count to the total runs the output stage, once,
//! over all finished chapters.

use std::cell::{Cell, RefCell};

use tracing::{debug, info};

use folio_shared::{FolioError, Result};

use crate::chain::{Chain, ChainState};
use crate::params::{Chapter, RunContext};

pub struct CompletionBarrier<'r> {
    total: usize,
    loaded: Cell<usize>,
    fired: Cell<bool>,
    finished: RefCell<Vec<Option<Chapter>>>,
    output: Chain<'r>,
    output_state: Cell<ChainState>,
    context: RunContext,
}

impl<'r> CompletionBarrier<'r> {
    /// A barrier waiting for `total` chapters before running `output`.
    pub fn new(total: usize, output: Chain<'r>, context: RunContext) -> Self {
        Self {
            total,
            loaded: Cell::new(0),
            fired: Cell::new(false),
            finished: RefCell::new((0..total).map(|_| None).collect()),
            output,
            output_state: Cell::new(ChainState::Pending),
            context,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Chapters that have arrived so far.
    pub fn loaded(&self) -> usize {
        self.loaded.get()
    }

    pub fn has_fired(&self) -> bool {
        self.fired.get()
    }

    pub fn output_state(&self) -> ChainState {
        self.output_state.get()
    }

    /// Record a finished chapter; run the output stage if it was the last one.
    ///
    /// Returns whether this arrival fired the output stage.
    pub async fn arrive(&self, chapter: Chapter) -> Result<bool> {
        let Some(chapters) = self.record(chapter)? else {
            return Ok(false);
        };

        info!(chapters = chapters.len(), output = ?self.output.ids(), "all chapters complete, running output stage");

        let mut params = self.context.output_params(chapters);
        let mut state = ChainState::Pending;
        let result = self.output.run(&mut params, &mut state).await;
        self.output_state.set(state);
        result?;

        Ok(true)
    }

    /// Increment and compare with no await in between. Hands back every
    /// finished chapter exactly once, when the count reaches the total.
    fn record(&self, chapter: Chapter) -> Result<Option<Vec<Chapter>>> {
        let index = chapter.index();
        {
            let mut finished = self.finished.borrow_mut();
            let slot = finished.get_mut(index).ok_or_else(|| {
                FolioError::contract(format!(
                    "chapter {index} arrived at a barrier for {} chapters",
                    self.total
                ))
            })?;
            if slot.is_some() {
                return Err(FolioError::contract(format!(
                    "chapter {index} arrived at the barrier twice"
                )));
            }
            *slot = Some(chapter);
        }

        let loaded = self.loaded.get() + 1;
        self.loaded.set(loaded);
        debug!(chapter = index, loaded, total = self.total, "chapter arrived");

        if loaded < self.total || self.fired.get() {
            return Ok(None);
        }

        self.fired.set(true);
        let chapters = self.finished.borrow_mut().drain(..).flatten().collect();
        Ok(Some(chapters))
    }
}
