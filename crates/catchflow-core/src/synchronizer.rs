//! Lock-step advancement bookkeeping for a pipeline's modules.
//!
//! The synchronizer owns the invariants around the scenario step cursor: no
//! rewinding, idempotent re-queries of the current step, and an
//! all-or-nothing end-time check before any module moves.

use crate::errors::{CoupleError, CoupleResult};
use crate::module::Module;

#[derive(Debug, Default)]
pub struct TimeSynchronizer {
    /// Scenario step index the pipeline will process next. Steps
    /// `0..next_index` are complete.
    next_index: usize,
}

impl TimeSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// The range of scenario steps that must run to bring the pipeline to
    /// `t_index`. Empty when `t_index` is already complete (an idempotent
    /// re-query); an error when it lies behind the cursor.
    pub fn steps_to(&self, t_index: usize) -> CoupleResult<std::ops::Range<usize>> {
        if t_index + 1 < self.next_index {
            return Err(CoupleError::TimeStepRewind {
                requested: t_index,
                current: self.next_index - 1,
            });
        }
        Ok(self.next_index..t_index + 1)
    }

    /// Verify that every module can absorb the steps `steps_to(t_index)`
    /// would run. Fails before any module's clock moves, so a violation
    /// leaves the whole pipeline untouched.
    pub fn check_end_times(
        &self,
        modules: &[Module],
        t_index: usize,
        t_delta_s: i64,
    ) -> CoupleResult<()> {
        let steps = (t_index + 1).saturating_sub(self.next_index);
        if steps == 0 {
            return Ok(());
        }
        for module in modules {
            if !module.allow_exceed_end_time() && module.would_exceed_end(steps, t_delta_s) {
                return Err(CoupleError::BeyondEndTime {
                    module: module.name().to_string(),
                    t_index,
                });
            }
        }
        Ok(())
    }

    /// Record that one scenario step finished for every module.
    pub fn mark_step_complete(&mut self) {
        self.next_index += 1;
    }

    /// Whether `t_index` is the step the pipeline most recently completed.
    pub fn is_current(&self, t_index: usize) -> bool {
        t_index + 1 == self.next_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_accumulate_forward() {
        let mut sync = TimeSynchronizer::new();
        assert_eq!(sync.steps_to(2).unwrap(), 0..3);
        for _ in 0..3 {
            sync.mark_step_complete();
        }
        assert_eq!(sync.next_index(), 3);
        assert_eq!(sync.steps_to(4).unwrap(), 3..5);
    }

    #[test]
    fn requery_of_current_step_is_empty() {
        let mut sync = TimeSynchronizer::new();
        sync.mark_step_complete();
        assert!(sync.is_current(0));
        assert_eq!(sync.steps_to(0).unwrap(), 1..1);
    }

    #[test]
    fn rewind_is_rejected() {
        let mut sync = TimeSynchronizer::new();
        for _ in 0..3 {
            sync.mark_step_complete();
        }
        let err = sync.steps_to(1).unwrap_err();
        assert!(matches!(
            err,
            CoupleError::TimeStepRewind {
                requested: 1,
                current: 2
            }
        ));
    }
}
