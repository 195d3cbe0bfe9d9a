//! Time-indexed data access.
//!
//! Every data source a module can pull from implements
//! [`TimeIndexedDataProvider`]: tabular (per-entity column) sources, gridded
//! multi-entity sources, and the pipeline itself, which republishes module
//! outputs. Values are queried with a [`Selector`] and resampled from the
//! source's native step to the query span by time-weighted averaging.
//!
//! [`Selector`]: crate::selector::Selector

pub(crate) mod cache;
pub mod gridded;
pub mod registry;
pub(crate) mod resample;
pub mod tabular;

pub use gridded::{GriddedDataProvider, GriddedField};
pub use registry::ProviderRegistry;
pub use tabular::{TabularColumn, TabularDataProvider};

use crate::errors::{CoupleError, CoupleResult};
use crate::selector::Selector;
use crate::time::EpochSeconds;

/// How a resampled value over a query span should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleMethod {
    /// Total over the span (summed quantities accumulate across steps).
    Sum,
    /// Time-weighted mean over the span.
    Mean,
}

/// A source of scalar time series addressable by canonical variable name.
///
/// Sources expose a regular native step: samples sit at
/// `start_time + i * step_seconds` for `i` in `0..n`, with `stop_time`
/// exclusive at `start_time + n * step_seconds`. Queries starting within one
/// step past `stop_time` are served by holding the final sample.
pub trait TimeIndexedDataProvider: Send + Sync {
    /// Every name this source can answer queries for, canonical and raw
    /// spellings included.
    fn available_variables(&self) -> Vec<String>;

    fn start_time(&self) -> EpochSeconds;

    /// Exclusive end of the data: `start_time + n * step_seconds`.
    fn stop_time(&self) -> EpochSeconds;

    fn step_seconds(&self) -> i64;

    /// Index of the native step containing `time`.
    ///
    /// Times in `[stop_time, stop_time + step)` are accepted and resolve to
    /// the (out-of-data) index `n`; the resampler holds the last sample for
    /// them. Anything earlier than `start_time` or later is a range error.
    fn index_for_time(&self, time: EpochSeconds) -> CoupleResult<usize> {
        let start = self.start_time();
        let stop = self.stop_time();
        let step = self.step_seconds();
        if time < start || time >= stop + step {
            return Err(CoupleError::TimeOutOfRange {
                time,
                start,
                stop,
            });
        }
        Ok(((time - start) / step) as usize)
    }

    /// Whether the variable is a sum over the native step rather than an
    /// instantaneous sample.
    fn is_summed_over_step(&self, variable: &str) -> bool;

    /// Single resampled value over the selector's span, in the selector's
    /// output units.
    fn get_value(&self, selector: &Selector, method: ResampleMethod) -> CoupleResult<f64>;

    /// Raw per-step samples covering the selector's span, in the selector's
    /// output units.
    fn get_values(&self, selector: &Selector) -> CoupleResult<Vec<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct FixedRange;

    impl TimeIndexedDataProvider for FixedRange {
        fn available_variables(&self) -> Vec<String> {
            vec!["x".to_string()]
        }
        fn start_time(&self) -> EpochSeconds {
            1000
        }
        fn stop_time(&self) -> EpochSeconds {
            1000 + 10 * 60
        }
        fn step_seconds(&self) -> i64 {
            60
        }
        fn is_summed_over_step(&self, _variable: &str) -> bool {
            false
        }
        fn get_value(&self, _selector: &Selector, _method: ResampleMethod) -> CoupleResult<f64> {
            unimplemented!()
        }
        fn get_values(&self, _selector: &Selector) -> CoupleResult<Vec<f64>> {
            unimplemented!()
        }
    }

    #[test]
    fn index_for_time_default_impl() {
        let p: Arc<dyn TimeIndexedDataProvider> = Arc::new(FixedRange);
        assert_eq!(p.index_for_time(1000).unwrap(), 0);
        assert_eq!(p.index_for_time(1059).unwrap(), 0);
        assert_eq!(p.index_for_time(1060).unwrap(), 1);
        // Hold-last window: one native step past the end resolves to index n.
        assert_eq!(p.index_for_time(1600).unwrap(), 10);
        assert!(p.index_for_time(999).is_err());
        assert!(p.index_for_time(1660).is_err());
    }
}
