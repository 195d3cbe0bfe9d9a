//! Time-weighted resampling from a source's native step to an arbitrary
//! query span.

use crate::errors::{CoupleError, CoupleResult};
use crate::provider::ResampleMethod;
use crate::time::EpochSeconds;

/// Raw sample access the resampler walks over. Implemented by the concrete
/// providers; `sample` goes through their slice caches.
pub(crate) trait RawSamples {
    fn series_start(&self) -> EpochSeconds;
    fn series_step_s(&self) -> i64;
    fn series_len(&self) -> usize;
    fn sample(&self, entity_id: &str, variable: &str, index: usize) -> CoupleResult<f64>;
}

/// Resample a variable over `[init_time, init_time + duration_s)`.
///
/// Each overlapped native step contributes its seconds of overlap with the
/// query span. Summed quantities are weighted by `overlap / step` so partial
/// steps contribute a proportional share of the step total; instantaneous
/// quantities are weighted by `overlap / duration`, yielding a time-weighted
/// mean directly. A summed accumulation queried as [`ResampleMethod::Mean`]
/// is rescaled by `step / duration` afterwards.
///
/// Walking past the last sample holds the final value: the caller still gets
/// an answer for queries starting up to one native step beyond the data.
pub(crate) fn time_weighted(
    src: &dyn RawSamples,
    variable: &str,
    entity_id: &str,
    summed: bool,
    init_time: EpochSeconds,
    duration_s: i64,
    method: ResampleMethod,
) -> CoupleResult<f64> {
    let start = src.series_start();
    let step = src.series_step_s();
    let len = src.series_len();
    let stop = start + (len as i64) * step;

    if duration_s <= 0 {
        return Err(CoupleError::Config(format!(
            "selector duration must be positive, got {duration_s}"
        )));
    }
    if len == 0 || init_time < start || init_time >= stop + step {
        return Err(CoupleError::TimeOutOfRange {
            time: init_time,
            start,
            stop,
        });
    }

    let mut index = ((init_time - start) / step) as usize;
    let step_f = step as f64;
    let duration_f = duration_s as f64;

    let mut remaining = duration_s;
    // Seconds of the first native step inside the query span.
    let first_step_start = start + (index as i64) * step;
    let mut involved = (step - (init_time - first_step_start)).min(remaining);

    let mut accumulated = 0.0;
    loop {
        if index >= len {
            // Walked off the end of the data: hold the last sample.
            return src.sample(entity_id, variable, len - 1);
        }
        let value = src.sample(entity_id, variable, index)?;
        if summed {
            accumulated += value * involved as f64 / step_f;
        } else {
            accumulated += value * involved as f64 / duration_f;
        }
        remaining -= involved;
        if remaining <= 0 {
            break;
        }
        index += 1;
        involved = remaining.min(step);
    }

    if method == ResampleMethod::Mean && summed {
        accumulated *= step_f / duration_f;
    }
    Ok(accumulated)
}
