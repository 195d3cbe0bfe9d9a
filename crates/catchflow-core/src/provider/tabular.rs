//! In-memory tabular (single-entity) data source.
//!
//! The shape of a per-catchment forcing table: one regular time axis and a
//! set of named columns. Well-known raw column names are mapped onto the
//! canonical vocabulary in [`standard_names`] and both spellings answer
//! queries.
//!
//! [`standard_names`]: crate::standard_names

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use ndarray::{s, Array1};
use tracing::warn;

use crate::errors::{CoupleError, CoupleResult};
use crate::provider::cache::{SliceCache, SliceKey, DEFAULT_SLICE_CAPACITY};
use crate::provider::resample::{self, RawSamples};
use crate::provider::{ResampleMethod, TimeIndexedDataProvider};
use crate::selector::Selector;
use crate::standard_names;
use crate::time::EpochSeconds;
use crate::units::{StandardUnitConverter, UnitConverter};

/// Samples read from backing storage this many at a time.
const CHUNK_LEN: usize = 64;

/// One named column of samples with its native units.
#[derive(Debug, Clone)]
pub struct TabularColumn {
    pub name: String,
    pub units: String,
    pub values: Array1<f64>,
}

impl TabularColumn {
    pub fn new(name: impl Into<String>, units: impl Into<String>, values: Array1<f64>) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            values,
        }
    }
}

pub struct TabularDataProvider {
    start: EpochSeconds,
    step_s: i64,
    len: usize,
    // Keyed by canonical name.
    columns: HashMap<String, Array1<f64>>,
    units: HashMap<String, String>,
    // Every answerable spelling -> canonical name.
    aliases: HashMap<String, String>,
    available: Vec<String>,
    converter: Arc<dyn UnitConverter>,
    cache: Mutex<SliceCache>,
    storage_reads: AtomicUsize,
}

impl TabularDataProvider {
    pub fn new(
        start: EpochSeconds,
        step_s: i64,
        columns: Vec<TabularColumn>,
    ) -> CoupleResult<Self> {
        if step_s <= 0 {
            return Err(CoupleError::Config(format!(
                "tabular source step must be positive, got {step_s}"
            )));
        }
        if columns.is_empty() {
            return Err(CoupleError::Config(
                "tabular source requires at least one column".to_string(),
            ));
        }

        let len = columns[0].values.len();
        if len == 0 {
            return Err(CoupleError::Config(
                "tabular source columns must not be empty".to_string(),
            ));
        }

        let mut provider = Self {
            start,
            step_s,
            len,
            columns: HashMap::new(),
            units: HashMap::new(),
            aliases: HashMap::new(),
            available: Vec::new(),
            converter: StandardUnitConverter::shared(),
            cache: Mutex::new(SliceCache::new(DEFAULT_SLICE_CAPACITY)),
            storage_reads: AtomicUsize::new(0),
        };

        for column in columns {
            if column.values.len() != len {
                return Err(CoupleError::Config(format!(
                    "column '{}' has {} samples but the source has {}",
                    column.name,
                    column.values.len(),
                    len
                )));
            }
            let canonical = standard_names::canonical_for(&column.name)
                .unwrap_or(&column.name)
                .to_string();
            if provider.columns.contains_key(&canonical) {
                return Err(CoupleError::Config(format!(
                    "duplicate column for canonical name '{canonical}'"
                )));
            }
            let units = if column.units.is_empty() {
                standard_names::well_known_units(&column.name)
                    .unwrap_or("")
                    .to_string()
            } else {
                column.units.clone()
            };
            provider.units.insert(canonical.clone(), units);
            provider
                .aliases
                .insert(canonical.clone(), canonical.clone());
            provider.available.push(canonical.clone());
            if column.name != canonical {
                provider
                    .aliases
                    .insert(column.name.clone(), canonical.clone());
                provider.available.push(column.name.clone());
            }
            provider.columns.insert(canonical, column.values);
        }
        Ok(provider)
    }

    pub fn with_converter(mut self, converter: Arc<dyn UnitConverter>) -> Self {
        self.converter = converter;
        self
    }

    fn canonical(&self, name: &str) -> CoupleResult<&str> {
        self.aliases
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| CoupleError::UnknownVariable(name.to_string()))
    }

    fn cache_guard(&self) -> MutexGuard<'_, SliceCache> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read_chunk(&self, variable: &str, chunk_start: usize) -> CoupleResult<Arc<Vec<f64>>> {
        self.storage_reads.fetch_add(1, Ordering::Relaxed);
        let column = self
            .columns
            .get(variable)
            .ok_or_else(|| CoupleError::UnknownVariable(variable.to_string()))?;
        let end = (chunk_start + CHUNK_LEN).min(self.len);
        Ok(Arc::new(column.slice(s![chunk_start..end]).to_vec()))
    }

    fn convert_or_warn(&self, variable: &str, value: f64, from: &str, to: &str) -> f64 {
        match self.converter.convert(value, from, to) {
            Ok(converted) => converted,
            Err(err) => {
                warn!(
                    variable = variable,
                    from = from,
                    to = to,
                    error = %err,
                    "unit conversion failed, returning value unconverted"
                );
                value
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn storage_read_count(&self) -> usize {
        self.storage_reads.load(Ordering::Relaxed)
    }
}

impl RawSamples for TabularDataProvider {
    fn series_start(&self) -> EpochSeconds {
        self.start
    }

    fn series_step_s(&self) -> i64 {
        self.step_s
    }

    fn series_len(&self) -> usize {
        self.len
    }

    fn sample(&self, _entity_id: &str, variable: &str, index: usize) -> CoupleResult<f64> {
        let chunk_start = index - index % CHUNK_LEN;
        let key = SliceKey {
            entity_id: String::new(),
            variable: variable.to_string(),
            start_index: chunk_start,
        };
        let mut cache = self.cache_guard();
        let slice = match cache.get(&key) {
            Some(slice) => slice,
            None => {
                let slice = self.read_chunk(variable, chunk_start)?;
                cache.insert(key, Arc::clone(&slice));
                slice
            }
        };
        Ok(slice[index - chunk_start])
    }
}

impl TimeIndexedDataProvider for TabularDataProvider {
    fn available_variables(&self) -> Vec<String> {
        self.available.clone()
    }

    fn start_time(&self) -> EpochSeconds {
        self.start
    }

    fn stop_time(&self) -> EpochSeconds {
        self.start + (self.len as i64) * self.step_s
    }

    fn step_seconds(&self) -> i64 {
        self.step_s
    }

    fn is_summed_over_step(&self, variable: &str) -> bool {
        self.canonical(variable)
            .map(standard_names::is_summed_quantity)
            .unwrap_or(false)
    }

    fn get_value(&self, selector: &Selector, method: ResampleMethod) -> CoupleResult<f64> {
        let canonical = self.canonical(&selector.variable)?.to_string();
        let summed = standard_names::is_summed_quantity(&canonical);
        let value = resample::time_weighted(
            self,
            &canonical,
            "",
            summed,
            selector.init_time,
            selector.duration_s,
            method,
        )?;
        let native_units = self.units.get(&canonical).map(String::as_str).unwrap_or("");
        Ok(self.convert_or_warn(&canonical, value, native_units, &selector.output_units))
    }

    fn get_values(&self, selector: &Selector) -> CoupleResult<Vec<f64>> {
        let canonical = self.canonical(&selector.variable)?.to_string();
        let first = self.index_for_time(selector.init_time)?;
        let native_units = self
            .units
            .get(&canonical)
            .map(String::as_str)
            .unwrap_or("")
            .to_string();
        let steps = ((selector.duration_s + self.step_s - 1) / self.step_s).max(1) as usize;
        let range = if first >= self.len {
            self.len - 1..self.len
        } else {
            first..(first + steps).min(self.len)
        };
        range
            .map(|index| {
                let value = self.sample("", &canonical, index)?;
                Ok(self.convert_or_warn(&canonical, value, &native_units, &selector.output_units))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::array;

    fn hourly_source() -> TabularDataProvider {
        TabularDataProvider::new(
            0,
            3600,
            vec![
                TabularColumn::new("RAINRATE", "", array![1.0, 2.0, 3.0, 4.0]),
                TabularColumn::new("T2D", "K", array![280.0, 281.0, 282.0, 283.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn well_known_columns_answer_both_spellings() {
        let source = hourly_source();
        let canonical = Selector::new(standard_names::PRECIP_RATE, 0, 3600, "");
        let raw = Selector::new("RAINRATE", 0, 3600, "");
        assert_eq!(
            source.get_value(&canonical, ResampleMethod::Sum).unwrap(),
            source.get_value(&raw, ResampleMethod::Sum).unwrap()
        );
        assert!(source
            .available_variables()
            .contains(&standard_names::PRECIP_RATE.to_string()));
        assert!(source
            .available_variables()
            .contains(&"RAINRATE".to_string()));
    }

    #[test]
    fn summed_classification_follows_canonical_name() {
        let source = hourly_source();
        assert!(source.is_summed_over_step("RAINRATE"));
        assert!(source.is_summed_over_step(standard_names::PRECIP_RATE));
        assert!(!source.is_summed_over_step("T2D"));
        assert!(!source.is_summed_over_step("unknown"));
    }

    #[test]
    fn converts_to_requested_units() {
        let source = hourly_source();
        let selector = Selector::new("T2D", 0, 3600, "degC");
        let value = source.get_value(&selector, ResampleMethod::Mean).unwrap();
        assert!(is_close!(value, 280.0 - 273.15));
    }

    #[test]
    fn unknown_units_fall_back_to_unconverted() {
        let source = hourly_source();
        let selector = Selector::new("T2D", 0, 3600, "smoots");
        let value = source.get_value(&selector, ResampleMethod::Mean).unwrap();
        assert!(is_close!(value, 280.0));
    }

    #[test]
    fn get_values_returns_the_covered_window() {
        let source = hourly_source();
        let selector = Selector::new("RAINRATE", 3600, 2 * 3600, "");
        assert_eq!(source.get_values(&selector).unwrap(), vec![2.0, 3.0]);
        // Starting at stop_time yields the held last sample.
        let at_end = Selector::new("RAINRATE", 4 * 3600, 3600, "");
        assert_eq!(source.get_values(&at_end).unwrap(), vec![4.0]);
    }

    #[test]
    fn repeated_reads_hit_the_slice_cache() {
        let source = hourly_source();
        let selector = Selector::new("RAINRATE", 0, 3600, "");
        source.get_value(&selector, ResampleMethod::Sum).unwrap();
        let reads_after_first = source.storage_read_count();
        source.get_value(&selector, ResampleMethod::Sum).unwrap();
        source.get_value(&selector, ResampleMethod::Sum).unwrap();
        assert_eq!(source.storage_read_count(), reads_after_first);
    }

    #[test]
    fn unknown_variable_errors() {
        let source = hourly_source();
        let selector = Selector::new("SNOWRATE", 0, 3600, "");
        assert!(matches!(
            source.get_value(&selector, ResampleMethod::Sum),
            Err(CoupleError::UnknownVariable(name)) if name == "SNOWRATE"
        ));
    }

    #[test]
    fn mismatched_column_lengths_rejected() {
        let result = TabularDataProvider::new(
            0,
            3600,
            vec![
                TabularColumn::new("a", "", array![1.0, 2.0]),
                TabularColumn::new("b", "", array![1.0]),
            ],
        );
        assert!(matches!(result, Err(CoupleError::Config(_))));
    }
}
