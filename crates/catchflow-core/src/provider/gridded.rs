//! In-memory gridded (multi-entity) data source.
//!
//! Holds one `(entity, time)` array per variable and serves queries for a
//! specific entity via [`Selector::entity_id`]. Mirrors the tabular source's
//! resampling, well-known-name handling, and slice caching, with the cache
//! keyed per entity.
//!
//! [`Selector::entity_id`]: crate::selector::Selector

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use ndarray::{s, Array2};
use tracing::warn;

use crate::errors::{CoupleError, CoupleResult};
use crate::provider::cache::{SliceCache, SliceKey, DEFAULT_SLICE_CAPACITY};
use crate::provider::resample::{self, RawSamples};
use crate::provider::{ResampleMethod, TimeIndexedDataProvider};
use crate::selector::Selector;
use crate::standard_names;
use crate::time::EpochSeconds;
use crate::units::{StandardUnitConverter, UnitConverter};

const CHUNK_LEN: usize = 64;

/// One named field: rows are entities in declaration order, columns are time
/// steps.
#[derive(Debug, Clone)]
pub struct GriddedField {
    pub name: String,
    pub units: String,
    pub values: Array2<f64>,
}

impl GriddedField {
    pub fn new(name: impl Into<String>, units: impl Into<String>, values: Array2<f64>) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            values,
        }
    }
}

pub struct GriddedDataProvider {
    start: EpochSeconds,
    step_s: i64,
    len: usize,
    entity_rows: HashMap<String, usize>,
    fields: HashMap<String, Array2<f64>>,
    units: HashMap<String, String>,
    aliases: HashMap<String, String>,
    available: Vec<String>,
    converter: Arc<dyn UnitConverter>,
    cache: Mutex<SliceCache>,
    storage_reads: AtomicUsize,
}

impl GriddedDataProvider {
    pub fn new(
        start: EpochSeconds,
        step_s: i64,
        entities: Vec<String>,
        fields: Vec<GriddedField>,
    ) -> CoupleResult<Self> {
        if step_s <= 0 {
            return Err(CoupleError::Config(format!(
                "gridded source step must be positive, got {step_s}"
            )));
        }
        if entities.is_empty() || fields.is_empty() {
            return Err(CoupleError::Config(
                "gridded source requires at least one entity and one field".to_string(),
            ));
        }

        let len = fields[0].values.ncols();
        if len == 0 {
            return Err(CoupleError::Config(
                "gridded source fields must not be empty".to_string(),
            ));
        }

        let mut entity_rows = HashMap::new();
        for (row, entity) in entities.iter().enumerate() {
            if entity_rows.insert(entity.clone(), row).is_some() {
                return Err(CoupleError::Config(format!("duplicate entity '{entity}'")));
            }
        }

        let mut provider = Self {
            start,
            step_s,
            len,
            entity_rows,
            fields: HashMap::new(),
            units: HashMap::new(),
            aliases: HashMap::new(),
            available: Vec::new(),
            converter: StandardUnitConverter::shared(),
            cache: Mutex::new(SliceCache::new(DEFAULT_SLICE_CAPACITY)),
            storage_reads: AtomicUsize::new(0),
        };

        for field in fields {
            if field.values.nrows() != entities.len() || field.values.ncols() != len {
                return Err(CoupleError::Config(format!(
                    "field '{}' has shape {:?} but the source has {} entities and {} steps",
                    field.name,
                    field.values.dim(),
                    entities.len(),
                    len
                )));
            }
            let canonical = standard_names::canonical_for(&field.name)
                .unwrap_or(&field.name)
                .to_string();
            if provider.fields.contains_key(&canonical) {
                return Err(CoupleError::Config(format!(
                    "duplicate field for canonical name '{canonical}'"
                )));
            }
            let units = if field.units.is_empty() {
                standard_names::well_known_units(&field.name)
                    .unwrap_or("")
                    .to_string()
            } else {
                field.units.clone()
            };
            provider.units.insert(canonical.clone(), units);
            provider
                .aliases
                .insert(canonical.clone(), canonical.clone());
            provider.available.push(canonical.clone());
            if field.name != canonical {
                provider
                    .aliases
                    .insert(field.name.clone(), canonical.clone());
                provider.available.push(field.name.clone());
            }
            provider.fields.insert(canonical, field.values);
        }
        Ok(provider)
    }

    pub fn with_converter(mut self, converter: Arc<dyn UnitConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.entity_rows.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn canonical(&self, name: &str) -> CoupleResult<&str> {
        self.aliases
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| CoupleError::UnknownVariable(name.to_string()))
    }

    fn row_for(&self, entity_id: &str) -> CoupleResult<usize> {
        self.entity_rows
            .get(entity_id)
            .copied()
            .ok_or_else(|| CoupleError::UnknownEntity(entity_id.to_string()))
    }

    fn cache_guard(&self) -> MutexGuard<'_, SliceCache> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read_chunk(
        &self,
        entity_id: &str,
        variable: &str,
        chunk_start: usize,
    ) -> CoupleResult<Arc<Vec<f64>>> {
        self.storage_reads.fetch_add(1, Ordering::Relaxed);
        let row = self.row_for(entity_id)?;
        let field = self
            .fields
            .get(variable)
            .ok_or_else(|| CoupleError::UnknownVariable(variable.to_string()))?;
        let end = (chunk_start + CHUNK_LEN).min(self.len);
        Ok(Arc::new(field.slice(s![row, chunk_start..end]).to_vec()))
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
}

impl RawSamples for GriddedDataProvider {
    fn series_start(&self) -> EpochSeconds {
        self.start
    }

    fn series_step_s(&self) -> i64 {
        self.step_s
    }

    fn series_len(&self) -> usize {
        self.len
    }

    fn sample(&self, entity_id: &str, variable: &str, index: usize) -> CoupleResult<f64> {
        let chunk_start = index - index % CHUNK_LEN;
        let key = SliceKey {
            entity_id: entity_id.to_string(),
            variable: variable.to_string(),
            start_index: chunk_start,
        };
        let mut cache = self.cache_guard();
        let slice = match cache.get(&key) {
            Some(slice) => slice,
            None => {
                let slice = self.read_chunk(entity_id, variable, chunk_start)?;
                cache.insert(key, Arc::clone(&slice));
                slice
            }
        };
        Ok(slice[index - chunk_start])
    }
}

impl TimeIndexedDataProvider for GriddedDataProvider {
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
        // Fail on a bad entity before the resampler walks anything.
        self.row_for(&selector.entity_id)?;
        let summed = standard_names::is_summed_quantity(&canonical);
        let value = resample::time_weighted(
            self,
            &canonical,
            &selector.entity_id,
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
        self.row_for(&selector.entity_id)?;
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
                let value = self.sample(&selector.entity_id, &canonical, index)?;
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

    fn two_entity_source() -> GriddedDataProvider {
        GriddedDataProvider::new(
            0,
            3600,
            vec!["cat-1".to_string(), "cat-2".to_string()],
            vec![
                GriddedField::new("RAINRATE", "", array![[1.0, 2.0], [10.0, 20.0]]),
                GriddedField::new("T2D", "K", array![[280.0, 281.0], [290.0, 291.0]]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn selects_by_entity() {
        let source = two_entity_source();
        let first = Selector::new("RAINRATE", 0, 3600, "").with_entity("cat-1");
        let second = Selector::new("RAINRATE", 0, 3600, "").with_entity("cat-2");
        assert!(is_close!(
            source.get_value(&first, ResampleMethod::Sum).unwrap(),
            1.0
        ));
        assert!(is_close!(
            source.get_value(&second, ResampleMethod::Sum).unwrap(),
            10.0
        ));
    }

    #[test]
    fn unknown_entity_errors() {
        let source = two_entity_source();
        let selector = Selector::new("RAINRATE", 0, 3600, "").with_entity("cat-9");
        assert!(matches!(
            source.get_value(&selector, ResampleMethod::Sum),
            Err(CoupleError::UnknownEntity(id)) if id == "cat-9"
        ));
    }

    #[test]
    fn entity_slices_are_cached_independently() {
        let source = two_entity_source();
        let first = Selector::new("T2D", 0, 3600, "").with_entity("cat-1");
        let second = Selector::new("T2D", 0, 3600, "").with_entity("cat-2");
        assert!(is_close!(
            source.get_value(&first, ResampleMethod::Mean).unwrap(),
            280.0
        ));
        assert!(is_close!(
            source.get_value(&second, ResampleMethod::Mean).unwrap(),
            290.0
        ));
    }

    #[test]
    fn shape_mismatch_rejected() {
        let result = GriddedDataProvider::new(
            0,
            3600,
            vec!["cat-1".to_string()],
            vec![GriddedField::new("T2D", "K", array![[1.0], [2.0]])],
        );
        assert!(matches!(result, Err(CoupleError::Config(_))));
    }
}
