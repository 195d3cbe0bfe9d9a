//! Unit conversion at the provider boundary.
//!
//! Conversion is a collaborator behind a trait so a full udunits-style
//! implementation can be swapped in. The bundled [`StandardUnitConverter`]
//! covers the pairs that actually occur between forcing sources and the
//! bundled module backends: linear `value * factor + offset` relations.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::errors::{CoupleError, CoupleResult};

pub trait UnitConverter: Send + Sync {
    /// Convert `value` from `from` units to `to` units.
    fn convert(&self, value: f64, from: &str, to: &str) -> CoupleResult<f64>;
}

/// Table-driven converter over linear unit relations.
pub struct StandardUnitConverter {
    // (from, to) -> (factor, offset)
    table: HashMap<(String, String), (f64, f64)>,
}

impl StandardUnitConverter {
    pub fn new() -> Self {
        let mut converter = Self {
            table: HashMap::new(),
        };
        // Depth / water equivalence (1 kg m^-2 of water is 1 mm depth)
        converter.register("mm", "m", 1e-3, 0.0);
        converter.register("kg m^-2", "mm", 1.0, 0.0);
        converter.register("kg m^-2", "m", 1e-3, 0.0);
        // Precipitation rates
        converter.register("mm s^-1", "m s^-1", 1e-3, 0.0);
        converter.register("mm h^-1", "m h^-1", 1e-3, 0.0);
        converter.register("mm s^-1", "mm h^-1", 3600.0, 0.0);
        converter.register("mm h^-1", "m s^-1", 1.0 / 3.6e6, 0.0);
        converter.register("m s^-1", "m h^-1", 3600.0, 0.0);
        converter.register("mm s^-1", "m h^-1", 3.6, 0.0);
        // Temperature
        converter.register_one_way("K", "degC", 1.0, -273.15);
        converter.register_one_way("degC", "K", 1.0, 273.15);
        // Pressure
        converter.register("Pa", "hPa", 1e-2, 0.0);
        converter.register("Pa", "kPa", 1e-3, 0.0);
        converter
    }

    /// Shared instance used by providers that are not handed an explicit
    /// converter.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<StandardUnitConverter>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(StandardUnitConverter::new())))
    }

    /// Register a linear relation and its inverse.
    pub fn register(&mut self, from: &str, to: &str, factor: f64, offset: f64) {
        self.register_one_way(from, to, factor, offset);
        self.register_one_way(to, from, 1.0 / factor, -offset / factor);
    }

    pub fn register_one_way(&mut self, from: &str, to: &str, factor: f64, offset: f64) {
        self.table
            .insert((from.to_string(), to.to_string()), (factor, offset));
    }
}

impl Default for StandardUnitConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitConverter for StandardUnitConverter {
    fn convert(&self, value: f64, from: &str, to: &str) -> CoupleResult<f64> {
        if from == to || from.is_empty() || to.is_empty() {
            return Ok(value);
        }
        match self.table.get(&(from.to_string(), to.to_string())) {
            Some((factor, offset)) => Ok(value * factor + offset),
            None => Err(CoupleError::NoKnownConversion {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }
}
