//! Single linear reservoir runoff model.
//!
//! Net precipitation (rain minus potential evapotranspiration, floored at
//! zero) fills a storage; outflow each step is a fixed fraction of storage.
//! The classic first-order recession, small enough to verify by hand and
//! realistic enough to exercise the full coupling path: aliased inputs,
//! unit conversion, and defaults for the evapotranspiration input.

use catchflow_core::errors::{CoupleError, CoupleResult};
use catchflow_core::marshal::{self, NativeValue};
use catchflow_core::module::ModuleBackend;
use tracing::debug;

use crate::init_text;

pub const MODEL_TYPE: &str = "linear_reservoir";

const RAIN_RATE: &str = "RAIN_RATE";
const PET_RATE: &str = "PET_RATE";
const Q_OUT: &str = "Q_OUT";

/// Hours in one native step.
const STEP_H: f64 = 1.0;

pub struct LinearReservoirBackend {
    /// Outflow fraction of storage per hour.
    recession_k: f64,
    /// Storage depth, metres.
    storage_m: f64,
    /// Rain input, mm h^-1.
    rain_rate: f64,
    /// Potential evapotranspiration input, mm h^-1.
    pet_rate: f64,
    /// Runoff output, mm h^-1.
    runoff: f64,
    current_h: f64,
    end_h: f64,
}

impl LinearReservoirBackend {
    pub fn new() -> Self {
        Self {
            recession_k: 0.1,
            storage_m: 0.0,
            rain_rate: 0.0,
            pet_rate: 0.0,
            runoff: 0.0,
            current_h: 0.0,
            end_h: 24.0 * 365.0,
        }
    }

    pub fn storage_m(&self) -> f64 {
        self.storage_m
    }

    fn known_var(&self, name: &str) -> CoupleResult<()> {
        match name {
            RAIN_RATE | PET_RATE | Q_OUT => Ok(()),
            _ => Err(CoupleError::UnknownVariable(name.to_string())),
        }
    }
}

impl Default for LinearReservoirBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleBackend for LinearReservoirBackend {
    fn initialize(&mut self, init_config: &str) -> CoupleResult<()> {
        let pairs = init_text::parse_pairs(init_config)?;
        for (key, value) in pairs {
            match key.as_str() {
                "k" => {
                    if !(0.0..=1.0).contains(&value) {
                        return Err(CoupleError::Config(format!(
                            "linear reservoir recession k must be in [0, 1], got {value}"
                        )));
                    }
                    self.recession_k = value;
                }
                "storage" => self.storage_m = value,
                "end_time" => self.end_h = value,
                other => {
                    return Err(CoupleError::Config(format!(
                        "linear reservoir does not recognise init key '{other}'"
                    )));
                }
            }
        }
        debug!(
            k = self.recession_k,
            storage_m = self.storage_m,
            end_h = self.end_h,
            "initialised linear reservoir"
        );
        Ok(())
    }

    fn update(&mut self) -> CoupleResult<()> {
        let net_mm_h = (self.rain_rate - self.pet_rate).max(0.0);
        self.storage_m += net_mm_h / 1000.0 * STEP_H;
        let outflow_m_h = self.recession_k * self.storage_m;
        self.storage_m -= outflow_m_h * STEP_H;
        self.runoff = outflow_m_h * 1000.0;
        self.current_h += STEP_H;
        Ok(())
    }

    fn finalize(&mut self) -> CoupleResult<()> {
        Ok(())
    }

    fn input_var_names(&self) -> Vec<String> {
        vec![RAIN_RATE.to_string(), PET_RATE.to_string()]
    }

    fn output_var_names(&self) -> Vec<String> {
        vec![Q_OUT.to_string()]
    }

    fn var_type(&self, name: &str) -> CoupleResult<String> {
        self.known_var(name)?;
        Ok("double".to_string())
    }

    fn var_item_size(&self, name: &str) -> CoupleResult<usize> {
        self.known_var(name)?;
        Ok(8)
    }

    fn var_nbytes(&self, name: &str) -> CoupleResult<usize> {
        self.var_item_size(name)
    }

    fn var_units(&self, name: &str) -> CoupleResult<String> {
        self.known_var(name)?;
        Ok("mm h^-1".to_string())
    }

    fn value(&self, name: &str) -> CoupleResult<NativeValue> {
        match name {
            Q_OUT => Ok(NativeValue::F64(vec![self.runoff])),
            RAIN_RATE => Ok(NativeValue::F64(vec![self.rain_rate])),
            PET_RATE => Ok(NativeValue::F64(vec![self.pet_rate])),
            _ => Err(CoupleError::UnknownVariable(name.to_string())),
        }
    }

    fn set_value(&mut self, name: &str, value: NativeValue) -> CoupleResult<()> {
        let scalar = marshal::scalar_from_native(name, &value)?;
        match name {
            RAIN_RATE => self.rain_rate = scalar,
            PET_RATE => self.pet_rate = scalar,
            _ => return Err(CoupleError::UnknownVariable(name.to_string())),
        }
        Ok(())
    }

    fn start_time(&self) -> f64 {
        0.0
    }

    fn end_time(&self) -> f64 {
        self.end_h
    }

    fn current_time(&self) -> f64 {
        self.current_h
    }

    fn time_step(&self) -> f64 {
        STEP_H
    }

    fn time_units(&self) -> String {
        "hr".to_string()
    }
}
