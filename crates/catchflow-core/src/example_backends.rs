#![allow(dead_code)]
//! Minimal module backends used by tests across the crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{CoupleError, CoupleResult};
use crate::marshal::{self, NativeValue};
use crate::module::backend::ModuleBackend;

enum Behavior {
    /// Output grows by `increment` every update.
    Source { increment: f64 },
    /// Output is `factor` times the sum of the inputs, recomputed on update.
    Scale { factor: f64 },
}

/// A configurable scalar backend: one output, optional inputs, a regular
/// clock, and an optional integer "TICKS" output counting updates.
pub(crate) struct TestBackend {
    behavior: Behavior,
    inputs: Vec<String>,
    output: String,
    values: HashMap<String, f64>,
    var_units: HashMap<String, String>,
    tick_output: Option<String>,
    start: f64,
    end: f64,
    step: f64,
    current: f64,
    time_units: String,
    update_calls: usize,
    initialized: bool,
    finalize_flag: Option<Arc<AtomicBool>>,
}

impl TestBackend {
    pub fn source(output: &str, initial: f64, increment: f64) -> Self {
        let mut values = HashMap::new();
        values.insert(output.to_string(), initial);
        Self {
            behavior: Behavior::Source { increment },
            inputs: vec![],
            output: output.to_string(),
            values,
            var_units: HashMap::new(),
            tick_output: None,
            start: 0.0,
            end: 100.0 * 3600.0,
            step: 3600.0,
            current: 0.0,
            time_units: "s".to_string(),
            update_calls: 0,
            initialized: false,
            finalize_flag: None,
        }
    }

    pub fn scaler(inputs: &[&str], output: &str, factor: f64) -> Self {
        let mut backend = Self::source(output, 0.0, 0.0);
        backend.behavior = Behavior::Scale { factor };
        backend.inputs = inputs.iter().map(|name| name.to_string()).collect();
        for input in &backend.inputs {
            backend.values.insert(input.clone(), 0.0);
        }
        backend
    }

    pub fn with_start(mut self, start: f64) -> Self {
        self.start = start;
        self.current = start;
        self
    }

    pub fn with_end(mut self, end: f64) -> Self {
        self.end = end;
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn with_time_units(mut self, units: &str) -> Self {
        self.time_units = units.to_string();
        self
    }

    pub fn with_var_units(mut self, name: &str, units: &str) -> Self {
        self.var_units.insert(name.to_string(), units.to_string());
        self
    }

    /// Add an `int`-typed output exposing the number of updates performed.
    pub fn with_tick_output(mut self, name: &str) -> Self {
        self.tick_output = Some(name.to_string());
        self
    }

    pub fn with_finalize_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.finalize_flag = Some(flag);
        self
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls
    }

    fn known_var(&self, name: &str) -> CoupleResult<()> {
        let known = self.values.contains_key(name)
            || self.tick_output.as_deref() == Some(name);
        if known {
            Ok(())
        } else {
            Err(CoupleError::UnknownVariable(name.to_string()))
        }
    }
}

impl ModuleBackend for TestBackend {
    fn initialize(&mut self, init_config: &str) -> CoupleResult<()> {
        if init_config == "fail" {
            return Err(CoupleError::Backend {
                module: "test_backend".to_string(),
                message: "initialisation failed".to_string(),
            });
        }
        self.initialized = true;
        Ok(())
    }

    fn update(&mut self) -> CoupleResult<()> {
        self.update_calls += 1;
        self.current += self.step;
        match self.behavior {
            Behavior::Source { increment } => {
                if let Some(value) = self.values.get_mut(&self.output) {
                    *value += increment;
                }
            }
            Behavior::Scale { factor } => {
                let total: f64 = self
                    .inputs
                    .iter()
                    .filter_map(|input| self.values.get(input))
                    .sum();
                self.values.insert(self.output.clone(), factor * total);
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> CoupleResult<()> {
        if let Some(flag) = &self.finalize_flag {
            flag.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn input_var_names(&self) -> Vec<String> {
        self.inputs.clone()
    }

    fn output_var_names(&self) -> Vec<String> {
        let mut outputs = vec![self.output.clone()];
        if let Some(ticks) = &self.tick_output {
            outputs.push(ticks.clone());
        }
        outputs
    }

    fn var_type(&self, name: &str) -> CoupleResult<String> {
        self.known_var(name)?;
        if self.tick_output.as_deref() == Some(name) {
            Ok("int".to_string())
        } else {
            Ok("double".to_string())
        }
    }

    fn var_item_size(&self, name: &str) -> CoupleResult<usize> {
        self.known_var(name)?;
        if self.tick_output.as_deref() == Some(name) {
            Ok(4)
        } else {
            Ok(8)
        }
    }

    fn var_nbytes(&self, name: &str) -> CoupleResult<usize> {
        self.var_item_size(name)
    }

    fn var_units(&self, name: &str) -> CoupleResult<String> {
        self.known_var(name)?;
        Ok(self.var_units.get(name).cloned().unwrap_or_default())
    }

    fn value(&self, name: &str) -> CoupleResult<NativeValue> {
        self.known_var(name)?;
        if self.tick_output.as_deref() == Some(name) {
            return Ok(NativeValue::I32(vec![self.update_calls as i32]));
        }
        Ok(NativeValue::F64(vec![self.values[name]]))
    }

    fn set_value(&mut self, name: &str, value: NativeValue) -> CoupleResult<()> {
        self.known_var(name)?;
        let scalar = marshal::scalar_from_native(name, &value)?;
        self.values.insert(name.to_string(), scalar);
        Ok(())
    }

    fn start_time(&self) -> f64 {
        self.start
    }

    fn end_time(&self) -> f64 {
        self.end
    }

    fn current_time(&self) -> f64 {
        self.current
    }

    fn time_step(&self) -> f64 {
        self.step
    }

    fn time_units(&self) -> String {
        self.time_units.clone()
    }
}
