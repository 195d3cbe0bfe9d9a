//! The framework-side wrapper around a module backend.
//!
//! A [`Module`] owns one [`ModuleBackend`] and everything the pipeline needs
//! to talk to it: the native-to-canonical alias map, the native time unit
//! factor, the offset between the backend's clock and scenario epoch time,
//! and marshaled value access. The backend's `finalize` is guaranteed to run
//! exactly once, on explicit shutdown or on drop.

pub mod backend;

pub use backend::{BackendRegistry, ModuleBackend};

use tracing::warn;

use crate::config::ModuleConfig;
use crate::errors::{CoupleError, CoupleResult};
use crate::marshal;
use crate::time::{self, EpochSeconds};

/// Metadata the pipeline needs to fill one input before an update.
#[derive(Debug, Clone)]
pub struct InputBinding {
    /// The backend's own spelling.
    pub native: String,
    /// Canonical name used for routing.
    pub canonical: String,
    /// Units the backend expects the value in.
    pub units: String,
    /// Number of items the backend expects.
    pub count: usize,
}

pub struct Module {
    index: usize,
    name: String,
    backend: Box<dyn ModuleBackend>,
    input_vars: Vec<String>,
    output_vars: Vec<String>,
    // native -> canonical, from configuration
    alias_map: std::collections::HashMap<String, String>,
    exposed_outputs: Vec<String>,
    main_output_variable: String,
    allow_exceed_end_time: bool,
    fixed_time_step: bool,
    // native time unit -> seconds
    time_factor: f64,
    // scenario epoch of the backend's native time zero
    start_offset_s: EpochSeconds,
    finalized: bool,
}

impl Module {
    /// Construct and initialise a module from configuration.
    ///
    /// `scenario_start` anchors the backend's native clock: a backend whose
    /// clock starts at 0 is taken to begin at the scenario start.
    pub fn register(
        index: usize,
        config: &ModuleConfig,
        backends: &BackendRegistry,
        scenario_start: EpochSeconds,
    ) -> CoupleResult<Self> {
        let mut backend = backends.construct(config)?;
        backend.initialize(&config.init_config)?;

        let time_factor = time::seconds_per_unit(&backend.time_units())?;
        let native_start_s = (backend.start_time() * time_factor).round() as EpochSeconds;
        let start_offset_s = scenario_start - native_start_s;

        let input_vars = backend.input_var_names();
        let output_vars = backend.output_var_names();
        let alias_map = config.variables_names_map.clone();

        let canonical_outputs: Vec<String> = output_vars
            .iter()
            .map(|native| alias_map.get(native).unwrap_or(native).clone())
            .collect();
        let exposed_outputs = if config.output_variables.is_empty() {
            canonical_outputs.clone()
        } else {
            for requested in &config.output_variables {
                let known = canonical_outputs.iter().any(|name| name == requested)
                    || output_vars.iter().any(|name| name == requested);
                if !known {
                    return Err(CoupleError::Config(format!(
                        "module '{}' exposes no output named '{}'",
                        config.model_type_name, requested
                    )));
                }
            }
            config.output_variables.clone()
        };

        Ok(Self {
            index,
            name: config.model_type_name.clone(),
            backend,
            input_vars,
            output_vars,
            alias_map,
            exposed_outputs,
            main_output_variable: config.main_output_variable.clone(),
            allow_exceed_end_time: config.allow_exceed_end_time,
            fixed_time_step: config.fixed_time_step,
            time_factor,
            start_offset_s,
            finalized: false,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn main_output_variable(&self) -> &str {
        &self.main_output_variable
    }

    pub fn allow_exceed_end_time(&self) -> bool {
        self.allow_exceed_end_time
    }

    pub fn fixed_time_step(&self) -> bool {
        self.fixed_time_step
    }

    /// Canonical spelling of a backend-native variable name.
    pub fn canonical_name<'a>(&'a self, native: &'a str) -> &'a str {
        self.alias_map.get(native).map(String::as_str).unwrap_or(native)
    }

    /// The backend-native spelling for a canonical (or native) name, if this
    /// module declares it as an output.
    pub fn native_output_for(&self, name: &str) -> Option<&str> {
        self.output_vars
            .iter()
            .find(|native| native.as_str() == name || self.canonical_name(native) == name)
            .map(String::as_str)
    }

    /// Whether this module produces the named variable, under either its
    /// native or canonical spelling.
    pub fn provides(&self, name: &str) -> bool {
        self.native_output_for(name).is_some()
    }

    /// Canonical names of every output, in declaration order.
    pub fn canonical_outputs(&self) -> Vec<String> {
        self.output_vars
            .iter()
            .map(|native| self.canonical_name(native).to_string())
            .collect()
    }

    /// Outputs exposed in text output, in configured order.
    pub fn exposed_outputs(&self) -> &[String] {
        &self.exposed_outputs
    }

    /// Routing metadata for every declared input.
    pub fn input_bindings(&self) -> CoupleResult<Vec<InputBinding>> {
        self.input_vars
            .iter()
            .map(|native| {
                let item_size = self.backend.var_item_size(native)?;
                let nbytes = self.backend.var_nbytes(native)?;
                let count = if item_size == 0 { 1 } else { (nbytes / item_size).max(1) };
                Ok(InputBinding {
                    native: native.clone(),
                    canonical: self.canonical_name(native).to_string(),
                    units: self.backend.var_units(native)?,
                    count,
                })
            })
            .collect()
    }

    /// The module's current clock position as scenario epoch seconds.
    pub fn current_epoch_time(&self) -> EpochSeconds {
        self.start_offset_s + (self.backend.current_time() * self.time_factor).round() as i64
    }

    fn current_time_s(&self) -> f64 {
        self.backend.current_time() * self.time_factor
    }

    fn end_time_s(&self) -> f64 {
        self.backend.end_time() * self.time_factor
    }

    /// Whether advancing `steps` further steps of `t_delta_s` would push the
    /// backend past its declared end time.
    pub fn would_exceed_end(&self, steps: usize, t_delta_s: i64) -> bool {
        let target = self.current_time_s() + (steps as i64 * t_delta_s) as f64;
        target > self.end_time_s() + 1e-6
    }

    /// Current scalar value of an output, by canonical or native name.
    pub fn value_of(&self, name: &str) -> CoupleResult<f64> {
        self.value_at(name, 0)
    }

    /// One element of an output's current value block.
    pub fn value_at(&self, name: &str, index: usize) -> CoupleResult<f64> {
        let native = self
            .native_output_for(name)
            .ok_or_else(|| CoupleError::UnknownVariable(name.to_string()))?;
        let type_name = self.backend.var_type(native)?;
        let item_size = self.backend.var_item_size(native)?;
        marshal::verify_declared_type(native, &type_name, item_size)?;
        let value = self.backend.value(native)?;
        marshal::from_native(native, &value, index)
    }

    /// Units an output is reported in, by canonical or native name.
    pub fn output_units(&self, name: &str) -> CoupleResult<String> {
        let native = self
            .native_output_for(name)
            .ok_or_else(|| CoupleError::UnknownVariable(name.to_string()))?;
        self.backend.var_units(native)
    }

    /// Marshal and set one input by its native name.
    pub fn set_input(&mut self, native: &str, values: &[f64]) -> CoupleResult<()> {
        let type_name = self.backend.var_type(native)?;
        let item_size = self.backend.var_item_size(native)?;
        let nbytes = self.backend.var_nbytes(native)?;
        let expected = if item_size == 0 { 1 } else { (nbytes / item_size).max(1) };
        if values.len() != expected {
            return Err(CoupleError::ValueCountMismatch {
                module: self.name.clone(),
                variable: native.to_string(),
                expected,
                actual: values.len(),
            });
        }
        let native_value = marshal::to_native(native, &type_name, item_size, values)?;
        self.backend.set_value(native, native_value)
    }

    /// Advance the backend one scenario step of `t_delta_s` seconds.
    ///
    /// When the scenario step matches a fixed-step backend's native step the
    /// plain `update` entry point is used; otherwise the backend is told the
    /// explicit native target time.
    pub fn advance_one_step(&mut self, t_delta_s: i64) -> CoupleResult<()> {
        let native_delta = t_delta_s as f64 / self.time_factor;
        let native_step = self.backend.time_step();
        if self.fixed_time_step && (native_delta - native_step).abs() < 1e-9 {
            self.backend.update()
        } else {
            let target = self.backend.current_time() + native_delta;
            self.backend.update_until(target)
        }
    }

    /// Release the backend. Idempotent; also invoked on drop.
    pub fn finalize(&mut self) -> CoupleResult<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.backend.finalize()
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        if !self.finalized {
            self.finalized = true;
            if let Err(err) = self.backend.finalize() {
                warn!(module = self.name.as_str(), error = %err, "backend finalize failed on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example_backends::TestBackend;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn registry() -> BackendRegistry {
        let mut backends = BackendRegistry::new();
        backends.register("test_source", |_| {
            Ok(Box::new(TestBackend::source("OUTPUT_1", 0.0, 1.0)) as Box<dyn ModuleBackend>)
        });
        backends.register("test_scaler", |_| {
            Ok(Box::new(TestBackend::scaler(&["INPUT_1"], "OUTPUT_2", 2.0))
                as Box<dyn ModuleBackend>)
        });
        backends.register("test_hourly_clock", |_| {
            Ok(Box::new(
                TestBackend::source("OUTPUT_1", 0.0, 1.0)
                    .with_step(1.0)
                    .with_time_units("hr"),
            ) as Box<dyn ModuleBackend>)
        });
        backends
    }

    fn config(model_type_name: &str, aliases: &[(&str, &str)]) -> ModuleConfig {
        ModuleConfig {
            model_type_name: model_type_name.to_string(),
            init_config: String::new(),
            main_output_variable: "OUTPUT_1".to_string(),
            uses_forcing_file: false,
            forcing_file: None,
            variables_names_map: aliases
                .iter()
                .map(|(native, canonical)| (native.to_string(), canonical.to_string()))
                .collect(),
            output_variables: vec![],
            allow_exceed_end_time: false,
            fixed_time_step: true,
        }
    }

    #[test]
    fn aliases_map_native_names_to_canonical() {
        let module = Module::register(
            0,
            &config("test_scaler", &[("INPUT_1", "shared_flux"), ("OUTPUT_2", "scaled_flux")]),
            &registry(),
            0,
        )
        .unwrap();
        assert_eq!(module.canonical_name("INPUT_1"), "shared_flux");
        assert!(module.provides("scaled_flux"));
        assert!(module.provides("OUTPUT_2"));
        assert!(!module.provides("INPUT_1"));
        let bindings = module.input_bindings().unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].canonical, "shared_flux");
        assert_eq!(bindings[0].count, 1);
    }

    #[test]
    fn set_and_read_values_through_marshaling() {
        let mut module =
            Module::register(0, &config("test_scaler", &[]), &registry(), 0).unwrap();
        module.set_input("INPUT_1", &[3.0]).unwrap();
        module.advance_one_step(3600).unwrap();
        assert_eq!(module.value_of("OUTPUT_2").unwrap(), 6.0);
    }

    #[test]
    fn wrong_value_count_is_rejected() {
        let mut module =
            Module::register(0, &config("test_scaler", &[]), &registry(), 0).unwrap();
        let err = module.set_input("INPUT_1", &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, CoupleError::ValueCountMismatch { expected: 1, actual: 2, .. }));
    }

    #[test]
    fn clock_is_anchored_to_the_scenario_start() {
        let scenario_start = 1_600_000_000;
        let mut module =
            Module::register(0, &config("test_source", &[]), &registry(), scenario_start).unwrap();
        assert_eq!(module.current_epoch_time(), scenario_start);
        module.advance_one_step(3600).unwrap();
        assert_eq!(module.current_epoch_time(), scenario_start + 3600);
    }

    #[test]
    fn native_time_units_are_scaled() {
        let mut module =
            Module::register(0, &config("test_hourly_clock", &[]), &registry(), 0).unwrap();
        // One scenario hour is one native step for an hourly clock.
        module.advance_one_step(3600).unwrap();
        assert_eq!(module.current_epoch_time(), 3600);
    }

    #[test]
    fn end_time_check() {
        let module = Module::register(0, &config("test_source", &[]), &registry(), 0).unwrap();
        // TestBackend ends after 100 hourly steps.
        assert!(!module.would_exceed_end(100, 3600));
        assert!(module.would_exceed_end(101, 3600));
    }

    #[test]
    fn finalize_runs_on_drop() {
        let finalized = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finalized);
        let mut backends = BackendRegistry::new();
        backends.register("flagged", move |_| {
            Ok(Box::new(
                TestBackend::source("OUTPUT_1", 0.0, 1.0).with_finalize_flag(Arc::clone(&flag)),
            ) as Box<dyn ModuleBackend>)
        });
        let config = ModuleConfig {
            model_type_name: "flagged".to_string(),
            init_config: String::new(),
            main_output_variable: "OUTPUT_1".to_string(),
            uses_forcing_file: false,
            forcing_file: None,
            variables_names_map: HashMap::new(),
            output_variables: vec![],
            allow_exceed_end_time: false,
            fixed_time_step: true,
        };
        {
            let _module = Module::register(0, &config, &backends, 0).unwrap();
        }
        assert!(finalized.load(Ordering::SeqCst));
    }

    #[test]
    fn unknown_exposed_output_is_a_config_error() {
        let mut cfg = config("test_source", &[]);
        cfg.output_variables = vec!["NOT_AN_OUTPUT".to_string()];
        assert!(matches!(
            Module::register(0, &cfg, &registry(), 0),
            Err(CoupleError::Config(_))
        ));
    }
}
