//! The module interface: the fixed contract every process-model backend
//! implements, and the factory that constructs backends from configuration.

use std::collections::HashMap;

use crate::config::ModuleConfig;
use crate::errors::{CoupleError, CoupleResult};
use crate::marshal::NativeValue;

/// Contract between the framework and a process model.
///
/// The framework only ever talks to a backend through this trait: variable
/// discovery, typed get/set of values, and clock control. Times are in the
/// backend's native unit (see [`time_units`]); the wrapping [`Module`]
/// converts to scenario epoch seconds.
///
/// [`time_units`]: ModuleBackend::time_units
/// [`Module`]: crate::module::Module
pub trait ModuleBackend: Send {
    /// Prepare the backend. Called exactly once, before any other method.
    fn initialize(&mut self, init_config: &str) -> CoupleResult<()>;

    /// Advance one native time step.
    fn update(&mut self) -> CoupleResult<()>;

    /// Advance to the given native time, which need not be a whole number of
    /// steps. Backends that can only step wholly may override-and-error; the
    /// default loops `update` until the clock reaches the target.
    fn update_until(&mut self, time: f64) -> CoupleResult<()> {
        while self.current_time() < time {
            self.update()?;
        }
        Ok(())
    }

    /// Release backend resources. Called exactly once; the wrapper guarantees
    /// it runs even when the module is dropped without an explicit shutdown.
    fn finalize(&mut self) -> CoupleResult<()>;

    fn input_var_names(&self) -> Vec<String>;
    fn output_var_names(&self) -> Vec<String>;

    /// C-style type-name string for a variable, e.g. `"double"`.
    fn var_type(&self, name: &str) -> CoupleResult<String>;
    /// Size in bytes of one item of the variable.
    fn var_item_size(&self, name: &str) -> CoupleResult<usize>;
    /// Total size in bytes of the variable's current value block.
    fn var_nbytes(&self, name: &str) -> CoupleResult<usize>;
    fn var_units(&self, name: &str) -> CoupleResult<String>;

    fn value(&self, name: &str) -> CoupleResult<NativeValue>;
    fn set_value(&mut self, name: &str, value: NativeValue) -> CoupleResult<()>;

    fn start_time(&self) -> f64;
    fn end_time(&self) -> f64;
    fn current_time(&self) -> f64;
    /// Native step length, in `time_units`.
    fn time_step(&self) -> f64;
    fn time_units(&self) -> String;
}

type BackendConstructor =
    Box<dyn Fn(&ModuleConfig) -> CoupleResult<Box<dyn ModuleBackend>> + Send + Sync>;

/// Factory keyed on `model_type_name`. The set of constructible backends is
/// closed at registration time; an unknown key is a configuration error.
#[derive(Default)]
pub struct BackendRegistry {
    constructors: HashMap<String, BackendConstructor>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, model_type_name: impl Into<String>, constructor: F)
    where
        F: Fn(&ModuleConfig) -> CoupleResult<Box<dyn ModuleBackend>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(model_type_name.into(), Box::new(constructor));
    }

    pub fn construct(&self, config: &ModuleConfig) -> CoupleResult<Box<dyn ModuleBackend>> {
        let constructor = self
            .constructors
            .get(&config.model_type_name)
            .ok_or_else(|| CoupleError::UnknownModelType(config.model_type_name.clone()))?;
        constructor(config)
    }

    pub fn known_model_types(&self) -> Vec<String> {
        let mut names: Vec<_> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example_backends::TestBackend;

    fn module_config(model_type_name: &str) -> ModuleConfig {
        ModuleConfig {
            model_type_name: model_type_name.to_string(),
            init_config: String::new(),
            main_output_variable: "OUTPUT_1".to_string(),
            uses_forcing_file: false,
            forcing_file: None,
            variables_names_map: HashMap::new(),
            output_variables: vec![],
            allow_exceed_end_time: false,
            fixed_time_step: true,
        }
    }

    #[test]
    fn constructs_registered_backends() {
        let mut registry = BackendRegistry::new();
        registry.register("test_source", |_| {
            Ok(Box::new(TestBackend::source("OUTPUT_1", 0.0, 1.0)) as Box<dyn ModuleBackend>)
        });
        let backend = registry.construct(&module_config("test_source")).unwrap();
        assert_eq!(backend.output_var_names(), vec!["OUTPUT_1".to_string()]);
        assert_eq!(registry.known_model_types(), vec!["test_source".to_string()]);
    }

    #[test]
    fn unknown_model_type_errors() {
        let registry = BackendRegistry::new();
        let err = registry.construct(&module_config("missing")).err().unwrap();
        assert!(matches!(err, CoupleError::UnknownModelType(name) if name == "missing"));
    }
}
