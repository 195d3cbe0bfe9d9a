//! Two-phase pipeline construction.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::PipelineConfig;
use crate::errors::{CoupleError, CoupleResult};
use crate::module::{BackendRegistry, Module};
use crate::pipeline::Pipeline;
use crate::provider::TimeIndexedDataProvider;
use crate::router::{DefaultSpec, ProviderRef, VariableRouter};
use crate::synchronizer::TimeSynchronizer;
use crate::time::EpochSeconds;

/// Builds a [`Pipeline`] from configuration, a backend factory, and the
/// forcing sources the configuration refers to.
///
/// Registration publishes every forcing variable and every module output
/// into the router and defers unbound inputs; `build` then resolves all
/// deferred bindings at once, so registration order only determines
/// execution order, never bindability.
pub struct PipelineBuilder<'a> {
    config: PipelineConfig,
    backends: &'a BackendRegistry,
    scenario_start: EpochSeconds,
    forcing_sources: HashMap<String, Arc<dyn TimeIndexedDataProvider>>,
    anonymous_sources: Vec<Arc<dyn TimeIndexedDataProvider>>,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(config: PipelineConfig, backends: &'a BackendRegistry) -> Self {
        Self {
            config,
            backends,
            scenario_start: 0,
            forcing_sources: HashMap::new(),
            anonymous_sources: Vec::new(),
        }
    }

    /// Epoch time of scenario step 0. Anchors every module's native clock.
    pub fn with_scenario_start(&mut self, scenario_start: EpochSeconds) -> &mut Self {
        self.scenario_start = scenario_start;
        self
    }

    /// Register the opened source for a `forcing_file` path named in module
    /// configuration. Typically obtained through a shared
    /// [`ProviderRegistry`].
    ///
    /// [`ProviderRegistry`]: crate::provider::ProviderRegistry
    pub fn with_forcing_source(
        &mut self,
        path: impl Into<String>,
        provider: Arc<dyn TimeIndexedDataProvider>,
    ) -> &mut Self {
        self.forcing_sources.insert(path.into(), provider);
        self
    }

    /// Register a forcing source not tied to a configured path.
    pub fn with_forcing_provider(
        &mut self,
        provider: Arc<dyn TimeIndexedDataProvider>,
    ) -> &mut Self {
        self.anonymous_sources.push(provider);
        self
    }

    pub fn build(&mut self) -> CoupleResult<Pipeline> {
        let config = self.config.clone();
        config.validate()?;

        let mut router = VariableRouter::new();

        for provider in self
            .anonymous_sources
            .iter()
            .chain(self.forcing_sources.values())
        {
            for name in provider.available_variables() {
                router.publish(&name, ProviderRef::External(Arc::clone(provider)), "forcing")?;
            }
        }

        let defaults: HashMap<String, DefaultSpec> = config
            .default_output_values
            .iter()
            .map(|default| {
                (
                    default.name.clone(),
                    DefaultSpec {
                        value: default.value,
                        wait_count: default.wait_count,
                    },
                )
            })
            .collect();

        // Phase one: register every module, publishing outputs and deferring
        // unbound inputs.
        let mut modules: Vec<Module> = Vec::with_capacity(config.modules.len());
        for (index, module_config) in config.modules.iter().enumerate() {
            if module_config.uses_forcing_file {
                let path = module_config.forcing_file.as_deref().unwrap_or("");
                if !self.forcing_sources.contains_key(path) {
                    return Err(CoupleError::Config(format!(
                        "module '{}' names forcing file '{}' but no source is registered for it",
                        module_config.model_type_name, path
                    )));
                }
            }
            let module = Module::register(index, module_config, self.backends, self.scenario_start)?;
            debug!(
                module = module.name(),
                index,
                "registered pipeline module"
            );
            for binding in module.input_bindings()? {
                router.require(&binding.canonical, index, &defaults);
            }
            for canonical in module.canonical_outputs() {
                router.publish(&canonical, ProviderRef::Module(index), module.name())?;
            }
            modules.push(module);
        }

        // Phase two: every deferred input must now find a source or a
        // default.
        router.resolve_all(&modules)?;

        let primary_index = match router.provider_for(&config.main_output_variable) {
            Some(ProviderRef::Module(index)) => index,
            Some(ProviderRef::External(_)) => {
                return Err(CoupleError::Config(format!(
                    "main output variable '{}' is provided by a forcing source, not a module",
                    config.main_output_variable
                )));
            }
            None => modules
                .iter()
                .rev()
                .find(|module| module.provides(&config.main_output_variable))
                .map(Module::index)
                .ok_or_else(|| {
                    CoupleError::Config(format!(
                        "no module provides the main output variable '{}'",
                        config.main_output_variable
                    ))
                })?,
        };

        let output_variables = if config.output_variables.is_empty() {
            modules
                .last()
                .map(|module| module.exposed_outputs().to_vec())
                .unwrap_or_default()
        } else {
            config.output_variables.clone()
        };
        let output_header_fields = if config.output_header_fields.is_empty() {
            output_variables.clone()
        } else {
            config.output_header_fields.clone()
        };

        Ok(Pipeline {
            name: config.name.clone(),
            modules,
            router,
            synchronizer: TimeSynchronizer::new(),
            main_output_variable: config.main_output_variable.clone(),
            primary_index,
            output_variables,
            output_header_fields,
            scenario_start: self.scenario_start,
        })
    }
}
