//! Stepping a built pipeline and reading its outputs.

use std::fmt;

use tracing::warn;

use crate::errors::{CoupleError, CoupleResult};
use crate::module::Module;
use crate::provider::ResampleMethod;
use crate::router::{InputSource, ProviderRef, VariableRouter};
use crate::selector::Selector;
use crate::synchronizer::TimeSynchronizer;
use crate::time::EpochSeconds;
use crate::units::{StandardUnitConverter, UnitConverter};

pub struct Pipeline {
    pub(super) name: String,
    pub(super) modules: Vec<Module>,
    pub(super) router: VariableRouter,
    pub(super) synchronizer: TimeSynchronizer,
    pub(super) main_output_variable: String,
    pub(super) primary_index: usize,
    pub(super) output_variables: Vec<String>,
    pub(super) output_header_fields: Vec<String>,
    pub(super) scenario_start: EpochSeconds,
}

// Modules hold backend trait objects, so this cannot be derived.
impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("modules", &self.modules.len())
            .field("main_output_variable", &self.main_output_variable)
            .field("primary_index", &self.primary_index)
            .field("scenario_start", &self.scenario_start)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scenario_start(&self) -> EpochSeconds {
        self.scenario_start
    }

    pub fn main_output_variable(&self) -> &str {
        &self.main_output_variable
    }

    /// Every canonical name the pipeline can answer queries for.
    pub fn available_variables(&self) -> Vec<String> {
        self.router.published_names()
    }

    /// True only if every module may be stepped past its end time.
    pub fn allow_exceed_end_time(&self) -> bool {
        self.modules
            .iter()
            .all(Module::allow_exceed_end_time)
    }

    /// True only if every module advances in whole native steps.
    pub fn fixed_time_step(&self) -> bool {
        self.modules.iter().all(Module::fixed_time_step)
    }

    /// Advance the pipeline through scenario step `t_index` (steps of
    /// `t_delta_s` seconds) and return the main output variable's value.
    ///
    /// Steps already processed are not re-run: re-requesting the current
    /// index only re-reads the value. Requesting an earlier index is an
    /// error, as is any step that would push a non-exceeding module past its
    /// end time; that check runs before any module moves.
    pub fn get_response(&mut self, t_index: usize, t_delta_s: i64) -> CoupleResult<f64> {
        self.synchronizer
            .check_end_times(&self.modules, t_index, t_delta_s)?;
        let steps = self.synchronizer.steps_to(t_index)?;
        for _ in steps {
            for index in 0..self.modules.len() {
                self.advance_module(index, t_delta_s)?;
            }
            self.synchronizer.mark_step_complete();
        }
        self.modules[self.primary_index].value_of(&self.main_output_variable)
    }

    fn advance_module(&mut self, index: usize, t_delta_s: i64) -> CoupleResult<()> {
        let inputs = self.collect_inputs(index, t_delta_s)?;
        let module = &mut self.modules[index];
        for (native, values) in inputs {
            module.set_input(&native, &values)?;
        }
        module.advance_one_step(t_delta_s)
    }

    /// Gather one step's worth of values for every input of the module at
    /// `index`, in the units the backend expects.
    fn collect_inputs(
        &mut self,
        index: usize,
        t_delta_s: i64,
    ) -> CoupleResult<Vec<(String, Vec<f64>)>> {
        let bindings = self.modules[index].input_bindings()?;
        let init_time = self.modules[index].current_epoch_time();

        let mut collected = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let source = self.router.input_source(index, &binding.canonical)?;
            let values = match source {
                InputSource::Default(value) => vec![value; binding.count],
                InputSource::Provider(ProviderRef::External(provider)) => {
                    let selector =
                        Selector::new(&binding.canonical, init_time, t_delta_s, &binding.units)
                            .with_entity(&self.name);
                    if binding.count == 1 {
                        vec![provider.get_value(&selector, ResampleMethod::Sum)?]
                    } else {
                        let values = provider.get_values(&selector)?;
                        if values.len() != binding.count {
                            return Err(CoupleError::ValueCountMismatch {
                                module: self.modules[index].name().to_string(),
                                variable: binding.canonical.clone(),
                                expected: binding.count,
                                actual: values.len(),
                            });
                        }
                        values
                    }
                }
                InputSource::Provider(ProviderRef::Module(source_index)) => {
                    let source = &self.modules[source_index];
                    let source_units = source.output_units(&binding.canonical)?;
                    (0..binding.count)
                        .map(|item| {
                            let value = source.value_at(&binding.canonical, item)?;
                            Ok(convert_or_warn(
                                &binding.canonical,
                                value,
                                &source_units,
                                &binding.units,
                            ))
                        })
                        .collect::<CoupleResult<Vec<f64>>>()?
                }
            };
            collected.push((binding.native, values));
        }
        Ok(collected)
    }

    /// Read a value through the pipeline's published bindings: module
    /// outputs answer with their current value, forcing sources resample as
    /// usual.
    pub fn get_value(&self, selector: &Selector, method: ResampleMethod) -> CoupleResult<f64> {
        match self.router.provider_for(&selector.variable) {
            Some(ProviderRef::External(provider)) => provider.get_value(selector, method),
            Some(ProviderRef::Module(index)) => {
                let module = &self.modules[index];
                let value = module.value_of(&selector.variable)?;
                let units = module.output_units(&selector.variable)?;
                Ok(convert_or_warn(
                    &selector.variable,
                    value,
                    &units,
                    &selector.output_units,
                ))
            }
            None => Err(CoupleError::UnknownVariable(selector.variable.clone())),
        }
    }

    pub fn get_values(&self, selector: &Selector) -> CoupleResult<Vec<f64>> {
        match self.router.provider_for(&selector.variable) {
            Some(ProviderRef::External(provider)) => provider.get_values(selector),
            Some(ProviderRef::Module(_)) => Ok(vec![self.get_value(selector, ResampleMethod::Sum)?]),
            None => Err(CoupleError::UnknownVariable(selector.variable.clone())),
        }
    }

    /// Delimited header matching [`get_output_line_for_timestep`].
    ///
    /// [`get_output_line_for_timestep`]: Pipeline::get_output_line_for_timestep
    pub fn get_output_header_line(&self, delimiter: &str) -> String {
        self.output_header_fields.join(delimiter)
    }

    /// Delimited values of the configured output variables at the most
    /// recently completed step. Only the current step can be printed; module
    /// state for earlier steps is gone.
    pub fn get_output_line_for_timestep(
        &self,
        t_index: usize,
        delimiter: &str,
    ) -> CoupleResult<String> {
        if !self.synchronizer.is_current(t_index) {
            return Err(CoupleError::OutputNotCurrent {
                requested: t_index,
                current: self.synchronizer.next_index().saturating_sub(1),
            });
        }
        let mut fields = Vec::with_capacity(self.output_variables.len());
        for name in &self.output_variables {
            let value = match self.router.provider_for(name) {
                Some(ProviderRef::Module(index)) => self.modules[index].value_of(name)?,
                _ => {
                    // Not a published module output; fall back to any module
                    // exposing the name natively.
                    self.modules
                        .iter()
                        .rev()
                        .find_map(|module| module.value_of(name).ok())
                        .ok_or_else(|| CoupleError::UnknownVariable(name.clone()))?
                }
            };
            fields.push(format!("{value:.6}"));
        }
        Ok(fields.join(delimiter))
    }

    /// Shut down every module, releasing backend resources. Idempotent;
    /// also runs on drop via each module's guard.
    pub fn finalize(&mut self) -> CoupleResult<()> {
        for module in &mut self.modules {
            module.finalize()?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn module(&self, index: usize) -> &Module {
        &self.modules[index]
    }

    #[cfg(test)]
    pub(crate) fn next_step_index(&self) -> usize {
        self.synchronizer.next_index()
    }
}

fn convert_or_warn(variable: &str, value: f64, from: &str, to: &str) -> f64 {
    match StandardUnitConverter::shared().convert(value, from, to) {
        Ok(converted) => converted,
        Err(err) => {
            warn!(
                variable = variable,
                from = from,
                to = to,
                error = %err,
                "unit conversion failed, passing value through unconverted"
            );
            value
        }
    }
}
