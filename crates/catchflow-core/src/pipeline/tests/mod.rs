//! Scenario tests exercising whole pipelines built from the in-crate test
//! backends.

mod output;

use std::sync::Arc;

use ndarray::Array1;

use crate::config::{DefaultOutputValue, ModuleConfig, PipelineConfig};
use crate::example_backends::TestBackend;
use crate::module::{BackendRegistry, ModuleBackend};
use crate::provider::{TabularColumn, TabularDataProvider};
use crate::standard_names;

pub(super) fn backends() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register("test_source", |_| {
        Ok(Box::new(TestBackend::source("OUTPUT_1", 0.0, 1.0).with_tick_output("TICKS"))
            as Box<dyn ModuleBackend>)
    });
    registry.register("test_short_source", |_| {
        Ok(Box::new(
            TestBackend::source("OUTPUT_1", 0.0, 1.0)
                .with_end(2.0 * 3600.0)
                .with_tick_output("TICKS"),
        ) as Box<dyn ModuleBackend>)
    });
    registry.register("test_half_hourly_source", |_| {
        Ok(Box::new(
            TestBackend::source("OUTPUT_1", 0.0, 1.0)
                .with_step(1800.0)
                .with_tick_output("TICKS"),
        ) as Box<dyn ModuleBackend>)
    });
    registry.register("test_doubler", |_| {
        Ok(Box::new(TestBackend::scaler(&["INPUT_1"], "OUTPUT_2", 2.0))
            as Box<dyn ModuleBackend>)
    });
    registry.register("test_halver", |_| {
        Ok(Box::new(TestBackend::scaler(&["INPUT_1"], "OUTPUT_3", 0.5))
            as Box<dyn ModuleBackend>)
    });
    registry.register("test_adder", |_| {
        Ok(Box::new(TestBackend::scaler(&["RAIN_IN", "PET_IN"], "Q_OUT", 1.0))
            as Box<dyn ModuleBackend>)
    });
    registry
}

pub(super) fn module_config(
    model_type_name: &str,
    main_output_variable: &str,
    aliases: &[(&str, &str)],
) -> ModuleConfig {
    ModuleConfig {
        model_type_name: model_type_name.to_string(),
        init_config: String::new(),
        main_output_variable: main_output_variable.to_string(),
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

pub(super) fn pipeline_config(
    main_output_variable: &str,
    modules: Vec<ModuleConfig>,
) -> PipelineConfig {
    PipelineConfig {
        name: "cat-test".to_string(),
        main_output_variable: main_output_variable.to_string(),
        output_variables: vec![],
        output_header_fields: vec![],
        modules,
        default_output_values: vec![],
    }
}

pub(super) fn default_value(name: &str, value: f64, wait_count: Option<u32>) -> DefaultOutputValue {
    DefaultOutputValue {
        name: name.to_string(),
        value,
        wait_count,
    }
}

/// Hourly precipitation forcing: sample `i` holds `i + 1`.
pub(super) fn rain_forcing(steps: usize) -> Arc<TabularDataProvider> {
    let values = Array1::from_iter((0..steps).map(|i| (i + 1) as f64));
    Arc::new(
        TabularDataProvider::new(0, 3600, vec![TabularColumn::new("RAINRATE", "", values)])
            .unwrap(),
    )
}

pub(super) fn precip() -> &'static str {
    standard_names::PRECIP_RATE
}
