//! Pipeline and module configuration.
//!
//! Loaded from TOML. Missing required keys and unknown model types surface as
//! configuration errors at build time; nothing is silently defaulted except
//! the keys documented as optional.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{CoupleError, CoupleResult};

/// Top-level configuration for one coupled pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Identifier used in logs and error messages.
    pub name: String,
    /// Canonical name of the pipeline's primary output. The module providing
    /// it becomes the primary module.
    pub main_output_variable: String,
    /// Canonical names written by `get_output_line_for_timestep`, in order.
    /// Defaults to the last module's exposed outputs.
    #[serde(default)]
    pub output_variables: Vec<String>,
    /// Header spellings for the output line. Defaults to `output_variables`.
    #[serde(default)]
    pub output_header_fields: Vec<String>,
    /// Modules in execution order.
    pub modules: Vec<ModuleConfig>,
    /// Defaults served for inputs no source provides (or served for the
    /// first `wait_count` queries of a resolved input).
    #[serde(default)]
    pub default_output_values: Vec<DefaultOutputValue>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleConfig {
    /// Factory key selecting the backend implementation.
    pub model_type_name: String,
    /// Opaque initialisation text handed to the backend.
    #[serde(default)]
    pub init_config: String,
    /// The backend output this module considers its headline result.
    pub main_output_variable: String,
    /// Whether this module reads forcing from a file-backed source.
    #[serde(default)]
    pub uses_forcing_file: bool,
    /// Path key for the shared source registry. Required when
    /// `uses_forcing_file` is set.
    #[serde(default)]
    pub forcing_file: Option<String>,
    /// Native variable name -> canonical name.
    #[serde(default)]
    pub variables_names_map: HashMap<String, String>,
    /// Subset (and order) of outputs exposed in text output. Defaults to the
    /// backend's full declared output list.
    #[serde(default)]
    pub output_variables: Vec<String>,
    /// Whether the module may be stepped past its declared end time.
    #[serde(default)]
    pub allow_exceed_end_time: bool,
    /// Whether the backend must be advanced in whole native steps.
    #[serde(default = "default_true")]
    pub fixed_time_step: bool,
}

/// A configured fallback for an input variable.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DefaultOutputValue {
    /// Canonical variable name the default applies to.
    pub name: String,
    pub value: f64,
    /// How many queries the default is served for. Unset means the default
    /// may be served indefinitely when no source provides the variable; when
    /// a source does provide it, the default is served for this many queries
    /// first (breaking startup feedback cycles), then the source takes over.
    #[serde(default)]
    pub wait_count: Option<u32>,
}

fn default_true() -> bool {
    true
}

impl PipelineConfig {
    pub fn from_toml(text: &str) -> CoupleResult<Self> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoupleResult<()> {
        if self.modules.is_empty() {
            return Err(CoupleError::Config(format!(
                "pipeline '{}' configures no modules",
                self.name
            )));
        }
        if self.main_output_variable.is_empty() {
            return Err(CoupleError::Config(format!(
                "pipeline '{}' does not name a main output variable",
                self.name
            )));
        }
        for module in &self.modules {
            if module.model_type_name.is_empty() {
                return Err(CoupleError::MissingConfigKey {
                    module: module.main_output_variable.clone(),
                    key: "model_type_name".to_string(),
                });
            }
            if module.uses_forcing_file && module.forcing_file.is_none() {
                return Err(CoupleError::MissingConfigKey {
                    module: module.model_type_name.clone(),
                    key: "forcing_file".to_string(),
                });
            }
        }
        Ok(())
    }
}
