use thiserror::Error;

/// Error kinds raised while building or stepping a pipeline.
///
/// Variants are grouped by the phase that raises them: configuration and
/// construction, binding resolution, time-range queries, marshaling, and
/// runtime advancement.
#[derive(Error, Debug)]
pub enum CoupleError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to parse pipeline configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("module '{module}' is missing required configuration key '{key}'")]
    MissingConfigKey { module: String, key: String },
    #[error("unknown model type '{0}'")]
    UnknownModelType(String),

    #[error("output variable '{variable}' from module '{module}' is already provided by '{existing}'")]
    DuplicateOutput {
        variable: String,
        module: String,
        existing: String,
    },
    #[error("no data source provides required input variable(s): {0}")]
    UnresolvedBindings(String),
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),
    #[error(
        "default for '{variable}' exhausted after {uses} use(s) with no provider able to supply it"
    )]
    DefaultExhausted { variable: String, uses: u32 },

    #[error("time {time} is outside the provided data range [{start}, {stop})")]
    TimeOutOfRange { time: i64, start: i64, stop: i64 },
    #[error("invalid time unit '{0}'")]
    InvalidTimeUnit(String),
    #[error("no known conversion from '{from}' to '{to}'")]
    NoKnownConversion { from: String, to: String },

    #[error("variable '{variable}' has unsupported native type '{type_name}'")]
    UnsupportedNativeType {
        variable: String,
        type_name: String,
    },
    #[error("value {value} is not representable as native type '{type_name}' for variable '{variable}'")]
    ValueNotRepresentable {
        variable: String,
        type_name: String,
        value: f64,
    },
    #[error("variable '{variable}' reports item size {actual} but native type '{type_name}' requires {expected}")]
    ItemSizeMismatch {
        variable: String,
        type_name: String,
        expected: usize,
        actual: usize,
    },
    #[error("variable '{variable}' supplied {actual} value(s) but module '{module}' expects {expected}")]
    ValueCountMismatch {
        module: String,
        variable: String,
        expected: usize,
        actual: usize,
    },

    #[error("advancing module '{module}' to time step {t_index} would exceed its end time")]
    BeyondEndTime { module: String, t_index: usize },
    #[error("time step {requested} precedes the already-processed step {current}")]
    TimeStepRewind { requested: usize, current: usize },
    #[error("output is only available for the current time step (requested {requested}, current {current})")]
    OutputNotCurrent { requested: usize, current: usize },
    #[error("module '{module}': {message}")]
    Backend { module: String, message: String },
}

pub type CoupleResult<T> = Result<T, CoupleError>;
