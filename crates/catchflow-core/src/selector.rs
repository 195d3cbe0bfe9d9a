//! Query descriptor handed to [`TimeIndexedDataProvider`] implementations.
//!
//! [`TimeIndexedDataProvider`]: crate::provider::TimeIndexedDataProvider

use crate::time::EpochSeconds;

/// Describes a single value request against a data source: which variable,
/// over which span of scenario time, and in which units the caller wants the
/// answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    /// Canonical variable name.
    pub variable: String,
    /// Start of the query span, in epoch seconds.
    pub init_time: EpochSeconds,
    /// Length of the query span in seconds. Must be positive.
    pub duration_s: i64,
    /// Units the caller wants the value expressed in. An empty string means
    /// "whatever the source stores natively".
    pub output_units: String,
    /// Spatial entity the query targets. Sources with a single entity ignore
    /// this.
    pub entity_id: String,
}

impl Selector {
    pub fn new(
        variable: impl Into<String>,
        init_time: EpochSeconds,
        duration_s: i64,
        output_units: impl Into<String>,
    ) -> Self {
        Self {
            variable: variable.into(),
            init_time,
            duration_s,
            output_units: output_units.into(),
            entity_id: String::new(),
        }
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = entity_id.into();
        self
    }
}
