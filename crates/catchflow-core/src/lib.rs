//! Core coupling framework for catchment process models.
//!
//! A [`Pipeline`] runs an ordered set of process-model modules in lock step
//! over a shared scenario clock. Modules exchange values by canonical
//! variable name through a [`router::VariableRouter`]; anything a module does
//! not get from another module comes from a time-indexed data source
//! ([`provider::TimeIndexedDataProvider`]), resampled from the source's
//! native step to the scenario step.
//!
//! [`Pipeline`]: pipeline::Pipeline

pub mod config;
pub mod errors;
pub mod marshal;
pub mod module;
pub mod pipeline;
pub mod provider;
pub mod router;
pub mod selector;
pub mod standard_names;
pub mod synchronizer;
pub mod time;
pub mod units;

mod example_backends;

pub use errors::{CoupleError, CoupleResult};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use selector::Selector;
