//! The coupled pipeline: an ordered set of modules advancing in lock step,
//! wired together by canonical variable name.
//!
//! Construction is two-phase (see [`PipelineBuilder`]): every module is
//! registered before any input binding is resolved, so a module may consume
//! an output of a module configured after it. At runtime the pipeline serves
//! a scenario step at a time: for each module, pull inputs from the bound
//! sources, marshal them in, advance the backend, then move to the next
//! module.

mod builder;
mod runtime;

#[cfg(test)]
mod tests;

pub use builder::PipelineBuilder;
pub use runtime::Pipeline;
